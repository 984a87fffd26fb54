use std::io::Write;

use crate::error::Result;
use crate::formatter::html::escape;
use crate::formatter::{FormatContext, Formatter, FormatterHandler, Mode};
use crate::model::part::{Part, ERROR_TYPE, MESSAGE_PART_ID, MESSAGE_TYPE, SOURCE_TYPE};
use crate::registry::Extension;

/// The root `.message` part. Its content follows as separate parts, so
/// there is nothing to write.
pub struct MessageFrameRenderer;

impl Extension for MessageFrameRenderer {
    fn mime_types(&self) -> &[&str] {
        &[MESSAGE_TYPE]
    }

    fn name(&self) -> &str {
        "message-frame"
    }
}

impl FormatterHandler for MessageFrameRenderer {
    fn format(
        &self,
        _formatter: &Formatter,
        _ctx: &FormatContext<'_>,
        _part: &Part,
        _sink: &mut dyn Write,
    ) -> Result<bool> {
        Ok(true)
    }
}

/// Synthetic `.error.N` parts.
pub struct ErrorRenderer;

impl Extension for ErrorRenderer {
    fn mime_types(&self) -> &[&str] {
        &[ERROR_TYPE]
    }

    fn name(&self) -> &str {
        "error"
    }
}

impl FormatterHandler for ErrorRenderer {
    fn format(
        &self,
        formatter: &Formatter,
        _ctx: &FormatContext<'_>,
        part: &Part,
        sink: &mut dyn Write,
    ) -> Result<bool> {
        let Some(message) = part.message.as_deref() else {
            return Ok(false);
        };
        formatter.write_error_block(sink, message)?;
        Ok(true)
    }
}

/// Source view, used for parts nothing else can render.
///
/// The source of `.message` is the whole message.
pub struct SourceRenderer;

impl Extension for SourceRenderer {
    fn mime_types(&self) -> &[&str] {
        &[SOURCE_TYPE]
    }

    fn name(&self) -> &str {
        "source"
    }
}

impl FormatterHandler for SourceRenderer {
    fn format(
        &self,
        _formatter: &Formatter,
        ctx: &FormatContext<'_>,
        part: &Part,
        sink: &mut dyn Write,
    ) -> Result<bool> {
        let raw: &[u8] = if part.id == MESSAGE_PART_ID {
            ctx.part_list().source().raw()
        } else {
            match part.body.as_ref() {
                Some(node) => &node.raw,
                None => return Ok(false),
            }
        };

        if ctx.mode() == Mode::Source {
            sink.write_all(raw)?;
        } else {
            write!(
                sink,
                "<div class=\"part-container source\"><pre>{}</pre></div>\n",
                escape(&String::from_utf8_lossy(raw))
            )?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cancel::CancellationToken;
    use crate::model::document::{ContentNode, Document};
    use crate::model::part_list::PartList;

    fn list_with(part: Part) -> PartList {
        let root = ContentNode::leaf("text/plain", "body").with_raw("Subject: s\n\nbody");
        let mut list = PartList::new(Arc::new(Document::new(root.into_handle())), None, None);
        list.add_part(part);
        list
    }

    #[test]
    fn test_source_of_leaf_is_escaped() {
        let node = ContentNode::leaf("application/x-thing", "a<b").into_handle();
        let part = Part::new(&node, ".message.mixed.3");
        let list = list_with(part.clone());
        let cancel = CancellationToken::new();
        let ctx = FormatContext::new(&list, Mode::Normal, &cancel);
        let mut out = Vec::new();
        assert!(SourceRenderer
            .format(&Formatter::empty(), &ctx, &part, &mut out)
            .unwrap());
        assert!(String::from_utf8(out).unwrap().contains("a&lt;b"));
    }

    #[test]
    fn test_error_without_message_declines() {
        let part = Part::synthetic(".error.1", ERROR_TYPE);
        let list = list_with(part.clone());
        let cancel = CancellationToken::new();
        let ctx = FormatContext::new(&list, Mode::Normal, &cancel);
        let mut out = Vec::new();
        assert!(!ErrorRenderer
            .format(&Formatter::empty(), &ctx, &part, &mut out)
            .unwrap());
    }
}
