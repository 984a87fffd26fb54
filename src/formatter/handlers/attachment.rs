use std::io::Write;

use humansize::{format_size, DECIMAL};
use tracing::debug;

use crate::error::Result;
use crate::formatter::html::{escape, PART_URI_SCHEME};
use crate::formatter::{FormatContext, Formatter, FormatterHandler};
use crate::model::part::{Part, ATTACHMENT_TYPE};
use crate::registry::Extension;

/// Attachment bar, followed by the wrapped content when it is shown inline.
pub struct AttachmentRenderer;

impl Extension for AttachmentRenderer {
    fn mime_types(&self) -> &[&str] {
        &[ATTACHMENT_TYPE]
    }

    fn name(&self) -> &str {
        "attachment"
    }
}

impl FormatterHandler for AttachmentRenderer {
    fn format(
        &self,
        formatter: &Formatter,
        ctx: &FormatContext<'_>,
        part: &Part,
        sink: &mut dyn Write,
    ) -> Result<bool> {
        let Some(info) = part.attachment.as_ref() else {
            return Ok(false);
        };

        let name = info.filename.as_deref().unwrap_or("attachment");
        let class = if info.shown { "attachment shown" } else { "attachment" };
        write!(
            sink,
            "<div class=\"{class}\" id=\"{}\">\n<div class=\"attachment-bar\"><a href=\"{PART_URI_SCHEME}{}\">{}</a> <span class=\"type\">{}</span> <span class=\"size\">{}</span></div>\n",
            escape(&part.id),
            escape(&part.id),
            escape(name),
            escape(&info.guessed_type),
            format_size(info.size, DECIMAL)
        )?;

        if info.shown {
            let view = info
                .view_part_id
                .as_deref()
                .and_then(|id| ctx.part_list().find_by_id(id));
            if let Some(view) = view {
                if !formatter.format_as(ctx, view, None, sink)? {
                    debug!(part_id = %view.id, "No renderer for attachment content");
                }
            }
        }

        sink.write_all(b"</div>\n")?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cancel::CancellationToken;
    use crate::formatter::Mode;
    use crate::model::document::{ContentNode, Disposition, Document};
    use crate::parser::Parser;

    fn render(disposition: Disposition) -> String {
        let root = ContentNode::multipart(
            "multipart/mixed",
            vec![
                ContentNode::leaf("text/plain", "body").into_handle(),
                ContentNode::leaf("image/png", b"\x89PNG".to_vec())
                    .with_filename("pic.png")
                    .with_disposition(disposition)
                    .into_handle(),
            ],
        );
        let list = Parser::new().parse(
            Arc::new(Document::new(root.into_handle())),
            &CancellationToken::new(),
        );
        let mut out = Vec::new();
        Formatter::new()
            .format(&list, Mode::Normal, &mut out, &CancellationToken::new())
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_inline_attachment_shows_content_once() {
        let html = render(Disposition::Inline);
        assert!(html.contains("pic.png"));
        assert_eq!(html.matches("data:image/png").count(), 1);
    }

    #[test]
    fn test_collapsed_attachment_has_bar_only() {
        let html = render(Disposition::Attachment);
        assert!(html.contains("pic.png"));
        assert!(html.contains("4 B"));
        assert!(!html.contains("data:image/png"));
    }
}
