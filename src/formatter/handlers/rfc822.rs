use std::io::Write;

use crate::error::Result;
use crate::formatter::html::escape;
use crate::formatter::{FormatContext, Formatter, FormatterHandler};
use crate::model::part::Part;
use crate::registry::Extension;

/// Embedded messages. Renders the whole subtree up to the `.end` sentinel;
/// the walk then resumes after it.
pub struct Rfc822Renderer;

impl Extension for Rfc822Renderer {
    fn mime_types(&self) -> &[&str] {
        &["message/rfc822", "message/news", "message/*"]
    }

    fn name(&self) -> &str {
        "message/rfc822"
    }
}

impl FormatterHandler for Rfc822Renderer {
    fn format(
        &self,
        formatter: &Formatter,
        ctx: &FormatContext<'_>,
        part: &Part,
        sink: &mut dyn Write,
    ) -> Result<bool> {
        if !part.is_rfc822() {
            return Ok(false);
        }
        let list = ctx.part_list();
        let Some(start) = list.position_of(&part.id) else {
            return Ok(false);
        };
        let Some(end) = list.rfc822_end_index(start) else {
            return Ok(false);
        };

        write!(
            sink,
            "<div class=\"part-container rfc822\" id=\"{}\">\n",
            escape(&part.id)
        )?;
        formatter.walk(ctx, start + 1, end, sink)?;
        sink.write_all(b"</div>\n")?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::cancel::CancellationToken;
    use crate::formatter::{Formatter, Mode};
    use crate::model::document::{ContentNode, Document};
    use crate::parser::Parser;

    #[test]
    fn test_nested_message_rendered_standalone() {
        let inner = ContentNode::leaf("text/plain", "inner body")
            .with_header("subject", "Inner")
            .into_handle();
        let root = ContentNode::multipart(
            "multipart/mixed",
            vec![
                ContentNode::leaf("text/plain", "outer").into_handle(),
                ContentNode::message(inner).into_handle(),
            ],
        );
        let list = Parser::new().parse(
            Arc::new(Document::new(root.into_handle())),
            &CancellationToken::new(),
        );
        let nested = list
            .extract_nested(".message.mixed.1.rfc822")
            .unwrap();

        let mut out = Vec::new();
        Formatter::new()
            .format(&nested, Mode::Raw, &mut out, &CancellationToken::new())
            .unwrap();
        let html = String::from_utf8(out).unwrap();
        assert_eq!(html.matches("inner body").count(), 1);
        assert!(html.contains("Inner"));
        assert!(!html.contains("outer"));
    }
}
