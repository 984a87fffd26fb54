use tracing::debug;

use crate::error::Result;
use crate::model::document::ContentHandle;
use crate::model::part::Part;
use crate::parser::{ParseContext, Parser, ParserHandler};
use crate::registry::Extension;

/// Text leaves, split by the inline filter when it finds embedded objects.
pub struct TextPlainHandler;

impl Extension for TextPlainHandler {
    fn mime_types(&self) -> &[&str] {
        &["text/plain", "text/*", "message/delivery-status"]
    }

    fn name(&self) -> &str {
        "text/plain"
    }
}

impl ParserHandler for TextPlainHandler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        // Calendars are shown by whoever understands them, else as attachments.
        if node.is_type("text/calendar") {
            return Ok(false);
        }

        let filtered = match (parser.inline_filter(), node.content()) {
            (Some(filter), Some(content)) => filter.filter(
                content,
                node.transfer_encoding.as_deref(),
                &node.content_type,
            ),
            _ => None,
        };

        let mut work = Vec::new();
        match filtered {
            None => work.push(parser.new_part(node, format!("{part_id}.plain_text.0"))),
            Some(container) => {
                debug!(part_id, objects = container.children().len(), "Inline objects found");
                for (idx, child) in container.children().iter().enumerate() {
                    if ctx.is_cancelled() {
                        break;
                    }
                    if child.is_type("text/plain") {
                        work.push(parser.new_part(child, format!("{part_id}.plain_text.{idx}")));
                    } else {
                        let child_id = format!("{part_id}.inline.{idx}");
                        parser.parse_child(ctx, child, &child_id, &mut work);
                    }
                }
            }
        }

        if node.is_attachment_disposition() {
            parser.wrap_as_attachment(node, part_id, &mut work);
        }
        out.append(&mut work);
        Ok(true)
    }

    fn inline_by_default(&self) -> bool {
        true
    }
}

/// HTML bodies; the formatter sanitizes them.
pub struct TextHtmlHandler;

impl Extension for TextHtmlHandler {
    fn mime_types(&self) -> &[&str] {
        &["text/html"]
    }

    fn name(&self) -> &str {
        "text/html"
    }
}

impl ParserHandler for TextHtmlHandler {
    fn parse(
        &self,
        parser: &Parser,
        _ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        let mut work = vec![parser.new_part(node, format!("{part_id}.text_html"))];
        if node.is_attachment_disposition() {
            parser.wrap_as_attachment(node, part_id, &mut work);
        }
        out.append(&mut work);
        Ok(true)
    }

    fn inline_by_default(&self) -> bool {
        true
    }
}
