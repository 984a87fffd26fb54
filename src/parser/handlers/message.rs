use crate::error::Result;
use crate::model::document::ContentHandle;
use crate::model::part::{Part, MESSAGE_TYPE};
use crate::parser::{ParseContext, Parser, ParserHandler};
use crate::registry::Extension;

/// A complete message: its header block, then its body.
pub struct MessageHandler;

impl Extension for MessageHandler {
    fn mime_types(&self) -> &[&str] {
        &[MESSAGE_TYPE]
    }

    fn name(&self) -> &str {
        "message"
    }
}

impl ParserHandler for MessageHandler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        out.extend(parser.headers_part(node, part_id));
        parser.parse_part(ctx, node, part_id, out);
        Ok(true)
    }
}
