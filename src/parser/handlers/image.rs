use crate::error::Result;
use crate::model::document::ContentHandle;
use crate::model::part::Part;
use crate::parser::{ParseContext, Parser, ParserHandler};
use crate::registry::Extension;

/// Images, shown inline unless marked as attachments.
pub struct ImageHandler;

impl Extension for ImageHandler {
    fn mime_types(&self) -> &[&str] {
        &["image/*"]
    }

    fn name(&self) -> &str {
        "image"
    }
}

impl ParserHandler for ImageHandler {
    fn parse(
        &self,
        parser: &Parser,
        _ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        let mut work = vec![parser.new_part(node, part_id)];
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
