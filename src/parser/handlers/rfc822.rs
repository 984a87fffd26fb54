use tracing::debug;

use crate::error::Result;
use crate::model::document::{ContentHandle, Document, NodeBody};
use crate::model::part::{Part, MESSAGE_TYPE, SUFFIX_END, SUFFIX_RFC822};
use crate::parser::{ParseContext, Parser, ParserHandler};
use crate::registry::Extension;

/// Embedded messages, delimited by `.rfc822` / `.rfc822.end`.
pub struct Rfc822Handler;

impl Extension for Rfc822Handler {
    fn mime_types(&self) -> &[&str] {
        &["message/rfc822", "message/news", "message/*"]
    }

    fn name(&self) -> &str {
        "message/rfc822"
    }
}

impl ParserHandler for Rfc822Handler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        let inner = match &node.body {
            NodeBody::Message(inner) => inner.clone(),
            // Not parsed as a message upstream (e.g. an encoded body).
            NodeBody::Leaf(bytes) => Document::from_bytes(bytes)?.root,
            NodeBody::Multipart(_) => return Ok(false),
        };

        let scope_id = format!("{part_id}{SUFFIX_RFC822}");
        let mut work = vec![parser.new_part(node, scope_id.as_str())];

        let mut interior = Vec::new();
        parser.parse_part_as(ctx, &inner, &scope_id, MESSAGE_TYPE, &mut interior);
        debug!(part_id = %scope_id, parts = interior.len(), "Decomposed nested message");
        work.append(&mut interior);

        // The sentinel is always present so the list stays balanced.
        let mut end = Part::synthetic(format!("{scope_id}{SUFFIX_END}"), &node.content_type);
        end.is_hidden = true;
        end.is_printable = false;
        work.push(end);

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
