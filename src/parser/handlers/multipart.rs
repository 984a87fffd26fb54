use tracing::debug;

use crate::error::Result;
use crate::model::document::{strip_angle_brackets, ContentHandle};
use crate::model::part::Part;
use crate::parser::{ParseContext, Parser, ParserHandler};
use crate::registry::Extension;

/// Every child in order; attachments get wrapped.
pub struct MixedHandler;

impl Extension for MixedHandler {
    fn mime_types(&self) -> &[&str] {
        &["multipart/mixed", "multipart/*"]
    }

    fn name(&self) -> &str {
        "multipart/mixed"
    }
}

impl ParserHandler for MixedHandler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        parse_mixed(parser, ctx, node, part_id, out);
        Ok(true)
    }
}

/// Decompose all children of `node` as `{part_id}.mixed.N`.
///
/// Shared by the handlers that fall back to showing everything.
pub(crate) fn parse_mixed(
    parser: &Parser,
    ctx: &ParseContext<'_>,
    node: &ContentHandle,
    part_id: &str,
    out: &mut Vec<Part>,
) {
    for (idx, child) in node.children().iter().enumerate() {
        if ctx.is_cancelled() {
            break;
        }
        parser.parse_child(ctx, child, &format!("{part_id}.mixed.{idx}"), out);
    }
}

/// The richest alternative this parser can decompose.
pub struct AlternativeHandler;

impl Extension for AlternativeHandler {
    fn mime_types(&self) -> &[&str] {
        &["multipart/alternative"]
    }

    fn name(&self) -> &str {
        "multipart/alternative"
    }
}

impl ParserHandler for AlternativeHandler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        // Alternatives are ordered from plainest to richest.
        let chosen = node.children().iter().enumerate().rev().find(|(_, child)| {
            parser.registry().has_handlers(&child.content_type)
                && child.content_size() > 0
                && !child.is_attachment_disposition()
        });

        match chosen {
            Some((idx, child)) => {
                debug!(part_id, idx, content_type = %child.content_type, "Chose alternative");
                let child_id = format!("{part_id}.alternative.{idx}");
                parser.parse_part(ctx, child, &child_id, out);
            }
            None => parse_mixed(parser, ctx, node, part_id, out),
        }
        Ok(true)
    }
}

/// A display part plus the resources it references by Content-ID.
pub struct RelatedHandler;

impl Extension for RelatedHandler {
    fn mime_types(&self) -> &[&str] {
        &["multipart/related"]
    }

    fn name(&self) -> &str {
        "multipart/related"
    }
}

impl ParserHandler for RelatedHandler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        let children = node.children();
        if children.is_empty() {
            return Ok(false);
        }

        let display = node
            .param("start")
            .map(strip_angle_brackets)
            .and_then(|start| {
                children
                    .iter()
                    .position(|c| c.content_id.as_deref() == Some(start))
            })
            .unwrap_or(0);

        let order = std::iter::once(display).chain((0..children.len()).filter(|&i| i != display));
        for idx in order {
            if ctx.is_cancelled() {
                break;
            }
            let child = &children[idx];
            let mut work = Vec::new();
            parser.parse_part(ctx, child, &format!("{part_id}.related.{idx}"), &mut work);

            // Referenced resources are rendered where the display part uses them.
            if idx != display && child.content_id.is_some() {
                for part in &mut work {
                    part.is_hidden = true;
                }
            }
            out.append(&mut work);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::cancel::CancellationToken;
    use crate::model::document::{ContentNode, Disposition, Document};
    use crate::model::part_list::PartList;
    use crate::parser::Parser;

    fn parse(root: ContentNode) -> PartList {
        let doc = Document::new(root.into_handle());
        Parser::new().parse(Arc::new(doc), &CancellationToken::new())
    }

    fn ids(list: &PartList) -> Vec<&str> {
        list.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_mixed_wraps_attachments() {
        let list = parse(ContentNode::multipart(
            "multipart/mixed",
            vec![
                ContentNode::leaf("text/plain", "body").into_handle(),
                ContentNode::leaf("application/pdf", "%PDF-1.4")
                    .with_filename("a.pdf")
                    .with_disposition(Disposition::Attachment)
                    .into_handle(),
            ],
        ));
        assert_eq!(
            ids(&list),
            vec![
                ".message",
                ".message.mixed.0.plain_text.0",
                ".message.mixed.1.attachment",
            ]
        );
        assert!(!list.get(1).unwrap().is_hidden);
        let wrapper = list.get(2).unwrap();
        assert!(wrapper.is_attachment);
        assert_eq!(
            wrapper.attachment.as_ref().unwrap().guessed_type,
            "application/pdf"
        );
    }

    #[test]
    fn test_mixed_wraps_images_once() {
        let list = parse(ContentNode::multipart(
            "multipart/mixed",
            vec![ContentNode::leaf("image/png", "PNG")
                .with_disposition(Disposition::Attachment)
                .into_handle()],
        ));
        assert_eq!(
            ids(&list),
            vec![".message", ".message.mixed.0.attachment", ".message.mixed.0"]
        );
        assert!(list.get(2).unwrap().is_hidden);
    }

    #[test]
    fn test_alternative_picks_richest() {
        let list = parse(ContentNode::multipart(
            "multipart/alternative",
            vec![
                ContentNode::leaf("text/plain", "plain").into_handle(),
                ContentNode::leaf("text/html", "<p>rich</p>").into_handle(),
                ContentNode::leaf("application/x-unknown", "???").into_handle(),
            ],
        ));
        assert_eq!(ids(&list), vec![".message", ".message.alternative.1.text_html"]);
    }

    #[test]
    fn test_related_hides_referenced_parts() {
        let list = parse(
            ContentNode::multipart(
                "multipart/related",
                vec![
                    ContentNode::leaf("image/png", "PNG")
                        .with_content_id("<logo@x>")
                        .into_handle(),
                    ContentNode::leaf("text/html", "<img src=\"cid:logo@x\">")
                        .with_content_id("<body@x>")
                        .into_handle(),
                ],
            )
            .with_param("start", "<body@x>"),
        );
        assert_eq!(
            ids(&list),
            vec![".message", ".message.related.1.text_html", ".message.related.0"]
        );
        assert!(!list.get(1).unwrap().is_hidden);
        assert!(list.get(2).unwrap().is_hidden);
        assert!(list.find_by_content_id("cid:logo@x").is_some());
    }
}
