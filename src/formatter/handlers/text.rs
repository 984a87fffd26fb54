use std::io::Write;

use crate::error::Result;
use crate::formatter::html::{escape, sanitize};
use crate::formatter::{FormatContext, FormatOptions, Formatter, FormatterHandler};
use crate::model::document::ContentNode;
use crate::model::part::Part;
use crate::parser::header::decode_charset;
use crate::registry::Extension;

/// Decode a text leaf to UTF-8.
///
/// A configured charset overrides the declared one; text declaring none
/// uses the default charset.
pub fn decode_text(options: &FormatOptions, node: &ContentNode) -> Option<String> {
    let content = node.content()?;
    let charset = options
        .charset
        .as_deref()
        .or_else(|| node.param("charset"))
        .unwrap_or(options.default_charset.as_str());
    Some(decode_charset(charset, content))
}

/// Plain text as preformatted HTML.
pub struct TextPlainRenderer;

impl Extension for TextPlainRenderer {
    fn mime_types(&self) -> &[&str] {
        &["text/plain", "text/*", "message/delivery-status"]
    }

    fn name(&self) -> &str {
        "text/plain"
    }
}

impl FormatterHandler for TextPlainRenderer {
    fn format(
        &self,
        formatter: &Formatter,
        _ctx: &FormatContext<'_>,
        part: &Part,
        sink: &mut dyn Write,
    ) -> Result<bool> {
        let Some(text) = part
            .body
            .as_ref()
            .and_then(|node| decode_text(formatter.options(), node))
        else {
            return Ok(false);
        };

        let mark = formatter.options().mark_citations;
        let mut body = String::with_capacity(text.len());
        for line in text.lines() {
            let escaped = escape(line);
            if mark && line.starts_with('>') {
                body.push_str("<span class=\"citation\">");
                body.push_str(&escaped);
                body.push_str("</span>");
            } else {
                body.push_str(&escaped);
            }
            body.push('\n');
        }

        write!(
            sink,
            "<div class=\"part-container plain-text\" id=\"{}\"><pre>{body}</pre></div>\n",
            escape(&part.id)
        )?;
        Ok(true)
    }
}

/// HTML bodies with active content removed.
pub struct TextHtmlRenderer;

impl Extension for TextHtmlRenderer {
    fn mime_types(&self) -> &[&str] {
        &["text/html"]
    }

    fn name(&self) -> &str {
        "text/html"
    }
}

impl FormatterHandler for TextHtmlRenderer {
    fn format(
        &self,
        formatter: &Formatter,
        ctx: &FormatContext<'_>,
        part: &Part,
        sink: &mut dyn Write,
    ) -> Result<bool> {
        let Some(html) = part
            .body
            .as_ref()
            .and_then(|node| decode_text(formatter.options(), node))
        else {
            return Ok(false);
        };

        let list = ctx.part_list();
        let cleaned = sanitize(&html, |cid| {
            list.find_by_content_id(cid).map(|p| p.id.clone())
        });
        write!(
            sink,
            "<div class=\"part-container html\" id=\"{}\">{cleaned}</div>\n",
            escape(&part.id)
        )?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cancel::CancellationToken;
    use crate::formatter::Mode;
    use crate::model::document::Document;
    use crate::model::part_list::PartList;

    fn render(handler: &dyn FormatterHandler, node: ContentNode, formatter: &Formatter) -> String {
        let node = node.into_handle();
        let part = Part::new(&node, ".message.plain_text.0");
        let mut list = PartList::new(Arc::new(Document::new(node)), None, None);
        let mut image = Part::synthetic(".message.related.1", "image/png");
        image.content_id = Some("logo@x".into());
        list.add_part(image);
        let cancel = CancellationToken::new();
        let ctx = FormatContext::new(&list, Mode::Normal, &cancel);
        let mut out = Vec::new();
        assert!(handler.format(formatter, &ctx, &part, &mut out).unwrap());
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_declared_charset_is_used() {
        let node = ContentNode::leaf("text/plain", b"caf\xe9".to_vec())
            .with_param("charset", "iso-8859-1");
        let html = render(&TextPlainRenderer, node, &Formatter::empty());
        assert!(html.contains("café"));
    }

    #[test]
    fn test_charset_override() {
        let node = ContentNode::leaf("text/plain", "café").with_param("charset", "utf-8");
        let formatter = Formatter::empty().with_options(FormatOptions {
            charset: Some("iso-8859-1".into()),
            ..FormatOptions::default()
        });
        let html = render(&TextPlainRenderer, node, &formatter);
        assert!(html.contains("cafÃ©"));
    }

    #[test]
    fn test_citations_marked() {
        let node = ContentNode::leaf("text/plain", "> quoted <b>\nreply");
        let html = render(&TextPlainRenderer, node, &Formatter::empty());
        assert!(html.contains("<span class=\"citation\">&gt; quoted &lt;b&gt;</span>\nreply\n"));
    }

    #[test]
    fn test_html_is_sanitized_and_resolved() {
        let node = ContentNode::leaf(
            "text/html",
            "<p>hi</p><script>x()</script><img src=\"cid:logo@x\">",
        );
        let html = render(&TextHtmlRenderer, node, &Formatter::empty());
        assert!(!html.contains("script"));
        assert!(html.contains("src=\"mail-part:.message.related.1\""));
    }
}
