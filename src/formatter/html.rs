//! HTML framing, escaping and sanitizing shared by the renderers.

/// Document header written before the walk in rendered modes.
pub const HTML_HEADER: &str = concat!(
    "<!DOCTYPE html>\n",
    "<html>\n",
    "<head>\n",
    "<meta http-equiv=\"content-type\" content=\"text/html; charset=utf-8\">\n",
    "<meta name=\"generator\" content=\"mailformat\">\n",
    "<title>mailformat</title>\n",
    "</head>\n",
    "<body class=\"mail\">\n",
);

/// Lighter header for a nested message rendered on its own.
pub const SUB_HEADER: &str = concat!(
    "<!DOCTYPE html>\n",
    "<html>\n",
    "<head>\n",
    "<meta http-equiv=\"content-type\" content=\"text/html; charset=utf-8\">\n",
    "</head>\n",
    "<body class=\"part-container\">\n",
);

pub const FOOTER: &str = "</body></html>";

/// Scheme used for links to other parts of the same message.
pub const PART_URI_SCHEME: &str = "mail-part:";

/// Escape text for use in element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Remove active content from a message's HTML and point `cid:` references
/// at the parts that carry them.
///
/// `resolve` maps a Content-ID to a part id.
pub fn sanitize(html: &str, resolve: impl Fn(&str) -> Option<String>) -> String {
    let mut text = html.to_string();
    for tag in ["script", "style", "iframe", "object", "embed"] {
        text = remove_tag_block(&text, tag);
    }
    rewrite_cid_references(&text, resolve)
}

/// Remove an entire tag block (e.g. `<script>…</script>`).
fn remove_tag_block(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    // ASCII lowercasing keeps byte offsets valid.
    while let Some(start) = remaining.to_ascii_lowercase().find(&open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        match after.to_ascii_lowercase().find(&close) {
            Some(end) => remaining = &after[end + close.len()..],
            None => {
                // No closing tag: drop the rest
                remaining = "";
                break;
            }
        }
    }
    result.push_str(remaining);
    result
}

fn rewrite_cid_references(html: &str, resolve: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;

    while let Some(start) = remaining.to_ascii_lowercase().find("cid:") {
        result.push_str(&remaining[..start]);
        let after = &remaining[start + 4..];
        let end = after
            .find(|c: char| matches!(c, '"' | '\'' | '>' | ')' | ' ' | '\t' | '\r' | '\n'))
            .unwrap_or(after.len());
        let cid = &after[..end];

        match resolve(cid) {
            Some(part_id) => {
                result.push_str(PART_URI_SCHEME);
                result.push_str(&part_id);
            }
            None => {
                result.push_str(&remaining[start..start + 4]);
                result.push_str(cid);
            }
        }
        remaining = &after[end..];
    }
    result.push_str(remaining);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<a href=\"x\">Tom & Jerry</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&lt;/a&gt;"
        );
    }

    #[test]
    fn test_sanitize_removes_scripts() {
        let html = "Before<SCRIPT>alert('xss')</script>After<style>p{}</style>";
        assert_eq!(sanitize(html, |_| None), "BeforeAfter");
    }

    #[test]
    fn test_cid_references_are_resolved() {
        let html = "<img src=\"cid:logo@x\"><img src=\"CID:missing@x\">";
        let out = sanitize(html, |cid| {
            (cid == "logo@x").then(|| ".message.related.0".to_string())
        });
        assert_eq!(
            out,
            "<img src=\"mail-part:.message.related.0\"><img src=\"CID:missing@x\">"
        );
    }
}
