use std::io::Write;

use chrono::Local;

use crate::error::Result;
use crate::formatter::address::format_address_list;
use crate::formatter::html::escape;
use crate::formatter::{FormatContext, Formatter, FormatterHandler};
use crate::model::part::{Part, HEADERS_TYPE};
use crate::parser::header::parse_date;
use crate::registry::Extension;

const ADDRESS_HEADERS: [&str; 7] = [
    "from",
    "sender",
    "reply-to",
    "to",
    "cc",
    "bcc",
    "resent-from",
];

/// Header block of a message, showing the configured headers in order.
///
/// Values arrive already decoded from the parser.
pub struct HeadersRenderer;

impl Extension for HeadersRenderer {
    fn mime_types(&self) -> &[&str] {
        &[HEADERS_TYPE]
    }

    fn name(&self) -> &str {
        "headers"
    }
}

impl FormatterHandler for HeadersRenderer {
    fn format(
        &self,
        formatter: &Formatter,
        _ctx: &FormatContext<'_>,
        part: &Part,
        sink: &mut dyn Write,
    ) -> Result<bool> {
        let Some(node) = part.body.as_ref() else {
            return Ok(false);
        };
        let options = formatter.options();

        let mut rows = String::new();
        for wanted in &options.headers {
            let wanted = wanted.to_ascii_lowercase();
            for (name, value) in node.headers.iter().filter(|(n, _)| *n == wanted) {
                rows.push_str(&format!(
                    "<tr class=\"header\"><th>{}:</th><td>{}</td></tr>\n",
                    escape(&display_name(name)),
                    render_value(name, value, options.show_real_date)
                ));
            }
        }

        write!(
            sink,
            "<table class=\"headers\" id=\"{}\">\n{rows}</table>\n",
            escape(&part.id)
        )?;
        Ok(true)
    }
}

fn render_value(name: &str, value: &str, show_real_date: bool) -> String {
    if ADDRESS_HEADERS.contains(&name) {
        return format_address_list(value);
    }
    if name == "date" {
        if let Some(date) = parse_date(value) {
            let local = date
                .with_timezone(&Local)
                .format("%a, %d %b %Y %H:%M:%S %z")
                .to_string();
            return if show_real_date {
                format!("{} ({})", escape(&local), escape(value.trim()))
            } else {
                escape(&local)
            };
        }
    }
    escape(value)
}

/// `reply-to` → `Reply-To`.
fn display_name(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cancel::CancellationToken;
    use crate::formatter::{FormatOptions, Mode};
    use crate::model::document::{ContentNode, Document};
    use crate::model::part_list::PartList;

    fn render(node: ContentNode, options: FormatOptions) -> String {
        let node = node.into_handle();
        let part = Part::new(&node, ".message.headers").with_type(HEADERS_TYPE);
        let list = PartList::new(Arc::new(Document::new(node)), None, None);
        let cancel = CancellationToken::new();
        let ctx = FormatContext::new(&list, Mode::Normal, &cancel);
        let formatter = Formatter::empty().with_options(options);
        let mut out = Vec::new();
        assert!(HeadersRenderer
            .format(&formatter, &ctx, &part, &mut out)
            .unwrap());
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_configured_order_and_filtering() {
        let node = ContentNode::leaf("text/plain", "")
            .with_header("x-mailer", "Thing")
            .with_header("subject", "Hola")
            .with_header("from", "Alice <alice@example.com>");
        let html = render(node, FormatOptions::default());
        let from = html.find("From:").unwrap();
        let subject = html.find("Subject:").unwrap();
        assert!(from < subject);
        assert!(html.contains("<td>Hola</td>"));
        assert!(html.contains("mailto:alice@example.com"));
        assert!(!html.contains("X-Mailer"));
    }

    #[test]
    fn test_decoded_value_is_not_decoded_again() {
        let raw = b"Subject: =?UTF-8?B?PT9VVEYtOD9CP1NHOXNZUT09Pz0=?=\r\n\r\n";
        let mut node = ContentNode::leaf("text/plain", "");
        node.headers = crate::parser::header::parse_header_block(raw);
        assert_eq!(node.header("subject"), Some("=?UTF-8?B?SG9sYQ==?="));

        let html = render(node, FormatOptions::default());
        assert!(html.contains("<td>=?UTF-8?B?SG9sYQ==?=</td>"));
        assert!(!html.contains("Hola"));
    }

    #[test]
    fn test_real_date_shown_on_request() {
        let node = ContentNode::leaf("text/plain", "")
            .with_header("date", "Thu, 1 Jan 2015 10:00:00 +0000");
        let options = FormatOptions {
            show_real_date: true,
            ..FormatOptions::default()
        };
        let html = render(node, options);
        assert!(html.contains("(Thu, 1 Jan 2015 10:00:00 +0000)"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("reply-to"), "Reply-To");
        assert_eq!(display_name("cc"), "Cc");
    }
}
