//! Raw RFC 5322 bytes → immutable [`ContentNode`] tree.
//!
//! `mail-parser` does the MIME work; this module only reshapes its flat
//! part table into owned, reference-counted nodes.

use mail_parser::{Message, MessageParser, MimeHeaders, PartType};
use tracing::{debug, warn};

use super::header::parse_header_block;
use crate::error::Result;
use crate::model::document::{
    strip_angle_brackets, ContentHandle, ContentNode, Disposition, Document, NodeBody,
};

/// Maximum container nesting (to prevent stack overflow on adversarial input).
/// Deeper containers become opaque leaves.
pub const MAX_DEPTH: usize = 32;

/// Parse a complete raw message (headers + body) into a [`Document`].
///
/// Uses `mail-parser` internally, with a header/body split fallback for
/// input it rejects.
pub fn parse_document(raw_message: &[u8]) -> Result<Document> {
    // Strip the leading "From " separator line if present
    let message_bytes = skip_from_line(raw_message);

    let parser = MessageParser::default();
    let root = match parser.parse(message_bytes) {
        Some(msg) => convert_message(&msg, 0),
        None => {
            warn!(
                len = message_bytes.len(),
                "mail-parser rejected message, using fallback split"
            );
            fallback_node(message_bytes)
        }
    };

    Ok(Document::new(root))
}

/// Convert a parsed message: its first part is the root (message headers,
/// body type).
fn convert_message(msg: &Message<'_>, depth: usize) -> ContentHandle {
    if msg.parts.is_empty() {
        return fallback_node(msg.raw_message.as_ref());
    }
    convert_part(msg, 0, depth)
        .with_raw(msg.raw_message.to_vec())
        .into_handle()
}

fn convert_part(msg: &Message<'_>, idx: usize, depth: usize) -> ContentNode {
    let Some(part) = msg.parts.get(idx) else {
        return ContentNode::leaf("text/plain", Vec::new());
    };
    let raw = msg.raw_message.as_ref();

    let header_bytes = span(raw, part.offset_header as usize, part.offset_body as usize);
    let raw_bytes = span(raw, part.offset_header as usize, part.offset_end as usize);

    let mut content_type = part
        .content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_else(|| match &part.body {
            PartType::Message(_) => "message/rfc822".to_string(),
            PartType::Html(_) => "text/html".to_string(),
            PartType::Multipart(_) => "multipart/mixed".to_string(),
            _ => "text/plain".to_string(),
        });

    let mut params: Vec<(String, String)> = part
        .content_type()
        .and_then(|ct| ct.attributes.as_ref())
        .map(|attrs| {
            attrs
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let body = match &part.body {
        PartType::Multipart(children) if depth < MAX_DEPTH => NodeBody::Multipart(
            children
                .iter()
                .map(|id| convert_part(msg, *id as usize, depth + 1).into_handle())
                .collect(),
        ),
        PartType::Message(inner) if depth < MAX_DEPTH => {
            NodeBody::Message(convert_message(inner, depth + 1))
        }
        PartType::Multipart(_) | PartType::Message(_) => {
            warn!(depth, content_type = %content_type, "Nesting too deep, keeping opaque");
            content_type = "application/octet-stream".to_string();
            let body = span(raw, part.offset_body as usize, part.offset_end as usize);
            NodeBody::Leaf(body.to_vec())
        }
        PartType::Text(text) | PartType::Html(text) => {
            // Decoded to UTF-8 by mail-parser
            params.retain(|(k, _)| k != "charset");
            params.push(("charset".to_string(), "utf-8".to_string()));
            NodeBody::Leaf(text.as_bytes().to_vec())
        }
        PartType::Binary(data) | PartType::InlineBinary(data) => NodeBody::Leaf(data.to_vec()),
    };

    let disposition = part
        .content_disposition()
        .and_then(|d| match d.ctype().to_ascii_lowercase().as_str() {
            "attachment" => Some(Disposition::Attachment),
            "inline" => Some(Disposition::Inline),
            _ => None,
        });

    debug!(idx, depth, content_type = %content_type, "Converted MIME part");

    ContentNode {
        content_type,
        params,
        disposition,
        filename: part.attachment_name().map(String::from),
        content_id: part.content_id().map(|id| strip_angle_brackets(id).to_string()),
        description: part.content_description().map(String::from),
        transfer_encoding: part
            .content_transfer_encoding()
            .map(|e| e.to_ascii_lowercase()),
        headers: parse_header_block(header_bytes),
        raw: raw_bytes.to_vec(),
        body,
    }
}

/// Build a text leaf from a message `mail-parser` could not handle.
fn fallback_node(data: &[u8]) -> ContentHandle {
    let (headers, body) = split_header_body(data);
    let mut node = ContentNode::leaf("text/plain", body.to_vec()).with_raw(data.to_vec());
    node.headers = parse_header_block(headers);
    node.into_handle()
}

/// Clamp a byte range to the buffer.
fn span(raw: &[u8], start: usize, end: usize) -> &[u8] {
    let end = end.min(raw.len());
    let start = start.min(end);
    &raw[start..end]
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    // Handle BOM
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Split at the first blank line: (header block, body).
fn split_header_body(data: &[u8]) -> (&[u8], &[u8]) {
    let lf = data.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = data.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    let split = match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };
    match split {
        Some((pos, len)) => (&data[..pos], &data[pos + len..]),
        None => (data, &data[data.len()..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_message() {
        let raw = b"From: a@example.com\nSubject: Hello\nContent-Type: text/plain; charset=iso-8859-1\n\nhello world\n";
        let doc = parse_document(raw).unwrap();
        let root = &doc.root;
        assert_eq!(root.content_type, "text/plain");
        assert_eq!(root.header("subject"), Some("Hello"));
        assert_eq!(root.param("charset"), Some("utf-8"));
        assert!(String::from_utf8_lossy(root.content().unwrap()).contains("hello world"));
        assert_eq!(doc.raw(), &raw[..]);
    }

    #[test]
    fn test_skip_from_line_and_bom() {
        let raw = b"\xEF\xBB\xBFFrom sender@example.com Thu Jan  4 10:00:00 2024\nSubject: X\n\nbody\n";
        let doc = parse_document(raw).unwrap();
        assert_eq!(doc.root.header("subject"), Some("X"));
        assert!(!doc.raw().starts_with(b"From "));
    }

    #[test]
    fn test_multipart_with_attachment() {
        let raw = concat!(
            "Subject: Files\n",
            "MIME-Version: 1.0\n",
            "Content-Type: multipart/mixed; boundary=\"XX\"\n",
            "\n",
            "--XX\n",
            "Content-Type: text/plain\n",
            "\n",
            "see attached\n",
            "--XX\n",
            "Content-Type: application/pdf; name=\"report.pdf\"\n",
            "Content-Disposition: attachment; filename=\"report.pdf\"\n",
            "Content-Transfer-Encoding: base64\n",
            "\n",
            "JVBERi0xLjQK\n",
            "--XX--\n",
        );
        let doc = parse_document(raw.as_bytes()).unwrap();
        assert_eq!(doc.root.content_type, "multipart/mixed");
        let children = doc.root.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].content_type, "application/pdf");
        assert_eq!(children[1].filename.as_deref(), Some("report.pdf"));
        assert!(children[1].is_attachment_disposition());
        assert_eq!(children[1].content(), Some(&b"%PDF-1.4\n"[..]));
        assert_eq!(children[1].transfer_encoding.as_deref(), Some("base64"));
    }

    #[test]
    fn test_nested_message() {
        let raw = concat!(
            "Subject: Outer\n",
            "Content-Type: multipart/mixed; boundary=\"B\"\n",
            "\n",
            "--B\n",
            "Content-Type: message/rfc822\n",
            "\n",
            "Subject: Inner\n",
            "\n",
            "inner body\n",
            "--B--\n",
        );
        let doc = parse_document(raw.as_bytes()).unwrap();
        let child = &doc.root.children()[0];
        assert_eq!(child.content_type, "message/rfc822");
        match &child.body {
            NodeBody::Message(inner) => assert_eq!(inner.header("subject"), Some("Inner")),
            other => panic!("expected nested message, got {other:?}"),
        }
    }

    #[test]
    fn test_split_header_body() {
        let (h, b) = split_header_body(b"A: 1\r\n\r\nbody");
        assert_eq!(h, b"A: 1");
        assert_eq!(b, b"body");
        let (h, b) = split_header_body(b"no body");
        assert_eq!(h, b"no body");
        assert!(b.is_empty());
    }
}
