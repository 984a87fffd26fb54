//! The immutable MIME tree that the parser decomposes.
//!
//! Nodes are reference-counted so that parts can keep a handle to the
//! region of the document they describe without copying it.

use std::path::Path;
use std::sync::Arc;

use crate::error::{FormatError, Result};

/// Shared, immutable handle to a document node.
pub type ContentHandle = Arc<ContentNode>;

/// `Content-Disposition` of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Inline,
    Attachment,
}

/// Content of a node.
#[derive(Debug, Clone)]
pub enum NodeBody {
    /// Transfer-decoded leaf content.
    Leaf(Vec<u8>),
    /// Children of a `multipart/*` container, in source order.
    Multipart(Vec<ContentHandle>),
    /// Root node of an embedded message (`message/rfc822` and friends).
    Message(ContentHandle),
}

/// One node of a MIME tree.
#[derive(Debug, Clone)]
pub struct ContentNode {
    /// Lowercase `major/minor` type.
    pub content_type: String,

    /// Content-Type parameters with lowercase names.
    pub params: Vec<(String, String)>,

    pub disposition: Option<Disposition>,

    /// Filename from the disposition or the `name` type parameter.
    pub filename: Option<String>,

    /// `Content-ID` without angle brackets.
    pub content_id: Option<String>,

    pub description: Option<String>,

    /// `Content-Transfer-Encoding` as declared (the body is already decoded).
    pub transfer_encoding: Option<String>,

    /// Unfolded, decoded `(lowercase name, value)` header pairs.
    pub headers: Vec<(String, String)>,

    /// Raw source bytes of this node: header block plus encoded body.
    pub raw: Vec<u8>,

    pub body: NodeBody,
}

impl ContentNode {
    /// A leaf node with the given type and decoded content and no headers.
    pub fn leaf(content_type: &str, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        Self {
            content_type: content_type.to_ascii_lowercase(),
            params: Vec::new(),
            disposition: None,
            filename: None,
            content_id: None,
            description: None,
            transfer_encoding: None,
            headers: Vec::new(),
            raw: content.clone(),
            body: NodeBody::Leaf(content),
        }
    }

    /// A container node with the given children.
    pub fn multipart(content_type: &str, children: Vec<ContentHandle>) -> Self {
        let mut node = Self::leaf(content_type, Vec::new());
        node.body = NodeBody::Multipart(children);
        node
    }

    /// A `message/rfc822` node wrapping a nested message root.
    pub fn message(inner: ContentHandle) -> Self {
        let mut node = Self::leaf("message/rfc822", inner.raw.clone());
        node.body = NodeBody::Message(inner);
        node
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = Some(disposition);
        self
    }

    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    pub fn with_content_id(mut self, content_id: &str) -> Self {
        self.content_id = Some(strip_angle_brackets(content_id).to_string());
        self
    }

    pub fn with_transfer_encoding(mut self, encoding: &str) -> Self {
        self.transfer_encoding = Some(encoding.to_ascii_lowercase());
        self
    }

    pub fn with_raw(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw = raw.into();
        self
    }

    /// Freeze the node into a shareable handle.
    pub fn into_handle(self) -> ContentHandle {
        Arc::new(self)
    }

    /// Look up a Content-Type parameter (name is case-insensitive).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value of a header (name is case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Major type (`text` for `text/plain`).
    pub fn major_type(&self) -> &str {
        self.content_type
            .split('/')
            .next()
            .unwrap_or(self.content_type.as_str())
    }

    /// Whether the type matches `pattern`, which may be `major/*` or `*`.
    pub fn is_type(&self, pattern: &str) -> bool {
        type_matches(&self.content_type, pattern)
    }

    /// Leaf content, or `None` for containers.
    pub fn content(&self) -> Option<&[u8]> {
        match &self.body {
            NodeBody::Leaf(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Size of the decoded content; containers report their raw size.
    pub fn content_size(&self) -> usize {
        match &self.body {
            NodeBody::Leaf(bytes) => bytes.len(),
            _ => self.raw.len(),
        }
    }

    pub fn children(&self) -> &[ContentHandle] {
        match &self.body {
            NodeBody::Multipart(children) => children,
            _ => &[],
        }
    }

    pub fn is_attachment_disposition(&self) -> bool {
        self.disposition == Some(Disposition::Attachment)
    }

    /// Whether a container should present this child as an attachment.
    ///
    /// Containers, crypto envelopes, calendars and filename-less text are
    /// content, everything else is an attachment.
    pub fn is_attachment(&self) -> bool {
        if !matches!(self.body, NodeBody::Leaf(_)) && !self.is_type("message/*") {
            return false;
        }
        const NEVER: [&str; 6] = [
            "application/pkcs7-mime",
            "application/x-pkcs7-mime",
            "application/pgp-encrypted",
            "application/x-inlinepgp-signed",
            "application/x-inlinepgp-encrypted",
            "text/calendar",
        ];
        if NEVER.iter().any(|t| self.is_type(t)) {
            return false;
        }
        if self.is_type("text/*") {
            return self.filename.is_some();
        }
        true
    }
}

/// A complete message: the root node carries the message headers and the
/// type of the message body.
#[derive(Debug, Clone)]
pub struct Document {
    pub root: ContentHandle,
}

impl Document {
    pub fn new(root: ContentHandle) -> Self {
        Self { root }
    }

    /// Parse raw RFC 5322 bytes (an optional mbox `From ` line is skipped).
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        crate::parser::mime::parse_document(raw)
    }

    /// Read and parse a single `.eml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FormatError::FileNotFound(path.to_path_buf())
            } else {
                FormatError::io(path, e)
            }
        })?;
        Self::from_bytes(&data)
    }

    /// Raw bytes of the whole message.
    pub fn raw(&self) -> &[u8] {
        &self.root.raw
    }
}

/// Whether a concrete type matches a registration pattern.
pub fn type_matches(content_type: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(major) => content_type
            .split('/')
            .next()
            .is_some_and(|m| m.eq_ignore_ascii_case(major)),
        None => content_type.eq_ignore_ascii_case(pattern),
    }
}

/// `<id@host>` → `id@host`.
pub fn strip_angle_brackets(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_matches_patterns() {
        assert!(type_matches("text/plain", "text/plain"));
        assert!(type_matches("text/plain", "text/*"));
        assert!(type_matches("text/plain", "*"));
        assert!(!type_matches("image/png", "text/*"));
        assert!(!type_matches("text/plain", "text/html"));
    }

    #[test]
    fn test_builder_and_lookups() {
        let node = ContentNode::leaf("Text/Plain", "hello")
            .with_param("Charset", "iso-8859-1")
            .with_header("Subject", "Hi")
            .with_content_id("<abc@example.com>");
        assert_eq!(node.content_type, "text/plain");
        assert_eq!(node.param("charset"), Some("iso-8859-1"));
        assert_eq!(node.header("subject"), Some("Hi"));
        assert_eq!(node.content_id.as_deref(), Some("abc@example.com"));
        assert_eq!(node.major_type(), "text");
        assert_eq!(node.content(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_attachment_heuristic() {
        assert!(!ContentNode::leaf("text/plain", "body").is_attachment());
        assert!(ContentNode::leaf("text/plain", "x")
            .with_filename("notes.txt")
            .is_attachment());
        assert!(ContentNode::leaf("application/pdf", "%PDF").is_attachment());
        assert!(!ContentNode::multipart("multipart/mixed", Vec::new()).is_attachment());
        assert!(!ContentNode::leaf("text/calendar", "BEGIN:VCALENDAR").is_attachment());
        let inner = ContentNode::leaf("text/plain", "inner").into_handle();
        assert!(ContentNode::message(inner).is_attachment());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = Document::from_path("/nonexistent/message.eml").unwrap_err();
        assert!(matches!(err, FormatError::FileNotFound(_)));
    }
}
