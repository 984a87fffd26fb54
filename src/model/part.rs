//! A single addressable part of a decomposed message.

use super::document::ContentHandle;
use super::validity::{ValidityKind, ValidityPair, ValiditySummary};

/// Id of the root part describing the whole message.
pub const MESSAGE_PART_ID: &str = ".message";

/// Reserved id suffixes.
pub const SUFFIX_RFC822: &str = ".rfc822";
pub const SUFFIX_END: &str = ".end";
pub const SUFFIX_ATTACHMENT: &str = ".attachment";
pub const SUFFIX_HEADERS: &str = ".headers";
pub const SUFFIX_SECURE_BUTTON: &str = ".secure_button";

/// Internal part types. They never appear in a message; parsers assign them
/// to synthetic parts and the formatter registers renderers for them.
pub const MESSAGE_TYPE: &str = "application/vnd.mailformat.message";
pub const HEADERS_TYPE: &str = "application/vnd.mailformat.headers";
pub const ERROR_TYPE: &str = "application/vnd.mailformat.error";
pub const SOURCE_TYPE: &str = "application/vnd.mailformat.source";
pub const ATTACHMENT_TYPE: &str = "application/vnd.mailformat.attachment";
pub const SECURE_BUTTON_TYPE: &str = "application/vnd.mailformat.secure-button";

/// Metadata carried only by attachment wrapper parts.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AttachmentInfo {
    /// Id of the wrapped content part, if a handler produced one.
    pub view_part_id: Option<String>,
    pub filename: Option<String>,
    /// Declared type, or a better guess for generic binary content.
    pub guessed_type: String,
    /// Decoded size in bytes.
    pub size: u64,
    /// Initially expanded inline.
    pub shown: bool,
    /// A decomposition handler exists for `guessed_type`.
    pub can_show: bool,
    pub expandable: bool,
}

/// One region of a decomposed document.
///
/// Parts are owned by exactly one [`PartList`](super::part_list::PartList);
/// references between parts are ids resolved through the list.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Part {
    /// Dot-separated path such as `.message.mixed.1.rfc822`.
    pub id: String,

    /// Lowercase `major/minor` type used to pick a renderer.
    pub content_type: String,

    /// Content-ID, used to resolve `cid:` references.
    pub content_id: Option<String>,

    /// The document node this part describes.
    #[serde(skip)]
    pub body: Option<ContentHandle>,

    /// Inline text of synthetic parts (error messages).
    pub message: Option<String>,

    pub is_attachment: bool,
    /// Left out of the default render pass, still present in the list.
    pub is_hidden: bool,
    pub is_error: bool,
    pub is_printable: bool,
    pub force_inline: bool,
    pub force_collapse: bool,

    pub validity: Vec<ValidityPair>,

    pub attachment: Option<AttachmentInfo>,
}

impl Part {
    /// A part describing `node`, typed after the node.
    pub fn new(node: &ContentHandle, id: impl Into<String>) -> Self {
        let mut part = Self::synthetic(id, &node.content_type);
        part.content_id = node.content_id.clone();
        part.body = Some(node.clone());
        part
    }

    /// A part with no document node behind it.
    pub fn synthetic(id: impl Into<String>, content_type: &str) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.to_ascii_lowercase(),
            content_id: None,
            body: None,
            message: None,
            is_attachment: false,
            is_hidden: false,
            is_error: false,
            is_printable: true,
            force_inline: false,
            force_collapse: false,
            validity: Vec::new(),
            attachment: None,
        }
    }

    pub fn with_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_ascii_lowercase();
        self
    }

    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.id.ends_with(suffix)
    }

    /// Start of a nested-message subtree.
    pub fn is_rfc822(&self) -> bool {
        self.has_suffix(SUFFIX_RFC822)
    }

    /// Id of the sentinel closing this part's nested-message subtree.
    pub fn rfc822_end_id(&self) -> String {
        format!("{}{}", self.id, SUFFIX_END)
    }

    pub fn is_wrapper(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn attachment_view_part_id(&self) -> Option<&str> {
        self.attachment
            .as_ref()
            .and_then(|a| a.view_part_id.as_deref())
    }

    /// Merge an annotation.
    ///
    /// An existing pair from the same mechanism (PGP or S/MIME) is widened
    /// to the union and its summary enveloped with `summary`; otherwise a
    /// new pair is appended.
    pub fn update_validity(&mut self, kind: ValidityKind, summary: &ValiditySummary) {
        let mechanism = kind & (ValidityKind::PGP | ValidityKind::SMIME);
        if let Some(pair) = self.validity.iter_mut().find(|p| p.kind.contains(mechanism)) {
            pair.kind |= kind;
            pair.summary.envelope(summary);
            return;
        }
        self.validity.push(ValidityPair {
            kind,
            summary: summary.clone(),
        });
    }

    /// Union of every annotation kind on this part.
    pub fn validity_flags(&self) -> ValidityKind {
        self.validity
            .iter()
            .fold(ValidityKind::empty(), |acc, p| acc | p.kind)
    }

    pub fn has_validity(&self, kind: ValidityKind) -> bool {
        self.validity_flags().contains(kind)
    }

    /// The annotation covering `kind`, if any.
    pub fn validity_for(&self, kind: ValidityKind) -> Option<&ValidityPair> {
        self.validity.iter().find(|p| p.kind.contains(kind))
    }
}
