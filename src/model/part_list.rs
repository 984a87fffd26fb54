//! The ordered, flattened result of decomposing one document.

use std::sync::Arc;

use tracing::warn;

use super::document::Document;
use super::part::{Part, SUFFIX_END};
use super::validity::ValidityKind;

/// Parts of one message in formatter traversal order.
///
/// Written by a single [`Parser::parse`](crate::parser::Parser::parse) call
/// and read-only afterwards, so any number of formatter passes may share it.
#[derive(Debug, Clone)]
pub struct PartList {
    parts: Vec<Part>,
    source: Arc<Document>,
    /// Folder (or other store) the message came from.
    pub container_ref: Option<String>,
    /// Identifier of the message within `container_ref`.
    pub container_item_id: Option<String>,
}

impl PartList {
    pub fn new(
        source: Arc<Document>,
        container_ref: Option<String>,
        container_item_id: Option<String>,
    ) -> Self {
        Self {
            parts: Vec::new(),
            source,
            container_ref,
            container_item_id,
        }
    }

    /// Append a part, keeping ids unique.
    ///
    /// A colliding id gets a numeric disambiguator; the returned string is
    /// the id actually stored.
    pub fn add_part(&mut self, mut part: Part) -> String {
        if self.find_by_id(&part.id).is_some() {
            let original = part.id.clone();
            let mut n = 1;
            while self.find_by_id(&format!("{original}.{n}")).is_some() {
                n += 1;
            }
            part.id = format!("{original}.{n}");
            warn!(id = %original, renamed = %part.id, "Duplicate part id");
        }
        let id = part.id.clone();
        self.parts.push(part);
        id
    }

    pub fn source(&self) -> &Arc<Document> {
        &self.source
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Part> {
        self.parts.iter()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.parts.iter().position(|p| p.id == id)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == id)
    }

    /// Find the part referenced by `cid:` (brackets and prefix optional).
    pub fn find_by_content_id(&self, cid: &str) -> Option<&Part> {
        let cid = cid.trim();
        let cid = cid.strip_prefix("cid:").unwrap_or(cid);
        let cid = super::document::strip_angle_brackets(cid);
        self.parts
            .iter()
            .find(|p| p.content_id.as_deref() == Some(cid))
    }

    /// Index of the `.end` sentinel closing the `.rfc822` part at `start`.
    pub fn rfc822_end_index(&self, start: usize) -> Option<usize> {
        let part = self.parts.get(start)?;
        if !part.is_rfc822() {
            return None;
        }
        let end_id = part.rfc822_end_id();
        self.parts[start + 1..]
            .iter()
            .position(|p| p.id == end_id)
            .map(|offset| start + 1 + offset)
    }

    /// Attachment wrapper parts, in list order.
    pub fn attachments(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|p| p.is_wrapper())
    }

    /// Union of the validity kinds found anywhere in the message.
    pub fn validity_found(&self) -> ValidityKind {
        self.parts
            .iter()
            .fold(ValidityKind::empty(), |acc, p| acc | p.validity_flags())
    }

    /// Copy of one nested message subtree, from its `.rfc822` part to its
    /// `.end` sentinel inclusive.
    ///
    /// The copy's `.rfc822` part is visible even if an attachment wrapper
    /// hid it in this list.
    pub fn extract_nested(&self, rfc822_id: &str) -> Option<PartList> {
        let start = self.position_of(rfc822_id)?;
        let end = self.rfc822_end_index(start)?;
        let mut parts = self.parts[start..=end].to_vec();
        parts[0].is_hidden = false;
        Some(PartList {
            parts,
            source: self.source.clone(),
            container_ref: self.container_ref.clone(),
            container_item_id: self.container_item_id.clone(),
        })
    }

    /// Whether every `.rfc822` part has its sentinel and ids are unique.
    pub fn is_well_formed(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        for (idx, part) in self.parts.iter().enumerate() {
            if !seen.insert(part.id.as_str()) {
                return false;
            }
            if part.is_rfc822() && self.rfc822_end_index(idx).is_none() {
                return false;
            }
            if part.has_suffix(SUFFIX_END) {
                let start_id = &part.id[..part.id.len() - SUFFIX_END.len()];
                match self.position_of(start_id) {
                    Some(start) if start < idx => {}
                    _ => return false,
                }
            }
        }
        true
    }
}
