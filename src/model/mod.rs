//! Core data model: the source document tree, parts, part lists and
//! validity annotations.

pub mod document;
pub mod part;
pub mod part_list;
pub mod validity;

pub use document::{ContentHandle, ContentNode, Disposition, Document, NodeBody};
pub use part::{
    AttachmentInfo, Part, ATTACHMENT_TYPE, ERROR_TYPE, HEADERS_TYPE, MESSAGE_PART_ID,
    MESSAGE_TYPE, SECURE_BUTTON_TYPE, SOURCE_TYPE,
};
pub use part_list::PartList;
pub use validity::{EncryptStatus, SignStatus, ValidityKind, ValidityPair, ValiditySummary};
