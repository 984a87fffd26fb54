//! Detection of encoded objects embedded in plain text.

use tracing::debug;

use crate::model::document::{ContentHandle, ContentNode};

pub const INLINE_PGP_SIGNED_TYPE: &str = "application/x-inlinepgp-signed";
pub const INLINE_PGP_ENCRYPTED_TYPE: &str = "application/x-inlinepgp-encrypted";

const PGP_SIGNED_BEGIN: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
const PGP_SIGNATURE_END: &str = "-----END PGP SIGNATURE-----";
const PGP_MESSAGE_BEGIN: &str = "-----BEGIN PGP MESSAGE-----";
const PGP_MESSAGE_END: &str = "-----END PGP MESSAGE-----";

/// Splits a text body into typed sub-objects.
pub trait InlineFilter: Send + Sync {
    /// Returns a synthetic `multipart/mixed` node whose children are the
    /// text runs and decoded objects in source order, or `None` when the
    /// content holds nothing special.
    fn filter(
        &self,
        content: &[u8],
        transfer_encoding: Option<&str>,
        mime_type: &str,
    ) -> Option<ContentHandle>;
}

/// Finds uuencoded files and inline PGP blocks by their armor lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureInlineFilter;

enum Block {
    Text,
    Uuencode { filename: String, begin: String },
    PgpSigned,
    PgpEncrypted,
}

impl InlineFilter for SignatureInlineFilter {
    fn filter(
        &self,
        content: &[u8],
        _transfer_encoding: Option<&str>,
        mime_type: &str,
    ) -> Option<ContentHandle> {
        let text = String::from_utf8_lossy(content);
        let mut children: Vec<ContentHandle> = Vec::new();
        let mut found = false;
        let mut state = Block::Text;
        let mut current = String::new();

        for line in text.split_inclusive('\n') {
            let trimmed = line.trim_end();
            match &state {
                Block::Text => {
                    let next = if trimmed == PGP_SIGNED_BEGIN {
                        Some(Block::PgpSigned)
                    } else if trimmed == PGP_MESSAGE_BEGIN {
                        Some(Block::PgpEncrypted)
                    } else {
                        uuencode_begin(trimmed).map(|filename| Block::Uuencode {
                            filename,
                            begin: line.to_string(),
                        })
                    };
                    match next {
                        Some(block) => {
                            push_text(&mut children, &current, mime_type);
                            current.clear();
                            state = block;
                            if !matches!(state, Block::Uuencode { .. }) {
                                current.push_str(line);
                            }
                        }
                        None => current.push_str(line),
                    }
                }
                Block::Uuencode { filename, .. } => {
                    if trimmed == "end" {
                        let data = uudecode(&current);
                        debug!(filename = %filename, size = data.len(), "Found uuencoded file");
                        children.push(
                            ContentNode::leaf("application/octet-stream", data)
                                .with_filename(filename)
                                .with_raw(current.clone().into_bytes())
                                .into_handle(),
                        );
                        found = true;
                        current.clear();
                        state = Block::Text;
                    } else {
                        current.push_str(line);
                    }
                }
                Block::PgpSigned | Block::PgpEncrypted => {
                    current.push_str(line);
                    let (end, content_type) = match state {
                        Block::PgpSigned => (PGP_SIGNATURE_END, INLINE_PGP_SIGNED_TYPE),
                        _ => (PGP_MESSAGE_END, INLINE_PGP_ENCRYPTED_TYPE),
                    };
                    if trimmed == end {
                        debug!(content_type, "Found inline PGP block");
                        children.push(
                            ContentNode::leaf(content_type, current.clone().into_bytes())
                                .into_handle(),
                        );
                        found = true;
                        current.clear();
                        state = Block::Text;
                    }
                }
            }
        }

        if !found {
            return None;
        }

        // An unterminated block is just text.
        match state {
            Block::Uuencode { begin, .. } => {
                push_text(&mut children, &(begin + &current), mime_type);
            }
            _ => push_text(&mut children, &current, mime_type),
        }

        Some(ContentNode::multipart("multipart/mixed", children).into_handle())
    }
}

fn push_text(children: &mut Vec<ContentHandle>, text: &str, mime_type: &str) {
    if text.trim().is_empty() {
        return;
    }
    let content_type = if mime_type.starts_with("text/") {
        mime_type
    } else {
        "text/plain"
    };
    children.push(
        ContentNode::leaf(content_type, text.as_bytes().to_vec())
            .with_param("charset", "utf-8")
            .into_handle(),
    );
}

/// `begin 644 name.ext` → `name.ext`.
fn uuencode_begin(line: &str) -> Option<String> {
    let rest = line.strip_prefix("begin ")?;
    let (mode, name) = rest.split_once(' ')?;
    let is_mode = (3..=4).contains(&mode.len()) && mode.bytes().all(|b| (b'0'..=b'7').contains(&b));
    let name = name.trim();
    (is_mode && !name.is_empty()).then(|| name.to_string())
}

/// Decode the body lines of a uuencoded block.
fn uudecode(body: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for line in body.lines() {
        let bytes = line.as_bytes();
        let Some(&len_char) = bytes.first() else {
            continue;
        };
        let len = usize::from(len_char.wrapping_sub(b' ') & 0x3F);
        if len == 0 {
            continue;
        }
        let sextet = |i: usize| bytes.get(i).map_or(0, |b| b.wrapping_sub(b' ') & 0x3F);
        let mut decoded = Vec::with_capacity(len + 2);
        let mut i = 1;
        while decoded.len() < len {
            let (a, b, c, d) = (sextet(i), sextet(i + 1), sextet(i + 2), sextet(i + 3));
            decoded.push((a << 2) | (b >> 4));
            decoded.push((b << 4) | (c >> 2));
            decoded.push((c << 6) | d);
            i += 4;
        }
        decoded.truncate(len);
        out.extend_from_slice(&decoded);
    }
    out
}
