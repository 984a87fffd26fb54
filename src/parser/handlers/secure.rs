//! Signed and encrypted containers. The cipher backend does the work; these
//! handlers decompose what it returns and annotate the produced parts.

use tracing::warn;

use super::multipart::parse_mixed;
use crate::error::{FormatError, Result};
use crate::model::document::{ContentHandle, ContentNode};
use crate::model::part::{Part, SECURE_BUTTON_TYPE, SUFFIX_SECURE_BUTTON};
use crate::model::validity::{ValidityKind, ValiditySummary};
use crate::parser::crypto::{
    signature_kind, CipherContext, NO_BACKEND, PGP_ENCRYPTED_PROTOCOL, PGP_SIGNATURE_PROTOCOL,
    PKCS7_MIME_PROTOCOL,
};
use crate::parser::inline::{INLINE_PGP_ENCRYPTED_TYPE, INLINE_PGP_SIGNED_TYPE};
use crate::parser::{ParseContext, Parser, ParserHandler};
use crate::registry::Extension;

fn cipher(parser: &Parser) -> Result<&dyn CipherContext> {
    parser
        .cipher()
        .ok_or_else(|| FormatError::Cipher(NO_BACKEND.to_string()))
}

fn annotate(parts: &mut [Part], kind: ValidityKind, summary: &ValiditySummary) {
    for part in parts {
        part.update_validity(kind, summary);
    }
}

/// The trust indicator closing a signed or encrypted scope.
fn secure_button(part_id: &str, kind: ValidityKind, summary: &ValiditySummary) -> Part {
    let id = format!("{part_id}{SUFFIX_SECURE_BUTTON}");
    let mut button = Part::synthetic(id, SECURE_BUTTON_TYPE);
    button.is_printable = false;
    button.update_validity(kind, summary);
    button
}

/// Decompose `content` as the protected payload of a secure scope.
#[allow(clippy::too_many_arguments)]
fn parse_protected(
    parser: &Parser,
    ctx: &ParseContext<'_>,
    content: &ContentHandle,
    scope_id: &str,
    part_id: &str,
    kind: ValidityKind,
    summary: &ValiditySummary,
    out: &mut Vec<Part>,
) {
    let mut work = Vec::new();
    parser.parse_part(ctx, content, scope_id, &mut work);
    annotate(&mut work, kind, summary);
    out.append(&mut work);
    out.push(secure_button(part_id, kind, summary));
}

/// `multipart/signed` (PGP/MIME and S/MIME detached signatures).
pub struct SignedHandler;

impl Extension for SignedHandler {
    fn mime_types(&self) -> &[&str] {
        &["multipart/signed"]
    }

    fn name(&self) -> &str {
        "multipart/signed"
    }
}

impl ParserHandler for SignedHandler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        let content = node
            .children()
            .first()
            .ok_or_else(|| FormatError::MimeError("signed container has no content".into()))?;

        let protocol = node.param("protocol").unwrap_or_default().to_ascii_lowercase();
        let Some(kind) = signature_kind(&protocol) else {
            parser.error(out, &format!("Unsupported signature format \"{protocol}\""));
            parse_mixed(parser, ctx, node, part_id, out);
            return Ok(true);
        };

        match cipher(parser).and_then(|c| c.verify(node, &protocol, ctx.cancel())) {
            Ok(summary) => {
                let scope_id = format!("{part_id}.signed.0");
                let kind = kind | ValidityKind::SIGNED;
                parse_protected(parser, ctx, content, &scope_id, part_id, kind, &summary, out);
            }
            Err(e) => {
                warn!(part_id, error = %e, "Signature not verified");
                parser.error(out, &format!("Could not verify signature: {e}"));
                parse_mixed(parser, ctx, node, part_id, out);
            }
        }
        Ok(true)
    }
}

/// `multipart/encrypted` with PGP/MIME.
pub struct EncryptedHandler;

impl Extension for EncryptedHandler {
    fn mime_types(&self) -> &[&str] {
        &["multipart/encrypted"]
    }

    fn name(&self) -> &str {
        "multipart/encrypted"
    }
}

impl ParserHandler for EncryptedHandler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        let protocol = node.param("protocol").unwrap_or_default().to_ascii_lowercase();
        if protocol != PGP_ENCRYPTED_PROTOCOL {
            parser.error(out, &format!("Unsupported encryption type \"{protocol}\""));
            parse_mixed(parser, ctx, node, part_id, out);
            return Ok(true);
        }

        match cipher(parser).and_then(|c| c.decrypt(node, &protocol, ctx.cancel())) {
            Ok((decrypted, summary)) => {
                let scope_id = format!("{part_id}.encrypted-pgp");
                let kind = ValidityKind::PGP | ValidityKind::ENCRYPTED;
                parse_protected(parser, ctx, &decrypted, &scope_id, part_id, kind, &summary, out);
            }
            Err(e) => {
                warn!(part_id, error = %e, "Decryption failed");
                parser.error(out, &format!("Could not parse PGP/MIME message: {e}"));
                parse_mixed(parser, ctx, node, part_id, out);
            }
        }
        Ok(true)
    }
}

/// S/MIME `application/pkcs7-mime`, enveloped or opaque-signed.
pub struct Pkcs7Handler;

impl Extension for Pkcs7Handler {
    fn mime_types(&self) -> &[&str] {
        &["application/pkcs7-mime", "application/x-pkcs7-mime"]
    }

    fn name(&self) -> &str {
        "application/pkcs7-mime"
    }
}

impl ParserHandler for Pkcs7Handler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        let signed_only = node
            .param("smime-type")
            .is_some_and(|t| t.eq_ignore_ascii_case("signed-data"));
        let kind = if signed_only {
            ValidityKind::SMIME | ValidityKind::SIGNED
        } else {
            ValidityKind::SMIME | ValidityKind::ENCRYPTED
        };

        match cipher(parser).and_then(|c| c.decrypt(node, PKCS7_MIME_PROTOCOL, ctx.cancel())) {
            Ok((decrypted, summary)) => {
                let scope_id = format!("{part_id}.encrypted-smime");
                parse_protected(parser, ctx, &decrypted, &scope_id, part_id, kind, &summary, out);
            }
            Err(e) => {
                warn!(part_id, error = %e, "S/MIME content not readable");
                parser.error(out, &format!("Could not parse S/MIME message: {e}"));
                let mut wrapped = Vec::new();
                parser.wrap_as_attachment(node, part_id, &mut wrapped);
                out.append(&mut wrapped);
            }
        }
        Ok(true)
    }
}

/// Clear-signed PGP text found inside a text body.
pub struct InlinePgpSignedHandler;

impl Extension for InlinePgpSignedHandler {
    fn mime_types(&self) -> &[&str] {
        &[INLINE_PGP_SIGNED_TYPE]
    }

    fn name(&self) -> &str {
        "inline-pgp-signed"
    }
}

impl ParserHandler for InlinePgpSignedHandler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        let armored = String::from_utf8_lossy(node.content().unwrap_or_default()).into_owned();
        let clear = ContentNode::leaf("text/plain", clear_signed_text(&armored))
            .with_param("charset", "utf-8")
            .into_handle();
        let mut text = parser
            .new_part(&clear, format!("{part_id}.inlinepgp_signed"))
            .with_type("text/plain");

        match cipher(parser).and_then(|c| c.verify(node, PGP_SIGNATURE_PROTOCOL, ctx.cancel())) {
            Ok(summary) => {
                let kind = ValidityKind::PGP | ValidityKind::SIGNED;
                text.update_validity(kind, &summary);
                out.push(text);
                out.push(secure_button(part_id, kind, &summary));
            }
            Err(e) => {
                warn!(part_id, error = %e, "Inline signature not verified");
                parser.error(out, &format!("Could not verify signature: {e}"));
                out.push(text);
            }
        }
        Ok(true)
    }
}

/// An armored PGP message found inside a text body.
pub struct InlinePgpEncryptedHandler;

impl Extension for InlinePgpEncryptedHandler {
    fn mime_types(&self) -> &[&str] {
        &[INLINE_PGP_ENCRYPTED_TYPE]
    }

    fn name(&self) -> &str {
        "inline-pgp-encrypted"
    }
}

impl ParserHandler for InlinePgpEncryptedHandler {
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool> {
        let scope_id = format!("{part_id}.inlinepgp_encrypted");
        match cipher(parser).and_then(|c| c.decrypt(node, PGP_ENCRYPTED_PROTOCOL, ctx.cancel())) {
            Ok((decrypted, summary)) => {
                let kind = ValidityKind::PGP | ValidityKind::ENCRYPTED;
                parse_protected(parser, ctx, &decrypted, &scope_id, part_id, kind, &summary, out);
            }
            Err(e) => {
                warn!(part_id, error = %e, "Inline PGP message not decrypted");
                parser.error(out, &format!("Could not decrypt PGP message: {e}"));
                // Show the armor as text.
                out.push(parser.new_part(node, scope_id).with_type("text/plain"));
            }
        }
        Ok(true)
    }
}

/// The signed text of a clear-signed block, dash-escaping undone.
fn clear_signed_text(armored: &str) -> String {
    let mut lines = armored.lines();
    // Armor line, then hash headers up to the first blank line.
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
    }

    let mut text = String::new();
    for line in lines {
        if line.trim_end() == "-----BEGIN PGP SIGNATURE-----" {
            break;
        }
        text.push_str(line.strip_prefix("- ").unwrap_or(line));
        text.push('\n');
    }
    text
}
