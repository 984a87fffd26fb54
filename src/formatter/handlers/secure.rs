use std::io::Write;

use crate::error::Result;
use crate::formatter::html::escape;
use crate::formatter::{FormatContext, Formatter, FormatterHandler};
use crate::model::part::{Part, SECURE_BUTTON_TYPE};
use crate::model::validity::{EncryptStatus, SignStatus, ValidityKind};
use crate::registry::Extension;

/// Trust indicator of a signed or encrypted scope.
pub struct SecureButtonRenderer;

impl Extension for SecureButtonRenderer {
    fn mime_types(&self) -> &[&str] {
        &[SECURE_BUTTON_TYPE]
    }

    fn name(&self) -> &str {
        "secure-button"
    }
}

impl FormatterHandler for SecureButtonRenderer {
    fn format(
        &self,
        _formatter: &Formatter,
        _ctx: &FormatContext<'_>,
        part: &Part,
        sink: &mut dyn Write,
    ) -> Result<bool> {
        if part.validity.is_empty() {
            return Ok(false);
        }

        write!(sink, "<div class=\"secure-button\" id=\"{}\">\n", escape(&part.id))?;
        for pair in &part.validity {
            let mechanism = if pair.kind.contains(ValidityKind::SMIME) {
                "S/MIME"
            } else {
                "PGP"
            };
            let summary = &pair.summary;

            if pair.kind.contains(ValidityKind::SIGNED) {
                let (class, label) = sign_label(summary.sign);
                let mut line = format!("{mechanism} {label}");
                if !summary.signers.is_empty() {
                    line.push_str(" by ");
                    line.push_str(&summary.signers.join(", "));
                }
                write_status(sink, class, &line, summary.sign_description.as_deref())?;
            }
            if pair.kind.contains(ValidityKind::ENCRYPTED) {
                let (class, label) = encrypt_label(summary.encrypt);
                let line = format!("{mechanism} {label}");
                write_status(sink, class, &line, summary.encrypt_description.as_deref())?;
            }
        }
        sink.write_all(b"</div>\n")?;
        Ok(true)
    }
}

fn write_status(
    sink: &mut dyn Write,
    class: &str,
    line: &str,
    description: Option<&str>,
) -> Result<()> {
    write!(sink, "<div class=\"{class}\">{}", escape(line))?;
    if let Some(description) = description {
        write!(sink, "<pre class=\"description\">{}</pre>", escape(description))?;
    }
    sink.write_all(b"</div>\n")?;
    Ok(())
}

fn sign_label(status: SignStatus) -> (&'static str, &'static str) {
    match status {
        SignStatus::Good => ("sign-good", "valid signature"),
        SignStatus::Bad => ("sign-bad", "invalid signature"),
        SignStatus::NeedPublicKey => ("sign-unknown", "signature, public key not available"),
        SignStatus::Unknown => ("sign-unknown", "signature could not be verified"),
        SignStatus::None => ("sign-none", "unsigned"),
    }
}

fn encrypt_label(status: EncryptStatus) -> (&'static str, &'static str) {
    match status {
        EncryptStatus::Strong => ("encrypt-strong", "strongly encrypted"),
        EncryptStatus::Encrypted => ("encrypt-ok", "encrypted"),
        EncryptStatus::Weak => ("encrypt-weak", "weakly encrypted"),
        EncryptStatus::None => ("encrypt-none", "not encrypted"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cancel::CancellationToken;
    use crate::formatter::Mode;
    use crate::model::document::{ContentNode, Document};
    use crate::model::part_list::PartList;
    use crate::model::validity::ValiditySummary;

    #[test]
    fn test_signed_and_encrypted_button() {
        let mut part = Part::synthetic(".message.secure_button", SECURE_BUTTON_TYPE);
        part.update_validity(
            ValidityKind::PGP | ValidityKind::SIGNED,
            &ValiditySummary::signed(SignStatus::Good, Some("alice@example.com")),
        );
        part.update_validity(
            ValidityKind::PGP | ValidityKind::ENCRYPTED,
            &ValiditySummary::encrypted(EncryptStatus::Strong),
        );

        let doc = Document::new(ContentNode::leaf("text/plain", "").into_handle());
        let list = PartList::new(Arc::new(doc), None, None);
        let cancel = CancellationToken::new();
        let ctx = FormatContext::new(&list, Mode::Normal, &cancel);
        let mut out = Vec::new();
        assert!(SecureButtonRenderer
            .format(&Formatter::empty(), &ctx, &part, &mut out)
            .unwrap());
        let html = String::from_utf8(out).unwrap();
        assert!(html.contains("PGP valid signature by alice@example.com"));
        assert!(html.contains("PGP strongly encrypted"));
    }

    #[test]
    fn test_pgp_inside_smime_keeps_both_results() {
        let mut part = Part::synthetic(".message.secure_button", SECURE_BUTTON_TYPE);
        part.update_validity(
            ValidityKind::SMIME | ValidityKind::SIGNED,
            &ValiditySummary::signed(SignStatus::Bad, Some("mallory")),
        );
        part.update_validity(
            ValidityKind::PGP | ValidityKind::SIGNED,
            &ValiditySummary::signed(SignStatus::Good, Some("alice")),
        );

        let doc = Document::new(ContentNode::leaf("text/plain", "").into_handle());
        let list = PartList::new(Arc::new(doc), None, None);
        let cancel = CancellationToken::new();
        let ctx = FormatContext::new(&list, Mode::Normal, &cancel);
        let mut out = Vec::new();
        assert!(SecureButtonRenderer
            .format(&Formatter::empty(), &ctx, &part, &mut out)
            .unwrap());
        let html = String::from_utf8(out).unwrap();
        assert!(html.contains("<div class=\"sign-bad\">S/MIME invalid signature by mallory</div>"));
        assert!(html.contains("<div class=\"sign-good\">PGP valid signature by alice</div>"));
    }

    #[test]
    fn test_button_without_validity_declines() {
        let part = Part::synthetic(".message.secure_button", SECURE_BUTTON_TYPE);
        let doc = Document::new(ContentNode::leaf("text/plain", "").into_handle());
        let list = PartList::new(Arc::new(doc), None, None);
        let cancel = CancellationToken::new();
        let ctx = FormatContext::new(&list, Mode::Normal, &cancel);
        let mut out = Vec::new();
        assert!(!SecureButtonRenderer
            .format(&Formatter::empty(), &ctx, &part, &mut out)
            .unwrap());
    }
}
