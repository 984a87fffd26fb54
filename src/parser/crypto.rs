//! Boundary to a signature-verification and decryption backend.
//!
//! The crate ships no cryptography. Callers plug a backend in with
//! [`Parser::with_cipher`](super::Parser::with_cipher); without one the
//! signed and encrypted handlers report an error part and show the
//! content they can.

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::model::document::ContentHandle;
use crate::model::validity::{ValidityKind, ValiditySummary};

pub const PGP_SIGNATURE_PROTOCOL: &str = "application/pgp-signature";
pub const PGP_ENCRYPTED_PROTOCOL: &str = "application/pgp-encrypted";
pub const PKCS7_SIGNATURE_PROTOCOL: &str = "application/pkcs7-signature";
pub const PKCS7_MIME_PROTOCOL: &str = "application/pkcs7-mime";

/// Message used when no backend was configured.
pub const NO_BACKEND: &str = "no cipher backend configured";

/// A signature-verification and decryption backend.
pub trait CipherContext: Send + Sync {
    /// Verify a signed node (`multipart/signed`, an inline PGP block or
    /// S/MIME signed data).
    fn verify(
        &self,
        node: &ContentHandle,
        protocol: &str,
        cancel: &CancellationToken,
    ) -> Result<ValiditySummary>;

    /// Decrypt an encrypted node, returning the decrypted content as a new
    /// node together with what the backend learned about it.
    fn decrypt(
        &self,
        node: &ContentHandle,
        protocol: &str,
        cancel: &CancellationToken,
    ) -> Result<(ContentHandle, ValiditySummary)>;
}

/// Mechanism behind a `multipart/signed` `protocol` parameter.
pub fn signature_kind(protocol: &str) -> Option<ValidityKind> {
    match protocol.trim().to_ascii_lowercase().as_str() {
        PGP_SIGNATURE_PROTOCOL => Some(ValidityKind::PGP),
        PKCS7_SIGNATURE_PROTOCOL | "application/x-pkcs7-signature" => {
            Some(ValidityKind::SMIME)
        }
        _ => None,
    }
}
