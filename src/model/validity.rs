//! Cryptographic validity annotations attached to parts.

use bitflags::bitflags;

bitflags! {
    /// Which mechanism produced an annotation and what it covers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ValidityKind: u32 {
        const PGP = 1 << 0;
        const SMIME = 1 << 1;
        const SIGNED = 1 << 2;
        const ENCRYPTED = 1 << 3;
    }
}

impl serde::Serialize for ValidityKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        names.serialize(serializer)
    }
}

/// Outcome of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignStatus {
    #[default]
    None,
    Good,
    Bad,
    Unknown,
    NeedPublicKey,
}

/// Strength of the encryption that protected the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptStatus {
    #[default]
    None,
    Weak,
    Encrypted,
    Strong,
}

/// What a cipher backend reported about one signed or encrypted scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ValiditySummary {
    pub sign: SignStatus,
    pub encrypt: EncryptStatus,
    pub sign_description: Option<String>,
    pub encrypt_description: Option<String>,
    /// Signer identities, in the order they were reported.
    pub signers: Vec<String>,
}

impl ValiditySummary {
    pub fn signed(status: SignStatus, signer: Option<&str>) -> Self {
        Self {
            sign: status,
            signers: signer.map(|s| vec![s.to_string()]).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn encrypted(status: EncryptStatus) -> Self {
        Self {
            encrypt: status,
            ..Self::default()
        }
    }

    /// Fold the summary of an inner scope into this (outer) one.
    ///
    /// Signed outside / encrypted inside takes over the encryption status,
    /// encrypted outside / signed inside takes over the signature status.
    /// Signers are unioned.
    pub fn envelope(&mut self, inner: &ValiditySummary) {
        if self.sign != SignStatus::None
            && self.encrypt == EncryptStatus::None
            && inner.sign == SignStatus::None
            && inner.encrypt != EncryptStatus::None
        {
            self.encrypt = inner.encrypt;
            self.encrypt_description = inner.encrypt_description.clone();
        } else if self.sign == SignStatus::None
            && self.encrypt != EncryptStatus::None
            && inner.sign != SignStatus::None
            && inner.encrypt == EncryptStatus::None
        {
            self.sign = inner.sign;
            self.sign_description = inner.sign_description.clone();
        }

        for signer in &inner.signers {
            if !self.signers.contains(signer) {
                self.signers.push(signer.clone());
            }
        }
    }
}

/// One annotation as stored on a part.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidityPair {
    pub kind: ValidityKind,
    pub summary: ValiditySummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_signed_then_encrypted() {
        let mut outer = ValiditySummary::signed(SignStatus::Good, Some("alice@example.com"));
        let inner = ValiditySummary::encrypted(EncryptStatus::Strong);
        outer.envelope(&inner);
        assert_eq!(outer.sign, SignStatus::Good);
        assert_eq!(outer.encrypt, EncryptStatus::Strong);
    }

    #[test]
    fn test_envelope_encrypted_then_signed() {
        let mut outer = ValiditySummary::encrypted(EncryptStatus::Encrypted);
        let inner = ValiditySummary::signed(SignStatus::Bad, Some("mallory@example.com"));
        outer.envelope(&inner);
        assert_eq!(outer.sign, SignStatus::Bad);
        assert_eq!(outer.signers, vec!["mallory@example.com".to_string()]);
    }

    #[test]
    fn test_envelope_same_kind_keeps_outer_status() {
        let mut outer = ValiditySummary::signed(SignStatus::Good, Some("a@x"));
        let inner = ValiditySummary::signed(SignStatus::Bad, Some("a@x"));
        outer.envelope(&inner);
        assert_eq!(outer.sign, SignStatus::Good);
        assert_eq!(outer.signers.len(), 1);
    }
}
