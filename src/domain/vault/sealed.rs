//! Sealed payloads and the contexts they are bound to.

use serde::{Deserialize, Serialize};

use super::VaultError;
use crate::domain::foundation::{SessionId, UserKey};

/// XChaCha20-Poly1305 nonce length.
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag length appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Label bound into both the derived key and the AEAD associated data.
///
/// A blob sealed under one context cannot be opened under another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SealContext {
    label: String,
}

impl SealContext {
    /// Context for turns belonging to a session.
    pub fn session(session_id: &SessionId) -> Self {
        Self {
            label: format!("session:{}", session_id),
        }
    }

    /// Context for the wrapped per-session secret.
    pub fn session_secret(session_id: &SessionId) -> Self {
        Self {
            label: format!("session-secret:{}", session_id),
        }
    }

    /// Context for a user's profile record.
    pub fn profile(user_key: &UserKey) -> Self {
        Self {
            label: format!("profile:{}", user_key),
        }
    }

    /// Context for one version of a user's plan.
    pub fn plan(user_key: &UserKey, version: u64) -> Self {
        Self {
            label: format!("plan:{}:{}", user_key, version),
        }
    }

    /// Context for a session record's integrity tag.
    pub fn session_record(session_id: &SessionId) -> Self {
        Self {
            label: format!("session-record:{}", session_id),
        }
    }

    /// Arbitrary label.
    pub fn custom(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The part of the label before the first `:`, safe to log.
    pub fn kind(&self) -> &str {
        self.label.split(':').next().unwrap_or("record")
    }
}

/// Nonce plus ciphertext-with-tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlob {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl SealedBlob {
    pub(crate) fn new(nonce: [u8; NONCE_LEN], ciphertext: Vec<u8>) -> Self {
        Self { nonce, ciphertext }
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialized form: `nonce || ciphertext || tag`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parses the serialized form. Anything shorter than a nonce plus a tag
    /// cannot be a valid blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::Encoding(format!(
                "sealed blob too short: {} bytes",
                bytes.len()
            )));
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);
        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_LEN..].to_vec(),
        })
    }

    /// Flips one ciphertext bit. Test helper for tamper scenarios.
    #[cfg(test)]
    pub(crate) fn tampered(&self) -> Self {
        let mut ciphertext = self.ciphertext.clone();
        if let Some(first) = ciphertext.first_mut() {
            *first ^= 0x01;
        }
        Self {
            nonce: self.nonce,
            ciphertext,
        }
    }
}

/// HMAC-SHA256 tag over a record's plaintext fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordTag(String);

impl RecordTag {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn from_hex(hex_str: impl Into<String>) -> Self {
        Self(hex_str.into())
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    pub(crate) fn decode(&self) -> Result<Vec<u8>, VaultError> {
        hex::decode(&self.0).map_err(|e| VaultError::Encoding(format!("record tag: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_kind_is_label_prefix() {
        let id = SessionId::new();
        assert_eq!(SealContext::session(&id).kind(), "session");
        assert_eq!(SealContext::session_secret(&id).kind(), "session-secret");
        assert_eq!(SealContext::custom("plain").kind(), "plain");
    }

    #[test]
    fn contexts_for_different_sessions_differ() {
        assert_ne!(
            SealContext::session(&SessionId::new()),
            SealContext::session(&SessionId::new())
        );
    }

    #[test]
    fn blob_bytes_roundtrip() {
        let blob = SealedBlob::new([7u8; NONCE_LEN], vec![1u8; TAG_LEN + 3]);
        let parsed = SealedBlob::from_bytes(&blob.to_bytes()).unwrap();
        assert_eq!(parsed, blob);
    }

    #[test]
    fn short_bytes_are_an_encoding_error() {
        let err = SealedBlob::from_bytes(&[0u8; NONCE_LEN]).unwrap_err();
        assert!(matches!(err, VaultError::Encoding(_)));
    }
}
