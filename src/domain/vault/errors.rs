//! Vault error types.

use thiserror::Error;

/// Errors raised by the crypto vault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Authentication tag mismatch, wrong key, or a blob sealed under a
    /// different context. Never accompanied by plaintext.
    #[error("integrity check failed for {kind} record")]
    Integrity { kind: String },

    /// The process-wide secret is absent. Fatal at startup.
    #[error("vault secret is not configured")]
    MissingSecret,

    /// The configured secret is too short to derive key material from.
    #[error("vault secret must be at least {min_len} characters")]
    WeakSecret { min_len: usize },

    /// Stored bytes are not shaped like a sealed blob or tag.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl VaultError {
    pub fn integrity(kind: impl Into<String>) -> Self {
        VaultError::Integrity { kind: kind.into() }
    }

    /// Returns true for tag/key mismatches.
    pub fn is_integrity(&self) -> bool {
        matches!(self, VaultError::Integrity { .. })
    }
}
