//! Crypto vault.
//!
//! Authenticated encryption (XChaCha20-Poly1305) under keys derived with
//! HKDF-SHA256 from one process-wide secret. Every sealed blob is bound to
//! a [`SealContext`] so ciphertext cannot be replayed under another session
//! or record. Storage keys and record tags are HMAC-SHA256.

mod errors;
mod keys;
mod sealed;
#[allow(clippy::module_inception)]
mod vault;

pub use errors::VaultError;
pub use keys::{SessionSecret, KEY_LEN};
pub use sealed::{RecordTag, SealContext, SealedBlob, NONCE_LEN, TAG_LEN};
pub use vault::{CryptoVault, MIN_SECRET_LEN};
