//! The crypto vault: authenticated encryption bound to a context label,
//! storage key derivation, and record integrity tags.

use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::keys::{SessionSecret, KEY_LEN};
use super::sealed::{RecordTag, SealContext, SealedBlob, NONCE_LEN};
use super::VaultError;
use crate::domain::foundation::{SessionId, UserId, UserKey};

type HmacSha256 = Hmac<Sha256>;

/// Minimum length of the process-wide secret.
pub const MIN_SECRET_LEN: usize = 16;

const MASTER_SALT: &[u8] = b"growth-coach/vault/v1";
const MASTER_INFO: &[u8] = b"master";
const SEAL_INFO_PREFIX: &[u8] = b"growth-coach/seal/v1|";
const INDEX_INFO: &[u8] = b"growth-coach/index/v1";
const TAG_INFO: &[u8] = b"growth-coach/tag/v1";

/// Process-wide key holder. Built once at startup and shared read-only.
pub struct CryptoVault {
    master: Secret<[u8; KEY_LEN]>,
    index_key: Secret<[u8; KEY_LEN]>,
    tag_key: Secret<[u8; KEY_LEN]>,
}

impl CryptoVault {
    /// Derives all key material from the configured secret.
    ///
    /// # Errors
    ///
    /// `MissingSecret` when the secret is blank, `WeakSecret` when it is
    /// shorter than [`MIN_SECRET_LEN`].
    pub fn from_secret(secret: &Secret<String>) -> Result<Self, VaultError> {
        let raw = secret.expose_secret();
        if raw.trim().is_empty() {
            return Err(VaultError::MissingSecret);
        }
        if raw.chars().count() < MIN_SECRET_LEN {
            return Err(VaultError::WeakSecret {
                min_len: MIN_SECRET_LEN,
            });
        }

        let hk = Hkdf::<Sha256>::new(Some(MASTER_SALT), raw.as_bytes());
        let master = expand(&hk, MASTER_INFO)?;

        let hk = Hkdf::<Sha256>::new(None, &master);
        let index_key = expand(&hk, INDEX_INFO)?;
        let tag_key = expand(&hk, TAG_INFO)?;

        Ok(Self {
            master: Secret::new(master),
            index_key: Secret::new(index_key),
            tag_key: Secret::new(tag_key),
        })
    }

    /// Encrypts `plaintext` under the vault key, bound to `context`.
    pub fn seal(&self, plaintext: &[u8], context: &SealContext) -> Result<SealedBlob, VaultError> {
        self.seal_inner(plaintext, context, None)
    }

    /// Decrypts a blob produced by [`seal`](Self::seal) under the same context.
    ///
    /// # Errors
    ///
    /// `Integrity` on tag mismatch, wrong key, or context mismatch.
    pub fn open(&self, blob: &SealedBlob, context: &SealContext) -> Result<Vec<u8>, VaultError> {
        self.open_inner(blob, context, None)
    }

    /// Encrypts under a key derived from the vault key and a session secret.
    pub fn seal_for_session(
        &self,
        plaintext: &[u8],
        context: &SealContext,
        secret: &SessionSecret,
    ) -> Result<SealedBlob, VaultError> {
        self.seal_inner(plaintext, context, Some(secret.expose()))
    }

    /// Counterpart of [`seal_for_session`](Self::seal_for_session).
    pub fn open_for_session(
        &self,
        blob: &SealedBlob,
        context: &SealContext,
        secret: &SessionSecret,
    ) -> Result<Vec<u8>, VaultError> {
        self.open_inner(blob, context, Some(secret.expose()))
    }

    /// Seals a session secret for storage next to its session record.
    pub fn wrap_session_secret(
        &self,
        session_id: &SessionId,
        secret: &SessionSecret,
    ) -> Result<SealedBlob, VaultError> {
        self.seal(secret.expose(), &SealContext::session_secret(session_id))
    }

    /// Recovers a session secret sealed by [`wrap_session_secret`](Self::wrap_session_secret).
    pub fn unwrap_session_secret(
        &self,
        session_id: &SessionId,
        wrapped: &SealedBlob,
    ) -> Result<SessionSecret, VaultError> {
        let context = SealContext::session_secret(session_id);
        let bytes = self.open(wrapped, &context)?;
        if bytes.len() != KEY_LEN {
            return Err(VaultError::Encoding(format!(
                "invalid session secret length: {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; KEY_LEN];
        out.copy_from_slice(&bytes);
        Ok(SessionSecret::from_bytes(out))
    }

    /// Maps a user-facing identifier to its opaque storage key.
    ///
    /// Deterministic for a given vault secret; a different secret yields
    /// unrelated keys.
    pub fn user_key(&self, user_id: &UserId) -> Result<UserKey, VaultError> {
        let mut mac = hmac_with(self.index_key.expose_secret())?;
        mac.update(b"user:");
        mac.update(user_id.as_str().as_bytes());
        let digest = mac.finalize().into_bytes();
        Ok(UserKey::from_digest(&digest))
    }

    /// Computes an integrity tag over `data`, bound to `context`.
    pub fn tag(&self, data: &[u8], context: &SealContext) -> Result<RecordTag, VaultError> {
        Ok(RecordTag::from_bytes(&self.raw_tag(data, context)?))
    }

    /// Verifies a tag in constant time.
    pub fn verify_tag(
        &self,
        data: &[u8],
        context: &SealContext,
        tag: &RecordTag,
    ) -> Result<(), VaultError> {
        let provided = tag
            .decode()
            .map_err(|_| VaultError::integrity(context.kind()))?;
        let expected = self.raw_tag(data, context)?;
        if expected.ct_eq(provided.as_slice()).into() {
            Ok(())
        } else {
            Err(VaultError::integrity(context.kind()))
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────

    fn raw_tag(&self, data: &[u8], context: &SealContext) -> Result<Vec<u8>, VaultError> {
        let mut mac = hmac_with(self.tag_key.expose_secret())?;
        mac.update(context.label().as_bytes());
        mac.update(&[0u8]);
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn cipher(
        &self,
        context: &SealContext,
        salt: Option<&[u8; KEY_LEN]>,
    ) -> Result<XChaCha20Poly1305, VaultError> {
        let hk = Hkdf::<Sha256>::new(salt.map(|s| s.as_slice()), self.master.expose_secret());
        let mut info = Vec::with_capacity(SEAL_INFO_PREFIX.len() + context.label().len());
        info.extend_from_slice(SEAL_INFO_PREFIX);
        info.extend_from_slice(context.label().as_bytes());
        let key = Secret::new(expand(&hk, &info)?);
        Ok(XChaCha20Poly1305::new(Key::from_slice(key.expose_secret())))
    }

    fn seal_inner(
        &self,
        plaintext: &[u8],
        context: &SealContext,
        salt: Option<&[u8; KEY_LEN]>,
    ) -> Result<SealedBlob, VaultError> {
        let aead = self.cipher(context, salt)?;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = aead
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: context.label().as_bytes(),
                },
            )
            .map_err(|e| VaultError::Encoding(format!("encryption failed: {:?}", e)))?;
        Ok(SealedBlob::new(nonce, ciphertext))
    }

    fn open_inner(
        &self,
        blob: &SealedBlob,
        context: &SealContext,
        salt: Option<&[u8; KEY_LEN]>,
    ) -> Result<Vec<u8>, VaultError> {
        let aead = self.cipher(context, salt)?;
        aead.decrypt(
            XNonce::from_slice(blob.nonce()),
            Payload {
                msg: blob.ciphertext(),
                aad: context.label().as_bytes(),
            },
        )
        .map_err(|_| VaultError::integrity(context.kind()))
    }
}

impl std::fmt::Debug for CryptoVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CryptoVault([REDACTED])")
    }
}

fn expand(hk: &Hkdf<Sha256>, info: &[u8]) -> Result<[u8; KEY_LEN], VaultError> {
    let mut okm = [0u8; KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| VaultError::Encoding(format!("hkdf expand failed: {:?}", e)))?;
    Ok(okm)
}

fn hmac_with(key: &[u8; KEY_LEN]) -> Result<HmacSha256, VaultError> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| VaultError::Encoding(format!("invalid hmac key: {}", e)))
}
