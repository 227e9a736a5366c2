//! Key material types.

use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use std::fmt;

/// Length of every symmetric key and session secret.
pub const KEY_LEN: usize = 32;

/// Random per-session secret. Mixed into every turn key of its session
/// as the HKDF salt.
pub struct SessionSecret(Secret<[u8; KEY_LEN]>);

impl SessionSecret {
    /// Draws a fresh secret from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(Secret::new(bytes))
    }

    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Secret::new(bytes))
    }

    pub(crate) fn expose(&self) -> &[u8; KEY_LEN] {
        self.0.expose_secret()
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret([REDACTED])")
    }
}
