//! JSON-then-seal helpers for records kept under the vault key.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::vault::{CryptoVault, SealContext, SealedBlob, VaultError};

pub(crate) fn seal_json<T: Serialize>(
    vault: &CryptoVault,
    value: &T,
    context: &SealContext,
) -> Result<SealedBlob, VaultError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| VaultError::Encoding(format!("{} serialization: {}", context.kind(), e)))?;
    vault.seal(&bytes, context)
}

pub(crate) fn open_json<T: DeserializeOwned>(
    vault: &CryptoVault,
    blob: &SealedBlob,
    context: &SealContext,
) -> Result<T, VaultError> {
    let bytes = vault.open(blob, context)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| VaultError::Encoding(format!("{} deserialization: {}", context.kind(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserKey;
    use crate::domain::profile::Profile;
    use secrecy::Secret;

    #[test]
    fn profile_survives_sealing_and_is_bound_to_its_owner() {
        let vault =
            CryptoVault::from_secret(&Secret::new("sealing-test-secret-01".to_string())).unwrap();
        let key = UserKey::new("0a0b0c").unwrap();
        let profile = Profile::new_default(key.clone());

        let blob = seal_json(&vault, &profile, &SealContext::profile(&key)).unwrap();
        let back: Profile = open_json(&vault, &blob, &SealContext::profile(&key)).unwrap();
        assert_eq!(back, profile);

        let other = UserKey::new("ffff").unwrap();
        let err = open_json::<Profile>(&vault, &blob, &SealContext::profile(&other)).unwrap_err();
        assert!(err.is_integrity());
    }
}
