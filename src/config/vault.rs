//! Vault configuration

use secrecy::Secret;
use serde::Deserialize;
use std::fmt;

use super::error::ValidationError;
use crate::domain::vault::MIN_SECRET_LEN;

/// Process-wide encryption secret.
#[derive(Clone, Default, Deserialize)]
pub struct VaultConfig {
    pub secret: Option<String>,
}

impl VaultConfig {
    /// The secret wrapped for handing to the vault.
    pub fn secret(&self) -> Secret<String> {
        Secret::new(self.secret.clone().unwrap_or_default())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.secret.as_deref().unwrap_or("");
        if secret.trim().is_empty() {
            return Err(ValidationError::MissingRequired("VAULT__SECRET"));
        }
        if secret.chars().count() < MIN_SECRET_LEN {
            return Err(ValidationError::WeakVaultSecret(MIN_SECRET_LEN));
        }
        Ok(())
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_missing_secret_is_rejected() {
        assert_eq!(
            VaultConfig::default().validate(),
            Err(ValidationError::MissingRequired("VAULT__SECRET"))
        );
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let config = VaultConfig {
            secret: Some("short".to_string()),
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::WeakVaultSecret(MIN_SECRET_LEN))
        );
    }

    #[test]
    fn test_secret_is_exposed_only_through_secrecy() {
        let config = VaultConfig {
            secret: Some("a-long-enough-vault-secret".to_string()),
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.secret().expose_secret(), "a-long-enough-vault-secret");
        assert!(!format!("{:?}", config).contains("long-enough"));
    }
}
