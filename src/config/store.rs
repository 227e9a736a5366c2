//! Structured store configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Which store backend a URL selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `memory://` or a PostgreSQL connection URL
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl StoreConfig {
    pub fn backend(&self) -> Option<StoreBackend> {
        if self.url.starts_with("memory://") {
            Some(StoreBackend::Memory)
        } else if self.url.starts_with("postgres://") || self.url.starts_with("postgresql://") {
            Some(StoreBackend::Postgres)
        } else {
            None
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.backend().is_none() {
            return Err(ValidationError::UnsupportedStoreUrl);
        }
        if self.max_connections == 0 || self.max_connections > 100 {
            return Err(ValidationError::InvalidPoolSize);
        }
        if self.acquire_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("store"));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

fn default_url() -> String {
    "memory://".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_defaults_to_memory() {
        let config = StoreConfig::default();
        assert_eq!(config.backend(), Some(StoreBackend::Memory));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_postgres_urls_are_recognised() {
        for url in ["postgres://u@h/db", "postgresql://u@h/db"] {
            let config = StoreConfig {
                url: url.to_string(),
                ..Default::default()
            };
            assert_eq!(config.backend(), Some(StoreBackend::Postgres));
        }
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        let config = StoreConfig {
            url: "mysql://u@h/db".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::UnsupportedStoreUrl));
    }

    #[test]
    fn test_pool_size_bounds() {
        let config = StoreConfig {
            max_connections: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidPoolSize));
    }
}
