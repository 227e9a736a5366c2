//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `GROWTH_COACH` prefix
//! and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use growth_coach::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod error;
mod logging;
mod store;
mod vault;
mod workflow;

pub use ai::AiConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::{LogFormat, LoggingConfig};
pub use store::{StoreBackend, StoreConfig};
pub use vault::VaultConfig;
pub use workflow::WorkflowConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Reasoning backend (Anthropic)
    #[serde(default)]
    pub ai: AiConfig,

    /// Encryption secret
    #[serde(default)]
    pub vault: VaultConfig,

    /// Structured and semantic store
    #[serde(default)]
    pub store: StoreConfig,

    /// Retry policy and seeding
    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `GROWTH_COACH` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `GROWTH_COACH__AI__ANTHROPIC_API_KEY=...` -> `ai.anthropic_api_key`
    /// - `GROWTH_COACH__STORE__URL=postgres://...` -> `store.url`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("GROWTH_COACH")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values.
    ///
    /// A missing reasoning credential or vault secret is fatal at startup.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.vault.validate()?;
        self.ai.validate()?;
        self.store.validate()?;
        self.workflow.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("GROWTH_COACH__AI__ANTHROPIC_API_KEY", "sk-ant-xxx");
        env::set_var("GROWTH_COACH__VAULT__SECRET", "a-sufficiently-long-secret");
    }

    fn clear_env() {
        for key in [
            "GROWTH_COACH__AI__ANTHROPIC_API_KEY",
            "GROWTH_COACH__VAULT__SECRET",
            "GROWTH_COACH__STORE__URL",
            "GROWTH_COACH__WORKFLOW__MAX_ATTEMPTS",
            "GROWTH_COACH__WORKFLOW__SEED_K",
            "GROWTH_COACH__LOGGING__FORMAT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.ai.anthropic_api_key.as_deref(), Some("sk-ant-xxx"));
        assert_eq!(config.store.url, "memory://");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("GROWTH_COACH__WORKFLOW__MAX_ATTEMPTS", "5");
        env::set_var("GROWTH_COACH__WORKFLOW__SEED_K", "2");
        env::set_var("GROWTH_COACH__LOGGING__FORMAT", "json");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.workflow.max_attempts, 5);
        assert_eq!(config.workflow.seed_k, 2);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_secret_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("GROWTH_COACH__AI__ANTHROPIC_API_KEY", "sk-ant-xxx");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("VAULT__SECRET"))
        );
    }

    #[test]
    fn test_default_config_is_invalid() {
        assert!(AppConfig::default().validate().is_err());
    }
}
