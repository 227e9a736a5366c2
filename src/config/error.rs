//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Vault secret must be at least {0} characters")]
    WeakVaultSecret(usize),

    #[error("Unsupported store URL (expected memory:// or postgres://)")]
    UnsupportedStoreUrl,

    #[error("Pool size must be between 1 and 100")]
    InvalidPoolSize,

    #[error("Invalid timeout for {0}")]
    InvalidTimeout(&'static str),

    #[error("Retry attempts must be at least 1")]
    InvalidRetryAttempts,

    #[error("Base backoff exceeds max backoff")]
    InvalidBackoff,

    #[error("Embedding dimensions must be between 1 and 4096")]
    InvalidEmbeddingDimensions,
}
