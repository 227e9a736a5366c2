//! Workflow engine configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::embedding::DEFAULT_DIMENSIONS;

/// Retry, timeout and seeding knobs for the workflow engine.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Attempts per backend call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Upper bound on a single backend or store call
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Number of similar profiles fed into needs evaluation (0 disables)
    #[serde(default)]
    pub seed_k: usize,

    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
}

impl WorkflowConfig {
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidRetryAttempts);
        }
        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(ValidationError::InvalidBackoff);
        }
        if self.stage_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("workflow stage"));
        }
        if self.embedding_dimensions == 0 || self.embedding_dimensions > 4096 {
            return Err(ValidationError::InvalidEmbeddingDimensions);
        }
        Ok(())
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            stage_timeout_secs: default_stage_timeout(),
            seed_k: 0,
            embedding_dimensions: default_embedding_dimensions(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_stage_timeout() -> u64 {
    90
}

fn default_embedding_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_defaults_are_valid() {
        let config = WorkflowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_backoff(), Duration::from_millis(500));
        assert_eq!(config.stage_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = WorkflowConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidRetryAttempts));
    }

    #[test]
    fn test_inverted_backoff_rejected() {
        let config = WorkflowConfig {
            base_backoff_ms: 10_000,
            max_backoff_ms: 100,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBackoff));
    }
}
