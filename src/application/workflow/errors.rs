//! Workflow error taxonomy.

use std::time::Duration;
use thiserror::Error;

use crate::domain::assessment::ExtractionError;
use crate::domain::foundation::ErrorCode;
use crate::domain::session::SessionError;
use crate::domain::turn::Stage;
use crate::domain::vault::VaultError;
use crate::ports::{AIError, EmbeddingError, StoreError};

/// Errors that end a turn without a recorded outcome.
///
/// Backend failures normally do not show up here: they are recorded as a
/// failed turn and the caller gets the apology response instead.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("reasoning backend unavailable during {stage}: {message}")]
    BackendUnavailable { stage: Stage, message: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("concurrent write rejected: {0}")]
    Conflict(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("malformed backend output during {stage}: {message}")]
    MalformedBackendOutput { stage: Stage, message: String },

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("turn cancelled before memory update")]
    Cancelled,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl WorkflowError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WorkflowError::BackendUnavailable { .. } => ErrorCode::AIProviderError,
            WorkflowError::StoreUnavailable(_) => ErrorCode::DatabaseError,
            WorkflowError::Conflict(_) => ErrorCode::PlanVersionConflict,
            WorkflowError::Integrity(_) => ErrorCode::IntegrityViolation,
            WorkflowError::MalformedBackendOutput { .. } => ErrorCode::MalformedBackendOutput,
            WorkflowError::Embedding(_) => ErrorCode::InternalError,
            WorkflowError::Cancelled => ErrorCode::InvalidStateTransition,
            WorkflowError::Session(e) => e.code(),
            WorkflowError::InvalidInput(_) => ErrorCode::ValidationFailed,
        }
    }

    /// True for integrity failures, which must never be mistaken for
    /// missing records.
    pub fn is_integrity(&self) -> bool {
        match self {
            WorkflowError::Integrity(_) => true,
            WorkflowError::Session(SessionError::Vault(e)) => e.is_integrity(),
            _ => false,
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => WorkflowError::StoreUnavailable(msg),
            StoreError::Conflict(msg) => WorkflowError::Conflict(msg),
            StoreError::Integrity(msg) => WorkflowError::Integrity(msg),
            StoreError::Serialization(msg) => WorkflowError::Integrity(msg),
        }
    }
}

impl From<VaultError> for WorkflowError {
    fn from(err: VaultError) -> Self {
        WorkflowError::Integrity(err.to_string())
    }
}

/// Failure of a single attempt inside a stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Backend(#[from] AIError),

    #[error(transparent)]
    Malformed(#[from] ExtractionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

impl StageError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StageError::Backend(e) => e.is_retryable(),
            StageError::Malformed(_) => true,
            StageError::Store(e) => e.is_retryable(),
            StageError::Timeout(_) => true,
        }
    }

    /// Minimum wait the backend asked for, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            StageError::Backend(AIError::RateLimited { retry_after_secs }) => {
                Some(Duration::from_secs(u64::from(*retry_after_secs)))
            }
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, StageError::Malformed(_))
    }

    /// Lifts an exhausted stage failure into the workflow taxonomy.
    pub fn into_workflow(self, stage: Stage) -> WorkflowError {
        match self {
            StageError::Backend(e) => WorkflowError::BackendUnavailable {
                stage,
                message: e.to_string(),
            },
            StageError::Timeout(d) => WorkflowError::BackendUnavailable {
                stage,
                message: format!("timed out after {:?}", d),
            },
            StageError::Malformed(e) => WorkflowError::MalformedBackendOutput {
                stage,
                message: e.to_string(),
            },
            StageError::Store(e) => e.into(),
        }
    }
}
