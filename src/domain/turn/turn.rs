//! Turn records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::assessment::{Assessment, NeedsEvaluation, ProgressFeedback};
use crate::domain::foundation::{DomainError, PlanVersion, SessionId, Timestamp};
use crate::domain::plan::{PlanCategory, TargetKind};
use crate::domain::vault::{CryptoVault, SealContext, SealedBlob, SessionSecret, VaultError};

/// Maximum accepted input length in characters.
pub const MAX_INPUT_LENGTH: usize = 4_000;

/// How a turn's input is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnMode {
    /// A fresh request; runs the full pipeline.
    Request,
    /// A weekly progress update; skips assessment.
    WeeklyUpdate,
}

impl fmt::Display for TurnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnMode::Request => f.write_str("request"),
            TurnMode::WeeklyUpdate => f.write_str("weekly_update"),
        }
    }
}

/// Pipeline stage names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Assessment,
    ProfileResolution,
    NeedsEvaluation,
    PlanSynthesis,
    ProgressReview,
    MemoryUpdate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Assessment => "assessment",
            Stage::ProfileResolution => "profile_resolution",
            Stage::NeedsEvaluation => "needs_evaluation",
            Stage::PlanSynthesis => "plan_synthesis",
            Stage::ProgressReview => "progress_review",
            Stage::MemoryUpdate => "memory_update",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated user input for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnInput {
    mode: TurnMode,
    text: String,
}

impl TurnInput {
    /// # Errors
    ///
    /// `EmptyInput` for a blank request or weekly update, `ValidationFailed`
    /// when the text is too long.
    pub fn new(mode: TurnMode, text: impl Into<String>) -> Result<Self, DomainError> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(DomainError::new(
                crate::domain::foundation::ErrorCode::EmptyInput,
                format!("{} text cannot be empty", mode),
            ));
        }
        if text.chars().count() > MAX_INPUT_LENGTH {
            return Err(DomainError::validation(
                "input",
                format!("Input must be {} characters or less", MAX_INPUT_LENGTH),
            ));
        }
        Ok(Self { mode, text })
    }

    pub fn request(text: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(TurnMode::Request, text)
    }

    pub fn weekly_update(text: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(TurnMode::WeeklyUpdate, text)
    }

    pub fn mode(&self) -> TurnMode {
        self.mode
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A numeric suggestion that had to be brought into its safe range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClampNote {
    pub category: PlanCategory,
    pub kind: TargetKind,
    pub suggested: f64,
    pub applied: f64,
}

/// Everything the stages produced for a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutputs {
    pub assessment: Option<Assessment>,
    pub needs: Option<NeedsEvaluation>,
    pub plan_version: Option<PlanVersion>,
    pub changed_categories: Vec<PlanCategory>,
    pub clamped: Vec<ClampNote>,
    pub progress: Option<ProgressFeedback>,
    pub profile_conflicts: Vec<String>,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    AssessmentFailed { reason: String },
    Failed { stage: Stage, reason: String },
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TurnOutcome::Completed => "completed",
            TurnOutcome::AssessmentFailed { .. } => "assessment_failed",
            TurnOutcome::Failed { .. } => "failed",
        }
    }
}

/// The content of one processed interaction. Immutable once recorded;
/// corrections are new turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub mode: TurnMode,
    pub input: String,
    pub outputs: StageOutputs,
    pub outcome: TurnOutcome,
    pub response: String,
    pub created_at: Timestamp,
}

impl Turn {
    pub fn new(
        input: &TurnInput,
        outputs: StageOutputs,
        outcome: TurnOutcome,
        response: impl Into<String>,
    ) -> Self {
        Self {
            mode: input.mode(),
            input: input.text().to_string(),
            outputs,
            outcome,
            response: response.into(),
            created_at: Timestamp::now(),
        }
    }

    /// Seals this turn under the session's key.
    pub fn seal(
        &self,
        vault: &CryptoVault,
        session_id: &SessionId,
        secret: &SessionSecret,
    ) -> Result<SealedBlob, VaultError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| VaultError::Encoding(format!("turn serialization: {}", e)))?;
        vault.seal_for_session(&bytes, &SealContext::session(session_id), secret)
    }

    /// Opens a turn sealed by [`Turn::seal`].
    pub fn open(
        blob: &SealedBlob,
        vault: &CryptoVault,
        session_id: &SessionId,
        secret: &SessionSecret,
    ) -> Result<Self, VaultError> {
        let bytes = vault.open_for_session(blob, &SealContext::session(session_id), secret)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| VaultError::Encoding(format!("turn deserialization: {}", e)))
    }
}

/// A turn together with the sequence number the store assigned it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTurn {
    pub sequence: u64,
    pub turn: Turn,
}
