//! Workflow Engine - drives one turn through the stage pipeline.
//!
//! ```text
//! Request:       Assessment → ProfileResolution → NeedsEvaluation → PlanSynthesis → MemoryUpdate
//! WeeklyUpdate:               ProfileResolution → NeedsEvaluation → ProgressReview
//!                                                                  → PlanSynthesis → MemoryUpdate
//! ```
//!
//! The session's working-state lock is held for the whole turn, so a
//! session never processes two turns at once. Backend failures that
//! survive the retry budget are recorded as failed turns and answered with
//! the apology. Store failures abort the turn with nothing recorded.
//!
//! Memory update writes the profile first, then the plan, then the turn.
//! A turn record only exists once everything it refers to is durable.

use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use super::backend::BackendClient;
use super::errors::{StageError, WorkflowError};
use super::prompts::{self, NeedsFocus};
use super::response::{self, ResponseParts, APOLOGY};
use super::retry::RetryPolicy;
use crate::application::plan_synthesizer::{PlanSynthesizer, Synthesis, SynthesisInput};
use crate::application::sealing::{open_json, seal_json};
use crate::application::session_manager::{SessionHandle, WorkingState};
use crate::domain::assessment::{Assessment, NeedsEvaluation, ProgressFeedback};
use crate::domain::foundation::{Timestamp, UserKey};
use crate::domain::plan::{Plan, PlanCategory};
use crate::domain::profile::{MergeReport, Profile};
use crate::domain::session::SessionError;
use crate::domain::turn::{Stage, StageOutputs, Turn, TurnInput, TurnMode, TurnOutcome};
use crate::domain::vault::{CryptoVault, SealContext};
use crate::ports::{
    AIProvider, CompletionPurpose, Embedder, MemoryStore, RequestMetadata, StoreError,
    StoredPlan, StoredProfile,
};

/// What a processed turn produced.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub sequence: u64,
    pub turn: Turn,
    /// The user's current plan after this turn, if any exists.
    pub plan: Option<Plan>,
}

impl TurnReport {
    pub fn outcome(&self) -> &TurnOutcome {
        &self.turn.outcome
    }

    pub fn response(&self) -> &str {
        &self.turn.response
    }
}

pub struct WorkflowEngine {
    vault: Arc<CryptoVault>,
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    backend: BackendClient,
    synthesizer: PlanSynthesizer,
    retry: RetryPolicy,
    seed_k: usize,
}

impl WorkflowEngine {
    pub fn new(
        vault: Arc<CryptoVault>,
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        ai: Arc<dyn AIProvider>,
        retry: RetryPolicy,
    ) -> Self {
        let backend = BackendClient::new(ai, retry.clone());
        Self {
            vault,
            store,
            embedder,
            synthesizer: PlanSynthesizer::new(backend.clone()),
            backend,
            retry,
            seed_k: 0,
        }
    }

    /// Feeds the goals of the `k` most similar other profiles into needs
    /// evaluation.
    pub fn with_seeding(mut self, k: usize) -> Self {
        self.seed_k = k;
        self
    }

    /// Runs one turn to completion.
    ///
    /// # Errors
    ///
    /// - `Session` if the session is not writable
    /// - `Cancelled` if the session was cleared or closed mid-turn
    /// - `StoreUnavailable`/`Conflict` if persistence failed; nothing is recorded
    /// - `Integrity` if a stored profile or plan fails to open
    pub async fn run_turn(
        &self,
        handle: &SessionHandle,
        input: TurnInput,
    ) -> Result<TurnReport, WorkflowError> {
        let mut state = handle.lock().await;
        state.session.ensure_writable().map_err(SessionError::from)?;
        if handle.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        let trace_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "turn",
            session_id = %handle.id().masked(),
            mode = %input.mode(),
            trace_id = %trace_id,
        );
        self.process(handle, &mut state, &input, &trace_id)
            .instrument(span)
            .await
    }

    async fn process(
        &self,
        handle: &SessionHandle,
        state: &mut WorkingState,
        input: &TurnInput,
        trace_id: &str,
    ) -> Result<TurnReport, WorkflowError> {
        let user_key = handle.user_key();
        let mut outputs = StageOutputs::default();

        // 1. Assessment
        let assessment = match input.mode() {
            TurnMode::Request => match self.assess(handle, input.text(), trace_id).await {
                Ok(a) => Some(a),
                Err(err) => {
                    let reason = err.to_string();
                    let outcome = if err.is_malformed() {
                        TurnOutcome::AssessmentFailed { reason }
                    } else {
                        TurnOutcome::Failed {
                            stage: Stage::Assessment,
                            reason,
                        }
                    };
                    return self.record_failure(handle, state, input, outputs, outcome).await;
                }
            },
            TurnMode::WeeklyUpdate => None,
        };
        checkpoint(handle, Stage::Assessment)?;

        // 2. Profile resolution
        let mut profile = match self.load_profile(user_key).await? {
            Some(profile) => profile,
            None => {
                tracing::info!("no stored profile; starting from defaults");
                Profile::new_default(user_key.clone())
            }
        };
        if let Some(a) = &assessment {
            let report = profile.merge(&a.to_profile_delta());
            tracing::debug!(
                changed = report.changed_fields.len(),
                superseded = report.superseded.len(),
                conflicts = report.conflicts.len(),
                "profile merged"
            );
            outputs.profile_conflicts = describe_conflicts(&report);
        }
        outputs.assessment = assessment.clone();
        let prior = self.current_plan(user_key).await?;
        checkpoint(handle, Stage::ProfileResolution)?;

        // 3. Needs evaluation
        let patterns = self.similar_patterns(user_key, &profile).await;
        let focus = match &assessment {
            Some(a) => NeedsFocus::Request {
                input: input.text(),
                assessment: a,
            },
            None => NeedsFocus::WeeklyUpdate {
                update: input.text(),
            },
        };
        let needs = match self
            .backend
            .structured(
                Stage::NeedsEvaluation,
                prompts::needs_evaluation(&profile, focus, prior.as_ref(), &patterns),
                metadata(handle, CompletionPurpose::NeedsEvaluation, trace_id),
                NeedsEvaluation::from_backend,
            )
            .await
        {
            Ok(needs) => needs,
            Err(err) => {
                let outcome = failed(Stage::NeedsEvaluation, &err);
                return self.record_failure(handle, state, input, outputs, outcome).await;
            }
        };
        outputs.needs = Some(needs.clone());
        checkpoint(handle, Stage::NeedsEvaluation)?;

        if input.mode() == TurnMode::WeeklyUpdate {
            match self
                .backend
                .structured(
                    Stage::ProgressReview,
                    prompts::progress_review(&profile, input.text(), prior.as_ref()),
                    metadata(handle, CompletionPurpose::ProgressReview, trace_id),
                    ProgressFeedback::from_backend,
                )
                .await
            {
                Ok(progress) => {
                    let report = profile.merge(&progress.to_profile_delta(profile.goals()));
                    tracing::debug!(
                        changed = report.changed_fields.len(),
                        conflicts = report.conflicts.len(),
                        "weekly progress merged into profile"
                    );
                    outputs.profile_conflicts.extend(describe_conflicts(&report));
                    outputs.progress = Some(progress);
                }
                Err(err) => {
                    let outcome = failed(Stage::ProgressReview, &err);
                    return self.record_failure(handle, state, input, outputs, outcome).await;
                }
            }
            checkpoint(handle, Stage::ProgressReview)?;
        }

        // 4. Plan synthesis
        let scope: Vec<PlanCategory> = match &assessment {
            Some(a) => a.touched_categories(),
            None => needs.adjust_categories.clone(),
        };
        let synthesis = match self
            .synthesizer
            .synthesize(SynthesisInput {
                profile: &profile,
                needs: &needs,
                prior: prior.as_ref(),
                scope: &scope,
                session_id: *handle.id(),
                trace_id,
            })
            .await
        {
            Ok(s) => s,
            Err(err) => {
                let outcome = failed(Stage::PlanSynthesis, &err);
                return self.record_failure(handle, state, input, outputs, outcome).await;
            }
        };
        let (plan, is_new) = match synthesis {
            Synthesis::Updated { plan, clamped } => {
                outputs.changed_categories = plan.changed().to_vec();
                outputs.clamped = clamped;
                (plan, true)
            }
            Synthesis::Unchanged(plan) => (plan, false),
        };
        outputs.plan_version = Some(plan.version());
        checkpoint(handle, Stage::PlanSynthesis)?;

        // 5. Memory update
        let response = response::render(&ResponseParts {
            needs: &needs,
            plan: &plan,
            changed: &outputs.changed_categories,
            clamped: &outputs.clamped,
            profile: &profile,
            progress: outputs.progress.as_ref(),
        });

        self.save_profile(handle, &profile).await?;
        if is_new {
            self.save_plan(handle, &plan).await?;
        }
        let turn = Turn::new(input, outputs, TurnOutcome::Completed, response);
        let sequence = self.append(handle, &turn).await?;

        tracing::info!(
            sequence,
            plan_version = %plan.version(),
            new_plan = is_new,
            "turn completed"
        );
        state.profile = Some(profile);
        state.plan = Some(plan.clone());
        state.last_sequence = Some(sequence);

        Ok(TurnReport {
            sequence,
            turn,
            plan: Some(plan),
        })
    }

    async fn assess(
        &self,
        handle: &SessionHandle,
        text: &str,
        trace_id: &str,
    ) -> Result<Assessment, StageError> {
        self.backend
            .structured(
                Stage::Assessment,
                prompts::assessment(text),
                metadata(handle, CompletionPurpose::Assessment, trace_id),
                Assessment::from_backend,
            )
            .await
    }

    async fn record_failure(
        &self,
        handle: &SessionHandle,
        state: &mut WorkingState,
        input: &TurnInput,
        outputs: StageOutputs,
        outcome: TurnOutcome,
    ) -> Result<TurnReport, WorkflowError> {
        if handle.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        let turn = Turn::new(input, outputs, outcome, APOLOGY);
        let sequence = self.append(handle, &turn).await?;
        tracing::warn!(sequence, outcome = turn.outcome.label(), "turn recorded as failed");
        state.last_sequence = Some(sequence);
        Ok(TurnReport {
            sequence,
            turn,
            plan: state.plan.clone(),
        })
    }

    async fn load_profile(&self, user_key: &UserKey) -> Result<Option<Profile>, WorkflowError> {
        let stored = self
            .store_call(Stage::ProfileResolution, |_| self.store.find_profile(user_key))
            .await?;
        match stored {
            Some(record) => {
                let profile = open_json(&self.vault, &record.sealed, &SealContext::profile(user_key))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Latest stored plan of a user, opened and checked against its row.
    pub async fn current_plan(&self, user_key: &UserKey) -> Result<Option<Plan>, WorkflowError> {
        let stored = self
            .store_call(Stage::ProfileResolution, |_| self.store.latest_plan(user_key))
            .await?;
        match stored {
            Some(record) => {
                let context = SealContext::plan(user_key, record.version.value());
                let plan: Plan = open_json(&self.vault, &record.sealed, &context)?;
                if plan.version() != record.version {
                    return Err(WorkflowError::Integrity(format!(
                        "plan row {} holds plan {}",
                        record.version,
                        plan.version()
                    )));
                }
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }

    /// Goal digests of the nearest other profiles. Seeding is optional, so
    /// failures are logged and yield no patterns.
    async fn similar_patterns(&self, user_key: &UserKey, profile: &Profile) -> Vec<String> {
        if self.seed_k == 0 {
            return Vec::new();
        }
        let embedding = match self.embedder.embed(&profile.summary_text()).await {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "skipping seeding: embedding failed");
                return Vec::new();
            }
        };
        let matches = match self
            .store
            .nearest_profiles(&embedding, self.seed_k, Some(user_key))
            .await
        {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(error = %err, "skipping seeding: nearest-profile lookup failed");
                return Vec::new();
            }
        };

        let mut patterns = Vec::with_capacity(matches.len());
        for m in matches {
            let context = SealContext::profile(&m.record.user_key);
            match open_json::<Profile>(&self.vault, &m.record.sealed, &context) {
                Ok(other) if !other.goals().is_empty() => {
                    let goals: Vec<&str> = other.goals().iter().map(|g| g.as_str()).collect();
                    patterns.push(format!(
                        "goals: {}; readiness: {}",
                        goals.join(", "),
                        other.readiness()
                    ));
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(
                    user_key = %m.record.user_key.masked(),
                    error = %err,
                    "similar profile failed to open"
                ),
            }
        }
        tracing::debug!(patterns = patterns.len(), "seeded needs evaluation");
        patterns
    }

    async fn save_profile(&self, handle: &SessionHandle, profile: &Profile) -> Result<(), WorkflowError> {
        let user_key = profile.user_key();
        let embedding = self.embedder.embed(&profile.summary_text()).await?;
        let record = StoredProfile {
            user_key: user_key.clone(),
            sealed: seal_json(&self.vault, profile, &SealContext::profile(user_key))?,
            embedding,
            session_id: Some(*handle.id()),
            updated_at: Timestamp::now(),
        };
        self.store_call(Stage::MemoryUpdate, |_| self.store.upsert_profile(record.clone()))
            .await
    }

    async fn save_plan(&self, handle: &SessionHandle, plan: &Plan) -> Result<(), WorkflowError> {
        let user_key = plan.user_key();
        let context = SealContext::plan(user_key, plan.version().value());
        let record = StoredPlan {
            user_key: user_key.clone(),
            version: plan.version(),
            session_id: *handle.id(),
            sealed: seal_json(&self.vault, plan, &context)?,
            created_at: *plan.created_at(),
        };
        self.store_call(Stage::MemoryUpdate, |_| self.store.save_plan(record.clone()))
            .await
    }

    async fn append(&self, handle: &SessionHandle, turn: &Turn) -> Result<u64, WorkflowError> {
        let sealed = turn.seal(&self.vault, handle.id(), handle.secret())?;
        self.store_call(Stage::MemoryUpdate, |_| {
            self.store.append_turn(handle.id(), sealed.clone())
        })
        .await
    }

    async fn store_call<T, F, Fut>(&self, stage: Stage, mut op: F) -> Result<T, WorkflowError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.retry
            .run(stage, |attempt| {
                let call = op(attempt);
                async move { call.await.map_err(StageError::from) }
            })
            .await
            .map_err(|err| match err {
                StageError::Timeout(d) => {
                    WorkflowError::StoreUnavailable(format!("{} timed out after {:?}", stage, d))
                }
                other => other.into_workflow(stage),
            })
    }
}

fn metadata(handle: &SessionHandle, purpose: CompletionPurpose, trace_id: &str) -> RequestMetadata {
    RequestMetadata::new(handle.user_key().clone(), *handle.id(), purpose, trace_id)
}

fn failed(stage: Stage, err: &StageError) -> TurnOutcome {
    TurnOutcome::Failed {
        stage,
        reason: err.to_string(),
    }
}

fn describe_conflicts(report: &MergeReport) -> Vec<String> {
    report
        .conflicts
        .iter()
        .map(|c| format!("{}: kept '{}', proposed '{}'", c.field, c.current, c.proposed))
        .collect()
}

/// Stops the turn between stages once `clear`/`close` has been requested.
fn checkpoint(handle: &SessionHandle, completed: Stage) -> Result<(), WorkflowError> {
    if handle.is_cancelled() {
        tracing::info!(after = %completed, "turn cancelled; skipping memory update");
        return Err(WorkflowError::Cancelled);
    }
    Ok(())
}
