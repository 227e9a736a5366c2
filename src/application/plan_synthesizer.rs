//! Plan Synthesizer - per-category regeneration with copy-on-skip.
//!
//! Categories in scope for a turn get one backend call each, in
//! [`PlanCategory::ALL`] order. Every other category is carried over from
//! the prior plan unchanged (or from the baseline when there is no prior
//! plan). Numeric targets are clamped into their safe ranges before they
//! reach the plan; each clamp is reported.

use crate::application::workflow::backend::BackendClient;
use crate::application::workflow::StageError;
use crate::application::workflow::prompts;
use crate::domain::assessment::{CategoryDraft, NeedsEvaluation};
use crate::domain::foundation::SessionId;
use crate::domain::plan::{CategoryPlan, NumericTarget, Plan, PlanCategories, PlanCategory};
use crate::domain::profile::Profile;
use crate::domain::turn::{ClampNote, Stage};
use crate::ports::{CompletionPurpose, RequestMetadata};

/// Inputs for one synthesis run.
pub struct SynthesisInput<'a> {
    pub profile: &'a Profile,
    pub needs: &'a NeedsEvaluation,
    pub prior: Option<&'a Plan>,
    /// Categories to regenerate.
    pub scope: &'a [PlanCategory],
    pub session_id: SessionId,
    pub trace_id: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    /// Nothing was in scope; the prior plan stands.
    Unchanged(Plan),
    Updated { plan: Plan, clamped: Vec<ClampNote> },
}

#[derive(Clone)]
pub struct PlanSynthesizer {
    backend: BackendClient,
}

impl PlanSynthesizer {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    pub async fn synthesize(&self, input: SynthesisInput<'_>) -> Result<Synthesis, StageError> {
        let scope: Vec<PlanCategory> = PlanCategory::ALL
            .into_iter()
            .filter(|c| input.scope.contains(c))
            .collect();

        if let (true, Some(prior)) = (scope.is_empty(), input.prior) {
            tracing::debug!(plan_version = %prior.version(), "no categories in scope; plan unchanged");
            return Ok(Synthesis::Unchanged(prior.clone()));
        }

        let user_key = input.profile.user_key();
        let mut drafts = Vec::with_capacity(scope.len());
        for category in &scope {
            let prompt = prompts::category_plan(
                *category,
                input.profile,
                &input.needs.summary,
                input.needs.note_for(*category),
                input.prior.map(|p| p.category(*category)),
            );
            let metadata = RequestMetadata::new(
                user_key.clone(),
                input.session_id,
                CompletionPurpose::CategoryPlan(*category),
                input.trace_id,
            );
            let draft = self
                .backend
                .structured(Stage::PlanSynthesis, prompt, metadata, CategoryDraft::from_backend)
                .await?;
            drafts.push((*category, draft));
        }

        let base = input
            .prior
            .map(|p| p.categories().clone())
            .unwrap_or_else(PlanCategories::baseline);
        let (categories, clamped) = apply_drafts(&base, &drafts);

        let plan = match input.prior {
            Some(prior) => Plan::successor(prior, categories, scope),
            None => Plan::first(user_key.clone(), categories, scope),
        };
        tracing::info!(
            plan_version = %plan.version(),
            changed = plan.changed().len(),
            clamped = clamped.len(),
            "plan synthesized"
        );
        Ok(Synthesis::Updated { plan, clamped })
    }
}

/// Overlays drafts on `base`, clamping targets. Categories without a draft
/// are copied from `base` as they are.
pub fn apply_drafts(
    base: &PlanCategories,
    drafts: &[(PlanCategory, CategoryDraft)],
) -> (PlanCategories, Vec<ClampNote>) {
    let mut categories = base.clone();
    let mut clamped = Vec::new();

    for (category, draft) in drafts {
        let mut targets: Vec<NumericTarget> = Vec::new();
        for suggestion in &draft.targets {
            if suggestion.kind.category() != *category {
                tracing::debug!(
                    category = %category,
                    kind = %suggestion.kind,
                    "dropping target from another category"
                );
                continue;
            }
            if targets.iter().any(|t| t.kind() == suggestion.kind) {
                continue;
            }
            let result = NumericTarget::clamped(suggestion.kind, suggestion.value);
            if let Some(suggested) = result.adjusted_from {
                clamped.push(ClampNote {
                    category: *category,
                    kind: suggestion.kind,
                    suggested,
                    applied: result.target.value(),
                });
            }
            targets.push(result.target);
        }

        categories.set(
            *category,
            CategoryPlan {
                summary: draft.summary.clone(),
                actions: draft.actions.clone(),
                targets,
            },
        );
    }

    (categories, clamped)
}
