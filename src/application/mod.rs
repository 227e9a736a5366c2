//! Application layer - orchestration over the domain and ports.
//!
//! - `SessionManager` - session identity, lifecycle and working state
//! - `workflow` - the per-turn stage pipeline
//! - `PlanSynthesizer` - per-category plan regeneration
//! - `Inspector` - developer inspection of stored sessions
//! - `CoachService` - facade used by the CLI

mod coach_service;
mod inspector;
mod plan_synthesizer;
mod sealing;
mod session_manager;
pub mod workflow;

pub use coach_service::CoachService;
pub use inspector::{
    InspectError, InspectQuery, InspectedSession, InspectedTurn, Inspector, SessionSummary,
};
pub use plan_synthesizer::{apply_drafts, PlanSynthesizer, Synthesis, SynthesisInput};
pub use session_manager::{
    PurgeReport, ResolvedSession, SessionHandle, SessionManager, WorkingState,
};
pub use workflow::{RetryPolicy, TurnReport, WorkflowEngine, WorkflowError, APOLOGY};
