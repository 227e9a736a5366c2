//! End-to-end turn scenarios against the in-memory stores and a scripted
//! reasoning backend.

use secrecy::Secret;
use std::sync::Arc;
use std::time::Duration;

use growth_coach::adapters::ai::{MockAIProvider, MockError};
use growth_coach::adapters::embedding::HashingEmbedder;
use growth_coach::adapters::memory::{InMemoryMemoryStore, InMemorySessionRepository};
use growth_coach::application::{
    CoachService, InspectQuery, Inspector, RetryPolicy, SessionManager, WorkflowEngine, APOLOGY,
};
use growth_coach::domain::foundation::{ErrorCode, UserId};
use growth_coach::domain::plan::PlanCategory;
use growth_coach::domain::profile::Profile;
use growth_coach::domain::turn::{Stage, Turn, TurnMode, TurnOutcome};
use growth_coach::domain::vault::{CryptoVault, SealContext};
use growth_coach::ports::{CompletionPurpose, MemoryStore};

const SECRET: &str = "scenario-vault-secret-0001";

const ALEX_REQUEST: &str =
    "I have a CS exam in 6 weeks and want to lose 4kg. I'm vegetarian and have 1 hour a day.";

const ALEX_ASSESSMENT: &str = r#"{
    "primary_goal": "Pass the CS exam and lose 4kg",
    "goals": ["exam-prep", "weight loss"],
    "domains": ["study", "nutrition", "fitness"],
    "target_metric": "lose 4 kg",
    "timeframe": "6 weeks",
    "constraints": {"dietary": ["vegetarian"], "time_budget_minutes": 60},
    "motivation_score": 8
}"#;

const REQUEST_NEEDS: &str = r#"{
    "summary": "Two demanding goals on one hour a day.",
    "risks": ["burnout before the exam"],
    "opportunities": ["pair short workouts with study breaks"],
    "category_notes": {"nutrition": "vegetarian protein sources"}
}"#;

const WEEKLY_NEEDS: &str = r#"{
    "summary": "Study is on track; Friday workouts keep slipping.",
    "adjust_categories": ["fitness"],
    "category_notes": {"fitness": "move the Friday session"}
}"#;

const PROGRESS: &str = r#"{"progress_percent": 60, "encouragement": "Great study streak",
    "adjustment": "Schedule Friday workouts in the morning"}"#;

const NUTRITION: &str = r#"{"summary": "Vegetarian moderate deficit",
    "actions": ["Lentils or tofu at every lunch"],
    "targets": [{"kind": "daily_caloric_deficit", "value": 400}]}"#;
const FITNESS: &str = r#"{"summary": "Short full-body sessions",
    "actions": ["25 minute circuit"],
    "targets": [{"kind": "workout_sessions_per_week", "value": 4}]}"#;
const FITNESS_WEEKLY: &str = r#"{"summary": "Friday moved to Saturday morning",
    "actions": ["Saturday 9am circuit instead of Friday"],
    "targets": [{"kind": "workout_sessions_per_week", "value": 4}]}"#;
const STUDY: &str = r#"{"summary": "Spaced revision",
    "actions": ["Two 25 minute pomodoros"],
    "targets": [{"kind": "study_hours_per_day", "value": 1}]}"#;

struct Harness {
    coach: CoachService,
    ai: MockAIProvider,
    store: InMemoryMemoryStore,
    sessions: InMemorySessionRepository,
    vault: Arc<CryptoVault>,
}

fn harness(ai: MockAIProvider) -> Harness {
    let vault = Arc::new(CryptoVault::from_secret(&Secret::new(SECRET.to_string())).unwrap());
    let store = InMemoryMemoryStore::new();
    let sessions = InMemorySessionRepository::new();
    let manager = Arc::new(SessionManager::new(
        vault.clone(),
        Arc::new(sessions.clone()),
        Arc::new(store.clone()),
    ));
    let engine = Arc::new(WorkflowEngine::new(
        vault.clone(),
        Arc::new(store.clone()),
        Arc::new(HashingEmbedder::new(128)),
        Arc::new(ai.clone()),
        RetryPolicy::new(
            3,
            Duration::from_millis(1),
            Duration::from_millis(4),
            Duration::from_secs(5),
        ),
    ));
    Harness {
        coach: CoachService::new(manager, engine),
        ai,
        store,
        sessions,
        vault,
    }
}

fn alex_backend() -> MockAIProvider {
    MockAIProvider::new()
        .with_response(CompletionPurpose::Assessment, ALEX_ASSESSMENT)
        .with_response(CompletionPurpose::NeedsEvaluation, REQUEST_NEEDS)
        .with_response(CompletionPurpose::NeedsEvaluation, WEEKLY_NEEDS)
        .with_response(CompletionPurpose::ProgressReview, PROGRESS)
        .with_response(CompletionPurpose::CategoryPlan(PlanCategory::Nutrition), NUTRITION)
        .with_response(CompletionPurpose::CategoryPlan(PlanCategory::Fitness), FITNESS)
        .with_response(CompletionPurpose::CategoryPlan(PlanCategory::Fitness), FITNESS_WEEKLY)
        .with_response(CompletionPurpose::CategoryPlan(PlanCategory::Study), STUDY)
}

fn alex() -> UserId {
    UserId::new("alex_2025").unwrap()
}

async fn stored_profile(h: &Harness, user: &UserId) -> Profile {
    let key = h.vault.user_key(user).unwrap();
    let record = h.store.find_profile(&key).await.unwrap().unwrap();
    let bytes = h.vault.open(&record.sealed, &SealContext::profile(&key)).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ════════════════════════════════════════════════════════════════════════════
// Request and weekly update
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn fresh_user_request_builds_profile_and_first_plan() {
    let h = harness(alex_backend());
    let handle = h.coach.open(&alex()).await.unwrap().handle;

    let report = h.coach.request(&handle, ALEX_REQUEST).await.unwrap();
    assert_eq!(report.sequence, 1);
    assert_eq!(report.outcome(), &TurnOutcome::Completed);

    let profile = stored_profile(&h, &alex()).await;
    let goals: Vec<&str> = profile.goals().iter().map(|g| g.as_str()).collect();
    assert!(goals.contains(&"exam-prep"));
    assert!(goals.contains(&"weight-loss"));
    assert!(profile.constraints().dietary.contains("vegetarian"));
    assert_eq!(profile.constraints().time_budget_minutes, Some(60));
    assert_eq!(profile.timeframe(), Some("6 weeks"));

    let plan = report.plan.clone().unwrap();
    assert_eq!(plan.version().value(), 1);
    assert_eq!(plan.predecessor(), None);
    assert_eq!(
        plan.changed(),
        &[PlanCategory::Nutrition, PlanCategory::Fitness, PlanCategory::Study]
    );
    assert_eq!(plan.category(PlanCategory::Study).summary, "Spaced revision");
    assert_eq!(plan.category(PlanCategory::Nutrition).summary, "Vegetarian moderate deficit");
    assert_eq!(h.ai.calls_for(CompletionPurpose::CategoryPlan(PlanCategory::Wellness)), 0);

    assert!(report.response().contains("## Understanding Your Situation"));
    assert!(report.response().contains("## Goal Summary"));
}

#[tokio::test]
async fn weekly_update_adjusts_only_fitness() {
    let h = harness(alex_backend());
    let handle = h.coach.open(&alex()).await.unwrap().handle;
    let first = h.coach.request(&handle, ALEX_REQUEST).await.unwrap();
    let v1 = first.plan.unwrap();

    let weekly_text = "I'm doing well with study but skipping workouts on Fridays";
    let report = h.coach.weekly_update(&handle, weekly_text).await.unwrap();

    assert_eq!(report.sequence, 2);
    assert_eq!(report.turn.mode, TurnMode::WeeklyUpdate);
    assert_eq!(h.ai.calls_for(CompletionPurpose::Assessment), 1);

    let needs_call = h
        .ai
        .get_calls()
        .into_iter()
        .filter(|c| c.purpose() == CompletionPurpose::NeedsEvaluation)
        .last()
        .unwrap();
    assert!(needs_call.messages.iter().any(|m| m.content.contains(weekly_text)));

    let v2 = report.plan.clone().unwrap();
    assert_eq!(v2.version().value(), 2);
    assert_eq!(v2.predecessor(), Some(v1.version()));
    assert_eq!(v2.changed(), &[PlanCategory::Fitness]);
    assert_ne!(v2.category(PlanCategory::Fitness), v1.category(PlanCategory::Fitness));
    for c in [PlanCategory::Nutrition, PlanCategory::Study, PlanCategory::Wellness] {
        assert_eq!(v2.category(c), v1.category(c));
    }

    let progress = report.turn.outputs.progress.as_ref().unwrap();
    assert_eq!(progress.progress.value(), 60);
    assert!(report.response().contains("## Weekly Progress"));
}

#[tokio::test]
async fn history_survives_a_new_process() {
    let h = harness(alex_backend());
    let handle = h.coach.open(&alex()).await.unwrap().handle;
    h.coach.request(&handle, ALEX_REQUEST).await.unwrap();

    // A second manager over the same stores stands in for a restart.
    let manager = SessionManager::new(
        h.vault.clone(),
        Arc::new(h.sessions.clone()),
        Arc::new(h.store.clone()),
    );
    let resumed = manager.resolve(&alex()).await.unwrap();
    assert!(!resumed.created);
    assert!(!resumed.interrupted_turn);
    assert_eq!(resumed.handle.id(), handle.id());

    let turns = manager.history(&resumed.handle).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].turn.input, ALEX_REQUEST);
}

// ════════════════════════════════════════════════════════════════════════════
// Failures
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn exhausted_backend_records_failed_turn_with_apology() {
    let ai = MockAIProvider::new()
        .with_response(CompletionPurpose::Assessment, ALEX_ASSESSMENT)
        .with_fallback_error(
            CompletionPurpose::NeedsEvaluation,
            MockError::Unavailable {
                message: "overloaded".to_string(),
            },
        );
    let h = harness(ai);
    let handle = h.coach.open(&alex()).await.unwrap().handle;

    let report = h.coach.request(&handle, ALEX_REQUEST).await.unwrap();
    assert!(matches!(
        report.outcome(),
        TurnOutcome::Failed {
            stage: Stage::NeedsEvaluation,
            ..
        }
    ));
    assert_eq!(report.response(), APOLOGY);
    assert!(report.plan.is_none());
    assert_eq!(h.ai.calls_for(CompletionPurpose::NeedsEvaluation), 3);

    let key = h.vault.user_key(&alex()).unwrap();
    assert_eq!(h.store.plan_count(&key).await, 0);
    assert!(h.store.find_profile(&key).await.unwrap().is_none());

    let turns = h.coach.history(&handle).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert!(turns[0].turn.outputs.assessment.is_some());
}

#[tokio::test]
async fn wrong_secret_yields_integrity_errors_not_plaintext() {
    let h = harness(alex_backend());
    let handle = h.coach.open(&alex()).await.unwrap().handle;
    h.coach.request(&handle, ALEX_REQUEST).await.unwrap();

    let wrong =
        Arc::new(CryptoVault::from_secret(&Secret::new("not-the-right-secret-99".into())).unwrap());

    let stored = h.store.list_turns(handle.id(), None).await.unwrap();
    let err = Turn::open(&stored[0].sealed, &wrong, handle.id(), handle.secret()).unwrap_err();
    assert!(err.is_integrity());

    let manager = SessionManager::new(
        wrong.clone(),
        Arc::new(h.sessions.clone()),
        Arc::new(h.store.clone()),
    );
    let err = manager.close(handle.id()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::IntegrityViolation);

    let inspected = Inspector::new(wrong, Arc::new(h.sessions.clone()), Arc::new(h.store.clone()))
        .inspect(&InspectQuery::Recent, true, 10)
        .await
        .unwrap();
    assert_eq!(inspected.len(), 1);
    assert!(inspected[0].turns.iter().all(|t| t.content.is_err()));
}

#[tokio::test]
async fn purge_removes_all_user_data() {
    let h = harness(alex_backend());
    let handle = h.coach.open(&alex()).await.unwrap().handle;
    h.coach.request(&handle, ALEX_REQUEST).await.unwrap();

    let report = h.coach.purge(&alex()).await.unwrap();
    assert_eq!(report.sessions_deleted, 1);

    let key = h.vault.user_key(&alex()).unwrap();
    assert!(h.store.find_profile(&key).await.unwrap().is_none());
    assert_eq!(h.store.plan_count(&key).await, 0);
    assert_eq!(h.store.turn_count(handle.id()).await, 0);
    assert!(h.sessions.is_empty().await);
}
