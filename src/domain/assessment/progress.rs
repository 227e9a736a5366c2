//! Weekly progress feedback.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::extract::{required, ExtractionError, ResponseSanitizer};
use crate::domain::foundation::Percentage;
use crate::domain::profile::{FocusTime, Goal, GoalStatus, GoalUpdate, ProfileDelta};

/// Short progress review produced for weekly-update turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressFeedback {
    pub progress: Percentage,
    pub encouragement: String,
    pub adjustment: String,
    #[serde(default)]
    pub updates: FeedbackUpdates,
}

/// Profile changes reported alongside the weekly review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackUpdates {
    pub goals: Vec<GoalUpdate>,
    pub time_budget_minutes: Option<u32>,
    pub focus_time: Option<FocusTime>,
    pub change_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProgress {
    progress_percent: Option<f64>,
    encouragement: Option<String>,
    adjustment: Option<String>,
    #[serde(default)]
    goal_status: Vec<RawGoalStatus>,
    time_budget_minutes: Option<f64>,
    focus_time: Option<String>,
    change_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGoalStatus {
    goal: String,
    status: Option<String>,
    progress_percent: Option<f64>,
}

impl ProgressFeedback {
    pub fn from_backend(
        sanitizer: &ResponseSanitizer,
        response: &str,
    ) -> Result<Self, ExtractionError> {
        let raw: RawProgress = sanitizer.parse_object(response)?;
        let progress = raw
            .progress_percent
            .ok_or_else(|| ExtractionError::MissingField("progress_percent".to_string()))?;
        let goals = raw
            .goal_status
            .iter()
            .filter_map(|g| {
                let goal = Goal::new(&g.goal).ok()?;
                Some(GoalUpdate {
                    goal,
                    status: g.status.as_deref().and_then(|s| s.parse().ok()),
                    progress: g.progress_percent.map(Percentage::from_f64_clamped),
                })
            })
            .collect();
        Ok(Self {
            progress: Percentage::from_f64_clamped(progress),
            encouragement: required("encouragement", raw.encouragement.as_deref().unwrap_or(""))?,
            adjustment: required("adjustment", raw.adjustment.as_deref().unwrap_or(""))?,
            updates: FeedbackUpdates {
                goals,
                time_budget_minutes: raw
                    .time_budget_minutes
                    .filter(|m| m.is_finite() && *m > 0.0)
                    .map(|m| m.round().min(24.0 * 60.0) as u32),
                focus_time: raw.focus_time.and_then(|s| s.parse().ok()),
                change_reason: raw
                    .change_reason
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty()),
            },
        })
    }

    /// Profile changes implied by this review.
    ///
    /// Goals the review does not mention take the overall progress.
    pub fn to_profile_delta(&self, goals: &BTreeSet<Goal>) -> ProfileDelta {
        let mut goal_updates = self.updates.goals.clone();
        for goal in goals {
            if !goal_updates.iter().any(|u| &u.goal == goal) {
                goal_updates.push(GoalUpdate {
                    goal: goal.clone(),
                    status: Some(GoalStatus::InProgress),
                    progress: Some(self.progress),
                });
            }
        }
        ProfileDelta {
            goal_updates,
            time_budget_minutes: self.updates.time_budget_minutes,
            focus_time: self.updates.focus_time,
            supersession_reason: self.updates.change_reason.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_clamps_progress() {
        let feedback = ProgressFeedback::from_backend(
            &ResponseSanitizer::new(),
            r#"{"progress_percent": 130, "encouragement": "Great study streak!",
                "adjustment": "Schedule Friday workouts earlier"}"#,
        )
        .unwrap();
        assert_eq!(feedback.progress, Percentage::HUNDRED);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let err = ProgressFeedback::from_backend(
            &ResponseSanitizer::new(),
            r#"{"progress_percent": 50, "encouragement": "ok"}"#,
        )
        .unwrap_err();
        assert_eq!(err, ExtractionError::MissingField("adjustment".into()));
    }

    #[test]
    fn reported_changes_become_a_profile_delta() {
        let feedback = ProgressFeedback::from_backend(
            &ResponseSanitizer::new(),
            r#"{"progress_percent": 60, "encouragement": "Solid week",
                "adjustment": "Move workouts to mornings",
                "goal_status": [{"goal": "weight-loss", "status": "behind", "progress_percent": 20}],
                "focus_time": "morning", "change_reason": "new work shift"}"#,
        )
        .unwrap();

        let goals: BTreeSet<Goal> = [Goal::new("exam-prep").unwrap(), Goal::new("weight-loss").unwrap()]
            .into_iter()
            .collect();
        let delta = feedback.to_profile_delta(&goals);

        assert_eq!(delta.focus_time, Some(FocusTime::Morning));
        assert_eq!(delta.supersession_reason.as_deref(), Some("new work shift"));
        let weight = delta
            .goal_updates
            .iter()
            .find(|u| u.goal.as_str() == "weight-loss")
            .unwrap();
        assert_eq!(weight.status, Some(GoalStatus::NeedsAdjustment));
        assert_eq!(weight.progress, Some(Percentage::new(20)));
        let exam = delta.goal_updates.iter().find(|u| u.goal.as_str() == "exam-prep").unwrap();
        assert_eq!(exam.status, Some(GoalStatus::InProgress));
        assert_eq!(exam.progress, Some(Percentage::new(60)));
    }
}
