//! Profile merge with explicit supersession.
//!
//! New facts extend the profile. A fact that contradicts a stated
//! single-valued constraint is applied only when the delta carries a
//! supersession reason; otherwise it is reported as a conflict and the
//! profile keeps its current value. Goal status and progress follow the
//! latest report, for goals the profile already holds. Applying the same
//! delta twice leaves the profile as it was after the first application.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{CalorieTarget, FitnessLevel, FocusTime, Goal, GoalProgress, GoalStatus, Profile, Readiness};
use crate::domain::foundation::{Percentage, Timestamp};
use crate::domain::plan::PlanCategory;

/// Newly assessed facts to fold into a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDelta {
    pub goals: Vec<Goal>,
    pub dietary: Vec<String>,
    pub equipment: Vec<String>,
    pub time_budget_minutes: Option<u32>,
    pub focus_time: Option<FocusTime>,
    pub fitness_level: Option<FitnessLevel>,
    pub calorie_target: Option<CalorieTarget>,
    pub readiness: Option<Readiness>,
    pub timeframe: Option<String>,
    pub focus_areas: Vec<PlanCategory>,
    pub goal_updates: Vec<GoalUpdate>,
    /// Reason recorded when a stated single-valued constraint is replaced.
    pub supersession_reason: Option<String>,
}

/// Reported status or progress of one goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalUpdate {
    pub goal: Goal,
    pub status: Option<GoalStatus>,
    pub progress: Option<Percentage>,
}

/// Record of a stated value being replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supersession {
    pub field: String,
    pub previous: String,
    pub replacement: String,
    pub reason: String,
    pub at: Timestamp,
}

/// A contradicting fact that was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    pub field: String,
    pub current: String,
    pub proposed: String,
}

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub changed_fields: Vec<String>,
    pub superseded: Vec<String>,
    pub conflicts: Vec<MergeConflict>,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        self.changed_fields.is_empty()
    }
}

impl Profile {
    /// Folds `delta` into this profile.
    pub fn merge(&mut self, delta: &ProfileDelta) -> MergeReport {
        let mut report = MergeReport::default();

        if extend(&mut self.goals, delta.goals.iter().cloned()) {
            report.changed_fields.push("goals".into());
        }
        if extend(
            &mut self.constraints.dietary,
            delta.dietary.iter().map(|d| normalize_tag(d)).filter(|d| !d.is_empty()),
        ) {
            report.changed_fields.push("dietary".into());
        }
        if extend(
            &mut self.constraints.equipment,
            delta.equipment.iter().map(|e| normalize_tag(e)).filter(|e| !e.is_empty()),
        ) {
            report.changed_fields.push("equipment".into());
        }
        let mut progress_changed = false;
        for goal in &self.goals {
            if !self.goal_progress.contains_key(goal) {
                self.goal_progress.insert(goal.clone(), GoalProgress::default());
                progress_changed = true;
            }
        }
        for update in &delta.goal_updates {
            let Some(entry) = self.goal_progress.get_mut(&update.goal) else {
                continue;
            };
            let next = GoalProgress {
                status: update.status.unwrap_or(entry.status),
                progress: update.progress.unwrap_or(entry.progress),
            };
            if next != *entry {
                *entry = next;
                progress_changed = true;
            }
        }
        if progress_changed {
            report.changed_fields.push("goal_progress".into());
        }

        if extend(&mut self.focus_areas, delta.focus_areas.iter().copied()) {
            report.changed_fields.push("focus_areas".into());
        }

        let reason = delta.supersession_reason.as_deref();
        let mut superseded = Vec::new();

        merge_single(
            "time_budget_minutes",
            &mut self.constraints.time_budget_minutes,
            delta.time_budget_minutes,
            |v| v.to_string(),
            reason,
            &mut report,
            &mut superseded,
        );
        merge_single(
            "focus_time",
            &mut self.constraints.focus_time,
            delta.focus_time,
            |v| v.as_str().to_string(),
            reason,
            &mut report,
            &mut superseded,
        );
        merge_single(
            "fitness_level",
            &mut self.constraints.fitness_level,
            delta.fitness_level,
            |v| v.as_str().to_string(),
            reason,
            &mut report,
            &mut superseded,
        );
        merge_single(
            "calorie_target",
            &mut self.constraints.calorie_target,
            delta.calorie_target,
            |v| v.value().to_string(),
            reason,
            &mut report,
            &mut superseded,
        );

        // Derived values: latest assessment wins.
        if let Some(readiness) = delta.readiness {
            if readiness != self.readiness {
                self.readiness = readiness;
                report.changed_fields.push("readiness".into());
            }
        }
        if let Some(timeframe) = delta.timeframe.as_ref().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if self.timeframe.as_deref() != Some(timeframe) {
                self.timeframe = Some(timeframe.to_string());
                report.changed_fields.push("timeframe".into());
            }
        }

        if !report.is_noop() {
            self.supersessions.extend(superseded);
            self.updated_at = Timestamp::now();
        }
        report
    }
}

fn extend<T: Ord>(set: &mut BTreeSet<T>, items: impl IntoIterator<Item = T>) -> bool {
    let mut changed = false;
    for item in items {
        changed |= set.insert(item);
    }
    changed
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

fn merge_single<T: Copy + PartialEq>(
    field: &str,
    current: &mut Option<T>,
    proposed: Option<T>,
    render: impl Fn(&T) -> String,
    reason: Option<&str>,
    report: &mut MergeReport,
    superseded: &mut Vec<Supersession>,
) {
    let Some(proposed) = proposed else {
        return;
    };
    let existing = match *current {
        None => {
            *current = Some(proposed);
            report.changed_fields.push(field.to_string());
            return;
        }
        Some(existing) => existing,
    };
    if existing == proposed {
        return;
    }
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => {
            superseded.push(Supersession {
                field: field.to_string(),
                previous: render(&existing),
                replacement: render(&proposed),
                reason: reason.to_string(),
                at: Timestamp::now(),
            });
            *current = Some(proposed);
            report.changed_fields.push(field.to_string());
            report.superseded.push(field.to_string());
        }
        None => report.conflicts.push(MergeConflict {
            field: field.to_string(),
            current: render(&existing),
            proposed: render(&proposed),
        }),
    }
}
