//! Profile aggregate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{FitnessLevel, FocusTime, Goal, GoalStatus, Readiness, Supersession};
use crate::domain::foundation::{Percentage, Timestamp, UserKey, ValidationError};
use crate::domain::plan::PlanCategory;

/// Safe range for the daily calorie target.
pub const CALORIE_TARGET_RANGE: (u32, u32) = (1200, 4000);

/// Daily calorie target when the user has stated none.
pub const DEFAULT_CALORIE_TARGET: u32 = 2000;

/// Validated daily calorie target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalorieTarget(u32);

impl CalorieTarget {
    pub fn new(kcal: u32) -> Result<Self, ValidationError> {
        let (min, max) = CALORIE_TARGET_RANGE;
        if !(min..=max).contains(&kcal) {
            return Err(ValidationError::out_of_range(
                "calorie_target",
                i64::from(min),
                i64::from(max),
                i64::from(kcal),
            ));
        }
        Ok(Self(kcal))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Default for CalorieTarget {
    fn default() -> Self {
        Self(DEFAULT_CALORIE_TARGET)
    }
}

/// Stated constraints.
///
/// Multi-valued constraints are sets and only ever grow. Single-valued
/// constraints are `None` until stated; replacing a stated value needs a
/// supersession.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub dietary: BTreeSet<String>,
    pub equipment: BTreeSet<String>,
    pub time_budget_minutes: Option<u32>,
    pub focus_time: Option<FocusTime>,
    pub fitness_level: Option<FitnessLevel>,
    pub calorie_target: Option<CalorieTarget>,
}

/// Status and progress of one goal, as last reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub status: GoalStatus,
    pub progress: Percentage,
}

/// The durable, merged record of a user's goals, constraints and readiness.
///
/// # Invariants
///
/// - exactly one live profile per user key
/// - changes arrive through [`Profile::merge`], never by overwrite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub(super) user_key: UserKey,
    pub(super) goals: BTreeSet<Goal>,
    /// One entry per goal.
    #[serde(default)]
    pub(super) goal_progress: BTreeMap<Goal, GoalProgress>,
    pub(super) constraints: Constraints,
    pub(super) readiness: Readiness,
    pub(super) timeframe: Option<String>,
    pub(super) focus_areas: BTreeSet<PlanCategory>,
    pub(super) supersessions: Vec<Supersession>,
    pub(super) created_at: Timestamp,
    pub(super) updated_at: Timestamp,
}

impl Profile {
    /// Default profile for a first-time user: no goals, no constraints,
    /// neutral readiness.
    pub fn new_default(user_key: UserKey) -> Self {
        let now = Timestamp::now();
        Self {
            user_key,
            goals: BTreeSet::new(),
            goal_progress: BTreeMap::new(),
            constraints: Constraints::default(),
            readiness: Readiness::NEUTRAL,
            timeframe: None,
            focus_areas: BTreeSet::new(),
            supersessions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    pub fn goals(&self) -> &BTreeSet<Goal> {
        &self.goals
    }

    pub fn goal_progress(&self, goal: &Goal) -> Option<&GoalProgress> {
        self.goal_progress.get(goal)
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn timeframe(&self) -> Option<&str> {
        self.timeframe.as_deref()
    }

    pub fn focus_areas(&self) -> &BTreeSet<PlanCategory> {
        &self.focus_areas
    }

    pub fn supersessions(&self) -> &[Supersession] {
        &self.supersessions
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    pub fn fitness_level(&self) -> FitnessLevel {
        self.constraints.fitness_level.unwrap_or_default()
    }

    pub fn focus_time(&self) -> FocusTime {
        self.constraints.focus_time.unwrap_or_default()
    }

    pub fn calorie_target(&self) -> CalorieTarget {
        self.constraints.calorie_target.unwrap_or_default()
    }

    /// Plain-text digest used for embedding and prompt context.
    pub fn summary_text(&self) -> String {
        let join = |set: &BTreeSet<String>| {
            if set.is_empty() {
                "none".to_string()
            } else {
                set.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        };
        let goals = if self.goals.is_empty() {
            "none".to_string()
        } else {
            self.goals
                .iter()
                .map(Goal::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let goals = if self.goal_progress.is_empty() {
            goals
        } else {
            self.goals
                .iter()
                .map(|g| match self.goal_progress.get(g) {
                    Some(p) => format!("{} ({}, {})", g, p.status, p.progress),
                    None => g.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        let time_budget = self
            .constraints
            .time_budget_minutes
            .map(|m| format!("{} min/day", m))
            .unwrap_or_else(|| "unspecified".to_string());

        format!(
            "goals: {}; dietary: {}; equipment: {}; time budget: {}; fitness level: {}; \
             focus time: {}; calorie target: {} kcal; readiness: {}",
            goals,
            join(&self.constraints.dietary),
            join(&self.constraints.equipment),
            time_budget,
            self.fitness_level().as_str(),
            self.focus_time().as_str(),
            self.calorie_target().value(),
            self.readiness,
        )
    }
}
