//! Assessment of a user's request.

use serde::{Deserialize, Serialize};

use super::extract::{clean_list, required, ExtractionError, ResponseSanitizer};
use crate::domain::plan::PlanCategory;
use crate::domain::profile::{
    CalorieTarget, FitnessLevel, FocusTime, Goal, ProfileDelta, Readiness, CALORIE_TARGET_RANGE,
};

/// Constraints stated in a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessedConstraints {
    pub dietary: Vec<String>,
    pub equipment: Vec<String>,
    pub time_budget_minutes: Option<u32>,
    pub focus_time: Option<FocusTime>,
    pub fitness_level: Option<FitnessLevel>,
    pub calorie_target: Option<u32>,
}

/// Structured facts extracted from a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub primary_goal: String,
    pub goals: Vec<Goal>,
    pub domains: Vec<PlanCategory>,
    pub target_metric: Option<String>,
    pub timeframe: Option<String>,
    pub constraints: AssessedConstraints,
    pub motivation_score: Option<u8>,
    pub change_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAssessment {
    primary_goal: Option<String>,
    #[serde(default)]
    goals: Vec<String>,
    #[serde(default)]
    domains: Vec<String>,
    target_metric: Option<String>,
    timeframe: Option<String>,
    #[serde(default)]
    constraints: RawConstraints,
    motivation_score: Option<f64>,
    change_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConstraints {
    #[serde(default)]
    dietary: Vec<String>,
    #[serde(default)]
    equipment: Vec<String>,
    time_budget_minutes: Option<f64>,
    focus_time: Option<String>,
    fitness_level: Option<String>,
    calorie_target: Option<f64>,
}

impl Assessment {
    /// Parses backend output against the assessment contract.
    ///
    /// # Errors
    ///
    /// Anything that is not a JSON object with a non-empty `primary_goal`
    /// and at least one recognizable goal or domain.
    pub fn from_backend(
        sanitizer: &ResponseSanitizer,
        response: &str,
    ) -> Result<Self, ExtractionError> {
        let raw: RawAssessment = sanitizer.parse_object(response)?;

        let primary_goal = required("primary_goal", raw.primary_goal.as_deref().unwrap_or(""))?;

        let mut goals: Vec<Goal> = Vec::new();
        for label in &raw.goals {
            if let Ok(goal) = Goal::new(label) {
                if !goals.contains(&goal) {
                    goals.push(goal);
                }
            }
        }

        let mut domains: Vec<PlanCategory> = Vec::new();
        for label in &raw.domains {
            if let Some(c) = PlanCategory::from_domain_label(label) {
                if !domains.contains(&c) {
                    domains.push(c);
                }
            }
        }
        domains.sort();

        if goals.is_empty() && domains.is_empty() {
            return Err(ExtractionError::Shape(
                "assessment names no recognizable goal or domain".to_string(),
            ));
        }

        let c = raw.constraints;
        let constraints = AssessedConstraints {
            dietary: clean_list(&c.dietary),
            equipment: clean_list(&c.equipment),
            time_budget_minutes: c
                .time_budget_minutes
                .filter(|m| m.is_finite() && *m > 0.0)
                .map(|m| m.round().min(24.0 * 60.0) as u32),
            focus_time: c.focus_time.and_then(|s| s.parse().ok()),
            fitness_level: c.fitness_level.and_then(|s| s.parse().ok()),
            calorie_target: c.calorie_target.filter(|k| k.is_finite()).map(|k| {
                let (min, max) = CALORIE_TARGET_RANGE;
                k.round().clamp(f64::from(min), f64::from(max)) as u32
            }),
        };

        Ok(Self {
            primary_goal,
            goals,
            domains,
            target_metric: non_blank(raw.target_metric),
            timeframe: non_blank(raw.timeframe),
            constraints,
            motivation_score: raw
                .motivation_score
                .filter(|s| s.is_finite())
                .map(|s| Readiness::from_motivation(s.round() as i64).value()),
            change_reason: non_blank(raw.change_reason),
        })
    }

    /// Categories this request touches: stated domains plus those implied
    /// by its goals.
    pub fn touched_categories(&self) -> Vec<PlanCategory> {
        let mut out = self.domains.clone();
        for goal in &self.goals {
            for c in goal.categories() {
                if !out.contains(&c) {
                    out.push(c);
                }
            }
        }
        out.sort();
        out
    }

    /// Facts to merge into the profile.
    pub fn to_profile_delta(&self) -> ProfileDelta {
        ProfileDelta {
            goals: self.goals.clone(),
            dietary: self.constraints.dietary.clone(),
            equipment: self.constraints.equipment.clone(),
            time_budget_minutes: self.constraints.time_budget_minutes,
            focus_time: self.constraints.focus_time,
            fitness_level: self.constraints.fitness_level,
            calorie_target: self
                .constraints
                .calorie_target
                .and_then(|k| CalorieTarget::new(k).ok()),
            readiness: self
                .motivation_score
                .map(|s| Readiness::from_motivation(i64::from(s))),
            timeframe: self.timeframe.clone(),
            focus_areas: self.touched_categories(),
            goal_updates: Vec::new(),
            supersession_reason: self.change_reason.clone(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
