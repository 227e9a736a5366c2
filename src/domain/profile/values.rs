//! Profile value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;
use crate::domain::plan::PlanCategory;

/// Maximum length of a goal slug.
pub const MAX_GOAL_LEN: usize = 64;

/// A normalized goal label such as `weight-loss` or `exam-prep`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Goal(String);

impl Goal {
    /// Normalizes a free-form label into a lower-case, dash-separated slug.
    pub fn new(label: &str) -> Result<Self, ValidationError> {
        let mut slug = String::with_capacity(label.len());
        for ch in label.trim().chars() {
            if ch.is_alphanumeric() {
                slug.extend(ch.to_lowercase());
            } else if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-').to_string();
        if slug.is_empty() {
            return Err(ValidationError::empty_field("goal"));
        }
        if slug.chars().count() > MAX_GOAL_LEN {
            return Err(ValidationError::invalid_format(
                "goal",
                format!("longer than {} characters", MAX_GOAL_LEN),
            ));
        }
        Ok(Self(slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Plan categories a goal of this kind touches.
    pub fn categories(&self) -> Vec<PlanCategory> {
        const RULES: &[(&[&str], &[PlanCategory])] = &[
            (
                &["weight", "lose", "loss", "fat", "muscle", "bulk", "tone"],
                &[PlanCategory::Nutrition, PlanCategory::Fitness],
            ),
            (
                &["diet", "nutrition", "eat", "meal", "vegan", "vegetarian", "calorie"],
                &[PlanCategory::Nutrition],
            ),
            (
                &["fitness", "run", "strength", "workout", "exercise", "marathon", "cardio"],
                &[PlanCategory::Fitness],
            ),
            (
                &["exam", "study", "learn", "course", "career", "test", "degree", "skill"],
                &[PlanCategory::Study],
            ),
            (
                &["sleep", "stress", "mind", "wellness", "energy", "anxiety", "balance"],
                &[PlanCategory::Wellness],
            ),
        ];

        let mut out = Vec::new();
        for (keywords, categories) in RULES {
            if keywords.iter().any(|k| self.0.contains(k)) {
                for c in *categories {
                    if !out.contains(c) {
                        out.push(*c);
                    }
                }
            }
        }
        out.sort();
        out
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a goal stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Analyzing,
    #[default]
    Active,
    InProgress,
    NeedsAdjustment,
    Completed,
    Paused,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Analyzing => "analyzing",
            GoalStatus::Active => "active",
            GoalStatus::InProgress => "in_progress",
            GoalStatus::NeedsAdjustment => "needs_adjustment",
            GoalStatus::Completed => "completed",
            GoalStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "analyzing" => Ok(GoalStatus::Analyzing),
            "active" => Ok(GoalStatus::Active),
            "in_progress" | "on_track" => Ok(GoalStatus::InProgress),
            "needs_adjustment" | "off_track" | "behind" => Ok(GoalStatus::NeedsAdjustment),
            "completed" | "done" | "achieved" => Ok(GoalStatus::Completed),
            "paused" => Ok(GoalStatus::Paused),
            other => Err(ValidationError::invalid_format(
                "goal_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// Self-reported fitness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitnessLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl FitnessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitnessLevel::Beginner => "beginner",
            FitnessLevel::Intermediate => "intermediate",
            FitnessLevel::Advanced => "advanced",
        }
    }
}

impl FromStr for FitnessLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" | "novice" => Ok(FitnessLevel::Beginner),
            "intermediate" => Ok(FitnessLevel::Intermediate),
            "advanced" | "expert" => Ok(FitnessLevel::Advanced),
            other => Err(ValidationError::invalid_format(
                "fitness_level",
                format!("unknown level '{}'", other),
            )),
        }
    }
}

/// Preferred time of day for focused work and training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FocusTime {
    #[default]
    Morning,
    Afternoon,
    Evening,
    Flexible,
}

impl FocusTime {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusTime::Morning => "morning",
            FocusTime::Afternoon => "afternoon",
            FocusTime::Evening => "evening",
            FocusTime::Flexible => "flexible",
        }
    }
}

impl FromStr for FocusTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(FocusTime::Morning),
            "afternoon" => Ok(FocusTime::Afternoon),
            "evening" | "night" => Ok(FocusTime::Evening),
            "flexible" | "any" | "anytime" => Ok(FocusTime::Flexible),
            other => Err(ValidationError::invalid_format(
                "focus_time",
                format!("unknown focus time '{}'", other),
            )),
        }
    }
}

/// Readiness for change on a 1-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Readiness(u8);

impl Readiness {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    pub const NEUTRAL: Readiness = Readiness(5);

    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ValidationError::out_of_range(
                "readiness",
                i64::from(Self::MIN),
                i64::from(Self::MAX),
                i64::from(value),
            ));
        }
        Ok(Self(value))
    }

    /// Derives readiness from a backend motivation score, clamping into range.
    pub fn from_motivation(score: i64) -> Self {
        Self(score.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/10", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_slugs_are_normalized() {
        assert_eq!(Goal::new("Exam Prep").unwrap().as_str(), "exam-prep");
        assert_eq!(Goal::new("  weight_loss!! ").unwrap().as_str(), "weight-loss");
        assert!(Goal::new("  !! ").is_err());
    }

    #[test]
    fn weight_loss_touches_nutrition_and_fitness() {
        let goal = Goal::new("weight-loss").unwrap();
        assert_eq!(
            goal.categories(),
            vec![PlanCategory::Nutrition, PlanCategory::Fitness]
        );
    }

    #[test]
    fn exam_prep_touches_study_only() {
        assert_eq!(Goal::new("exam-prep").unwrap().categories(), vec![PlanCategory::Study]);
    }

    #[test]
    fn readiness_from_motivation_clamps() {
        assert_eq!(Readiness::from_motivation(7).value(), 7);
        assert_eq!(Readiness::from_motivation(0).value(), 1);
        assert_eq!(Readiness::from_motivation(42).value(), 10);
        assert!(Readiness::new(11).is_err());
    }

    #[test]
    fn enums_parse_leniently() {
        assert_eq!("Expert".parse::<FitnessLevel>().unwrap(), FitnessLevel::Advanced);
        assert_eq!("night".parse::<FocusTime>().unwrap(), FocusTime::Evening);
        assert!("sometimes".parse::<FocusTime>().is_err());
    }
}
