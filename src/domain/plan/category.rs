//! The four plan categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// One of the four recommendation areas a plan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanCategory {
    Nutrition,
    Fitness,
    Study,
    Wellness,
}

impl PlanCategory {
    /// All categories in synthesis order.
    pub const ALL: [PlanCategory; 4] = [
        PlanCategory::Nutrition,
        PlanCategory::Fitness,
        PlanCategory::Study,
        PlanCategory::Wellness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanCategory::Nutrition => "nutrition",
            PlanCategory::Fitness => "fitness",
            PlanCategory::Study => "study",
            PlanCategory::Wellness => "wellness",
        }
    }

    /// Maps a free-form domain label from the backend onto a category.
    ///
    /// Labels outside the known vocabulary map to `None`.
    pub fn from_domain_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let category = match normalized.as_str() {
            "nutrition" | "diet" | "food" | "meals" | "eating" => PlanCategory::Nutrition,
            "fitness" | "exercise" | "workout" | "workouts" | "training" | "strength" => {
                PlanCategory::Fitness
            }
            "study" | "studying" | "learning" | "education" | "exam" | "exams" | "career" => {
                PlanCategory::Study
            }
            "wellness" | "lifestyle" | "sleep" | "stress" | "mindfulness" | "mental_health"
            | "recovery" => PlanCategory::Wellness,
            _ => return None,
        };
        Some(category)
    }
}

impl fmt::Display for PlanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                ValidationError::invalid_format("category", format!("unknown category '{}'", s))
            })
    }
}
