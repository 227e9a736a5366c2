//! Versioned plan snapshots.

use serde::{Deserialize, Serialize};

use super::{NumericTarget, PlanCategory, TargetKind};
use crate::domain::foundation::{PlanVersion, Timestamp, UserKey};

/// Recommendations for a single category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPlan {
    pub summary: String,
    pub actions: Vec<String>,
    pub targets: Vec<NumericTarget>,
}

impl CategoryPlan {
    /// Baseline content for a category that has never been generated.
    pub fn baseline(category: PlanCategory) -> Self {
        let (summary, actions, targets): (&str, Vec<&str>, Vec<(TargetKind, f64)>) =
            match category {
                PlanCategory::Nutrition => (
                    "Balanced eating at maintenance calories.",
                    vec!["Eat regular meals with a protein source in each"],
                    vec![(TargetKind::DailyCalories, 2000.0)],
                ),
                PlanCategory::Fitness => (
                    "Light activity to build a habit.",
                    vec!["Take a 20 minute walk on most days"],
                    vec![
                        (TargetKind::WorkoutMinutesPerSession, 20.0),
                        (TargetKind::WorkoutSessionsPerWeek, 3.0),
                    ],
                ),
                PlanCategory::Study => ("No study plan yet.", vec![], vec![]),
                PlanCategory::Wellness => (
                    "Baseline wellness routine.",
                    vec![
                        "Keep a consistent sleep and wake time",
                        "Take a short break after each 90 minutes of focused work",
                    ],
                    vec![(TargetKind::SleepHours, 8.0)],
                ),
            };
        Self {
            summary: summary.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            targets: targets
                .into_iter()
                .map(|(kind, value)| NumericTarget::clamped(kind, value).target)
                .collect(),
        }
    }
}

/// The four category plans, always all present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCategories {
    pub nutrition: CategoryPlan,
    pub fitness: CategoryPlan,
    pub study: CategoryPlan,
    pub wellness: CategoryPlan,
}

impl PlanCategories {
    pub fn baseline() -> Self {
        Self {
            nutrition: CategoryPlan::baseline(PlanCategory::Nutrition),
            fitness: CategoryPlan::baseline(PlanCategory::Fitness),
            study: CategoryPlan::baseline(PlanCategory::Study),
            wellness: CategoryPlan::baseline(PlanCategory::Wellness),
        }
    }

    pub fn get(&self, category: PlanCategory) -> &CategoryPlan {
        match category {
            PlanCategory::Nutrition => &self.nutrition,
            PlanCategory::Fitness => &self.fitness,
            PlanCategory::Study => &self.study,
            PlanCategory::Wellness => &self.wellness,
        }
    }

    pub fn set(&mut self, category: PlanCategory, plan: CategoryPlan) {
        match category {
            PlanCategory::Nutrition => self.nutrition = plan,
            PlanCategory::Fitness => self.fitness = plan,
            PlanCategory::Study => self.study = plan,
            PlanCategory::Wellness => self.wellness = plan,
        }
    }
}

/// Immutable plan version for one user.
///
/// # Invariants
///
/// - `version` is `predecessor + 1`, or 1 when there is no predecessor
/// - `changed` lists each regenerated category once, in synthesis order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    user_key: UserKey,
    version: PlanVersion,
    predecessor: Option<PlanVersion>,
    categories: PlanCategories,
    changed: Vec<PlanCategory>,
    created_at: Timestamp,
}

impl Plan {
    /// First plan for a user.
    pub fn first(user_key: UserKey, categories: PlanCategories, changed: Vec<PlanCategory>) -> Self {
        Self {
            user_key,
            version: PlanVersion::FIRST,
            predecessor: None,
            categories,
            changed: normalize_changed(changed),
            created_at: Timestamp::now(),
        }
    }

    /// Next plan after `prior`.
    pub fn successor(prior: &Plan, categories: PlanCategories, changed: Vec<PlanCategory>) -> Self {
        Self {
            user_key: prior.user_key.clone(),
            version: prior.version.next(),
            predecessor: Some(prior.version),
            categories,
            changed: normalize_changed(changed),
            created_at: Timestamp::now(),
        }
    }

    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    pub fn version(&self) -> PlanVersion {
        self.version
    }

    pub fn predecessor(&self) -> Option<PlanVersion> {
        self.predecessor
    }

    pub fn categories(&self) -> &PlanCategories {
        &self.categories
    }

    pub fn category(&self, category: PlanCategory) -> &CategoryPlan {
        self.categories.get(category)
    }

    pub fn changed(&self) -> &[PlanCategory] {
        &self.changed
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }
}

fn normalize_changed(changed: Vec<PlanCategory>) -> Vec<PlanCategory> {
    PlanCategory::ALL
        .into_iter()
        .filter(|c| changed.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> UserKey {
        UserKey::new("feedface").unwrap()
    }

    #[test]
    fn baseline_targets_are_in_range() {
        let categories = PlanCategories::baseline();
        for c in PlanCategory::ALL {
            for t in &categories.get(c).targets {
                assert!(t.kind().safe_range().contains(t.value()));
            }
        }
    }

    #[test]
    fn first_plan_has_no_predecessor() {
        let plan = Plan::first(key(), PlanCategories::baseline(), vec![PlanCategory::Study]);
        assert_eq!(plan.version(), PlanVersion::FIRST);
        assert_eq!(plan.predecessor(), None);
    }

    #[test]
    fn successor_references_prior_version() {
        let first = Plan::first(key(), PlanCategories::baseline(), vec![]);
        let second = Plan::successor(&first, first.categories().clone(), vec![PlanCategory::Fitness]);
        assert_eq!(second.version().value(), 2);
        assert_eq!(second.predecessor(), Some(first.version()));
        assert_eq!(second.changed(), &[PlanCategory::Fitness]);
    }

    #[test]
    fn changed_is_deduplicated_and_ordered() {
        let plan = Plan::first(
            key(),
            PlanCategories::baseline(),
            vec![PlanCategory::Wellness, PlanCategory::Nutrition, PlanCategory::Wellness],
        );
        assert_eq!(plan.changed(), &[PlanCategory::Nutrition, PlanCategory::Wellness]);
    }

    #[test]
    fn set_replaces_only_one_category() {
        let mut categories = PlanCategories::baseline();
        let before = categories.clone();
        categories.set(
            PlanCategory::Study,
            CategoryPlan {
                summary: "Exam prep".into(),
                actions: vec!["Review notes".into()],
                targets: vec![],
            },
        );
        assert_eq!(categories.nutrition, before.nutrition);
        assert_ne!(categories.study, before.study);
    }

    #[test]
    fn plan_roundtrips_through_json() {
        let plan = Plan::first(key(), PlanCategories::baseline(), vec![PlanCategory::Nutrition]);
        let json = serde_json::to_vec(&plan).unwrap();
        let back: Plan = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, plan);
    }
}
