//! Numeric plan targets and their documented safe ranges.
//!
//! | target                          | min   | max   |
//! |---------------------------------|-------|-------|
//! | `daily_calories` (kcal)         | 1200  | 4000  |
//! | `daily_caloric_deficit` (kcal)  | 0     | 500   |
//! | `weekly_weight_loss_kg`         | 0     | 1.0   |
//! | `weekly_weight_gain_kg`         | 0     | 0.5   |
//! | `workout_minutes_per_session`   | 10    | 90    |
//! | `workout_sessions_per_week`     | 1     | 6     |
//! | `study_hours_per_day`           | 0.5   | 8     |
//! | `sleep_hours`                   | 7     | 9     |
//! | `meditation_minutes_per_day`    | 0     | 60    |
//!
//! Backend suggestions outside a range are replaced by the nearest bound.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PlanCategory;
use crate::domain::foundation::ValidationError;

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeRange {
    pub min: f64,
    pub max: f64,
}

impl SafeRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Nearest in-range value. NaN clamps to the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

/// Kind of numeric target a plan may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    DailyCalories,
    DailyCaloricDeficit,
    WeeklyWeightLossKg,
    WeeklyWeightGainKg,
    WorkoutMinutesPerSession,
    WorkoutSessionsPerWeek,
    StudyHoursPerDay,
    SleepHours,
    MeditationMinutesPerDay,
}

impl TargetKind {
    pub const ALL: [TargetKind; 9] = [
        TargetKind::DailyCalories,
        TargetKind::DailyCaloricDeficit,
        TargetKind::WeeklyWeightLossKg,
        TargetKind::WeeklyWeightGainKg,
        TargetKind::WorkoutMinutesPerSession,
        TargetKind::WorkoutSessionsPerWeek,
        TargetKind::StudyHoursPerDay,
        TargetKind::SleepHours,
        TargetKind::MeditationMinutesPerDay,
    ];

    pub fn safe_range(&self) -> SafeRange {
        match self {
            TargetKind::DailyCalories => SafeRange::new(1200.0, 4000.0),
            TargetKind::DailyCaloricDeficit => SafeRange::new(0.0, 500.0),
            TargetKind::WeeklyWeightLossKg => SafeRange::new(0.0, 1.0),
            TargetKind::WeeklyWeightGainKg => SafeRange::new(0.0, 0.5),
            TargetKind::WorkoutMinutesPerSession => SafeRange::new(10.0, 90.0),
            TargetKind::WorkoutSessionsPerWeek => SafeRange::new(1.0, 6.0),
            TargetKind::StudyHoursPerDay => SafeRange::new(0.5, 8.0),
            TargetKind::SleepHours => SafeRange::new(7.0, 9.0),
            TargetKind::MeditationMinutesPerDay => SafeRange::new(0.0, 60.0),
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            TargetKind::DailyCalories | TargetKind::DailyCaloricDeficit => "kcal",
            TargetKind::WeeklyWeightLossKg | TargetKind::WeeklyWeightGainKg => "kg/week",
            TargetKind::WorkoutMinutesPerSession | TargetKind::MeditationMinutesPerDay => "min",
            TargetKind::WorkoutSessionsPerWeek => "sessions/week",
            TargetKind::StudyHoursPerDay | TargetKind::SleepHours => "h",
        }
    }

    /// Category a target naturally belongs to.
    pub fn category(&self) -> PlanCategory {
        match self {
            TargetKind::DailyCalories
            | TargetKind::DailyCaloricDeficit
            | TargetKind::WeeklyWeightLossKg
            | TargetKind::WeeklyWeightGainKg => PlanCategory::Nutrition,
            TargetKind::WorkoutMinutesPerSession | TargetKind::WorkoutSessionsPerWeek => {
                PlanCategory::Fitness
            }
            TargetKind::StudyHoursPerDay => PlanCategory::Study,
            TargetKind::SleepHours | TargetKind::MeditationMinutesPerDay => PlanCategory::Wellness,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::DailyCalories => "daily_calories",
            TargetKind::DailyCaloricDeficit => "daily_caloric_deficit",
            TargetKind::WeeklyWeightLossKg => "weekly_weight_loss_kg",
            TargetKind::WeeklyWeightGainKg => "weekly_weight_gain_kg",
            TargetKind::WorkoutMinutesPerSession => "workout_minutes_per_session",
            TargetKind::WorkoutSessionsPerWeek => "workout_sessions_per_week",
            TargetKind::StudyHoursPerDay => "study_hours_per_day",
            TargetKind::SleepHours => "sleep_hours",
            TargetKind::MeditationMinutesPerDay => "meditation_minutes_per_day",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        TargetKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| {
                ValidationError::invalid_format("target", format!("unknown target '{}'", s))
            })
    }
}

/// A target value that is always inside its kind's safe range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericTarget {
    kind: TargetKind,
    value: f64,
}

/// Result of clamping a suggested value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clamped {
    pub target: NumericTarget,
    /// The suggested value when it had to be adjusted.
    pub adjusted_from: Option<f64>,
}

impl NumericTarget {
    /// Creates a target, rejecting values outside the safe range.
    pub fn new(kind: TargetKind, value: f64) -> Result<Self, ValidationError> {
        let range = kind.safe_range();
        if !range.contains(value) {
            return Err(ValidationError::invalid_format(
                kind.as_str(),
                format!("{} is outside {}..={}", value, range.min, range.max),
            ));
        }
        Ok(Self { kind, value })
    }

    /// Creates a target from a backend suggestion, clamping into range.
    pub fn clamped(kind: TargetKind, suggested: f64) -> Clamped {
        let value = kind.safe_range().clamp(suggested);
        let adjusted_from = if value == suggested { None } else { Some(suggested) };
        Clamped {
            target: Self { kind, value },
            adjusted_from,
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl fmt::Display for NumericTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.kind, self.value, self.kind.unit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn in_range_values_pass_through() {
        let c = NumericTarget::clamped(TargetKind::WeeklyWeightLossKg, 0.5);
        assert_eq!(c.target.value(), 0.5);
        assert_eq!(c.adjusted_from, None);
    }

    #[test]
    fn aggressive_loss_rate_is_clamped_to_upper_bound() {
        let c = NumericTarget::clamped(TargetKind::WeeklyWeightLossKg, 2.5);
        assert_eq!(c.target.value(), 1.0);
        assert_eq!(c.adjusted_from, Some(2.5));
    }

    #[test]
    fn starvation_calories_are_clamped_to_lower_bound() {
        let c = NumericTarget::clamped(TargetKind::DailyCalories, 800.0);
        assert_eq!(c.target.value(), 1200.0);
    }

    #[test]
    fn nan_clamps_to_lower_bound() {
        let c = NumericTarget::clamped(TargetKind::SleepHours, f64::NAN);
        assert_eq!(c.target.value(), 7.0);
        assert!(c.adjusted_from.is_some());
    }

    #[test]
    fn new_rejects_out_of_range() {
        assert!(NumericTarget::new(TargetKind::DailyCaloricDeficit, 750.0).is_err());
        assert!(NumericTarget::new(TargetKind::DailyCaloricDeficit, 500.0).is_ok());
    }

    #[test]
    fn parses_snake_case_names() {
        assert_eq!(
            "Workout_Sessions_Per_Week".parse::<TargetKind>().unwrap(),
            TargetKind::WorkoutSessionsPerWeek
        );
        assert!("bench_press_kg".parse::<TargetKind>().is_err());
    }

    fn any_kind() -> impl Strategy<Value = TargetKind> {
        proptest::sample::select(TargetKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn clamped_value_is_always_in_range(kind in any_kind(), raw in proptest::num::f64::ANY) {
            let c = NumericTarget::clamped(kind, raw);
            prop_assert!(kind.safe_range().contains(c.target.value()));
        }

        #[test]
        fn out_of_range_maps_to_nearest_bound(kind in any_kind(), raw in -1.0e6f64..1.0e6) {
            let range = kind.safe_range();
            let value = NumericTarget::clamped(kind, raw).target.value();
            if raw < range.min {
                prop_assert_eq!(value, range.min);
            } else if raw > range.max {
                prop_assert_eq!(value, range.max);
            } else {
                prop_assert_eq!(value, raw);
            }
        }
    }
}
