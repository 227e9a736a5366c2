//! Profile module - a user's merged goals, constraints and readiness.

mod merge;
#[allow(clippy::module_inception)]
mod profile;
mod values;

pub use merge::{GoalUpdate, MergeConflict, MergeReport, ProfileDelta, Supersession};
pub use profile::{
    CalorieTarget, Constraints, GoalProgress, Profile, CALORIE_TARGET_RANGE, DEFAULT_CALORIE_TARGET,
};
pub use values::{FitnessLevel, FocusTime, Goal, GoalStatus, Readiness, MAX_GOAL_LEN};
