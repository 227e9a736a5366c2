//! Plan module - versioned four-category plans with safe numeric targets.

mod category;
#[allow(clippy::module_inception)]
mod plan;
mod targets;

pub use category::PlanCategory;
pub use plan::{CategoryPlan, Plan, PlanCategories};
pub use targets::{Clamped, NumericTarget, SafeRange, TargetKind};
