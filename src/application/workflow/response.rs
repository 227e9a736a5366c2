//! User-facing response text.

use crate::domain::assessment::{NeedsEvaluation, ProgressFeedback};
use crate::domain::plan::{CategoryPlan, Plan, PlanCategory};
use crate::domain::profile::Profile;
use crate::domain::turn::ClampNote;

/// Returned whenever a turn could not be processed.
pub const APOLOGY: &str = "I apologize, but I encountered some technical difficulties while \
processing your request.

However, I'm still here to help! Could you please:
1. Try rephrasing your request
2. Or let me know which area you'd like to focus on (fitness, nutrition, study habits, wellness)

Nothing from this message was used to change your plan.";

const SIGN_OFF: &str =
    "---\n*I'm here to support you every step of the way! Feel free to share updates or ask questions.*";

/// Everything a completed turn shows the user.
pub struct ResponseParts<'a> {
    pub needs: &'a NeedsEvaluation,
    pub plan: &'a Plan,
    pub changed: &'a [PlanCategory],
    pub clamped: &'a [ClampNote],
    pub profile: &'a Profile,
    pub progress: Option<&'a ProgressFeedback>,
}

pub fn render(parts: &ResponseParts<'_>) -> String {
    let mut out = String::new();

    out.push_str("## Understanding Your Situation\n");
    out.push_str(&parts.needs.summary);
    out.push('\n');

    if let Some(progress) = parts.progress {
        out.push_str("\n## Weekly Progress\n");
        out.push_str(&format!("**Progress:** {}\n", progress.progress));
        out.push_str(&format!("{}\n", progress.encouragement));
        out.push_str(&format!("**Adjustment:** {}\n", progress.adjustment));
    }

    out.push_str(&format!(
        "\n## Your Personalized Action Plan ({})\n",
        parts.plan.version()
    ));
    if parts.changed.is_empty() {
        out.push_str("No changes this time; your current plan still fits.\n");
    }
    for category in parts.changed {
        out.push_str(&render_category(*category, parts.plan.category(*category)));
    }
    for note in parts.clamped {
        out.push_str(&format!(
            "_Adjusted {} from {} to {} {} to stay within a safe range._\n",
            note.kind, note.suggested, note.applied, note.kind.unit()
        ));
    }

    out.push_str("\n## Goal Summary\n");
    let goals: Vec<&str> = parts.profile.goals().iter().map(|g| g.as_str()).collect();
    if !goals.is_empty() {
        out.push_str(&format!("**Goals:** {}\n", goals.join(", ")));
    }
    if let Some(timeframe) = parts.profile.timeframe() {
        out.push_str(&format!("**Timeframe:** {}\n", timeframe));
    }
    let focus: Vec<&str> = parts
        .profile
        .focus_areas()
        .iter()
        .map(PlanCategory::as_str)
        .collect();
    if !focus.is_empty() {
        out.push_str(&format!("**Focus Areas:** {}\n", focus.join(", ")));
    }

    out.push('\n');
    out.push_str(SIGN_OFF);
    out
}

/// One category as a markdown block.
pub fn render_category(category: PlanCategory, plan: &CategoryPlan) -> String {
    let mut out = format!("\n### {}\n{}\n", title(category), plan.summary);
    for action in &plan.actions {
        out.push_str(&format!("- {}\n", action));
    }
    for target in &plan.targets {
        out.push_str(&format!("- Target: {}\n", target));
    }
    out
}

/// Full plan, all four categories.
pub fn render_plan(plan: &Plan) -> String {
    let mut out = format!("## Current Plan ({})\n", plan.version());
    for category in PlanCategory::ALL {
        out.push_str(&render_category(category, plan.category(category)));
    }
    out
}

fn title(category: PlanCategory) -> &'static str {
    match category {
        PlanCategory::Nutrition => "Nutrition",
        PlanCategory::Fitness => "Fitness",
        PlanCategory::Study => "Study",
        PlanCategory::Wellness => "Wellness",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Percentage, UserKey};
    use crate::domain::plan::{PlanCategories, TargetKind};
    use std::collections::BTreeMap;

    fn needs() -> NeedsEvaluation {
        NeedsEvaluation {
            summary: "Motivated, short on time.".to_string(),
            risks: vec![],
            opportunities: vec![],
            adjust_categories: vec![PlanCategory::Fitness],
            category_notes: BTreeMap::new(),
        }
    }

    #[test]
    fn renders_sections_for_changed_categories_only() {
        let key = UserKey::new("abcdef01").unwrap();
        let plan = Plan::first(key.clone(), PlanCategories::baseline(), vec![PlanCategory::Fitness]);
        let profile = Profile::new_default(key);
        let needs = needs();
        let text = render(&ResponseParts {
            needs: &needs,
            plan: &plan,
            changed: &[PlanCategory::Fitness],
            clamped: &[ClampNote {
                category: PlanCategory::Fitness,
                kind: TargetKind::WorkoutSessionsPerWeek,
                suggested: 10.0,
                applied: 6.0,
            }],
            profile: &profile,
            progress: None,
        });
        assert!(text.contains("## Understanding Your Situation"));
        assert!(text.contains("### Fitness"));
        assert!(!text.contains("### Study"));
        assert!(text.contains("from 10 to 6"));
        assert!(text.contains("## Goal Summary"));
    }

    #[test]
    fn weekly_turns_show_progress() {
        let key = UserKey::new("abcdef01").unwrap();
        let plan = Plan::first(key.clone(), PlanCategories::baseline(), vec![]);
        let profile = Profile::new_default(key);
        let progress = ProgressFeedback {
            progress: Percentage::new(60),
            encouragement: "Great study streak!".to_string(),
            adjustment: "Move Friday workouts to Saturday".to_string(),
            updates: Default::default(),
        };
        let needs = needs();
        let text = render(&ResponseParts {
            needs: &needs,
            plan: &plan,
            changed: &[],
            clamped: &[],
            profile: &profile,
            progress: Some(&progress),
        });
        assert!(text.contains("## Weekly Progress"));
        assert!(text.contains("Move Friday workouts to Saturday"));
        assert!(text.contains("No changes this time"));
    }

    #[test]
    fn full_plan_lists_all_categories() {
        let plan = Plan::first(
            UserKey::new("abcdef01").unwrap(),
            PlanCategories::baseline(),
            vec![],
        );
        let text = render_plan(&plan);
        for t in ["Nutrition", "Fitness", "Study", "Wellness"] {
            assert!(text.contains(&format!("### {}", t)));
        }
    }
}
