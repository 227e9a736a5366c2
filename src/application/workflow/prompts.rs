//! Prompt construction for each backend call.
//!
//! Every prompt asks for a single JSON object whose fields match the
//! parsers in `domain::assessment`. Profile text goes in through
//! [`Profile::summary_text`], which never contains identifiers.

use crate::domain::assessment::Assessment;
use crate::domain::plan::{CategoryPlan, Plan, PlanCategory, TargetKind};
use crate::domain::profile::Profile;

const COACH_PERSONA: &str = "You are Growth Coach, an expert personal growth coach who builds \
realistic, safe plans across nutrition, fitness, study and wellness.";

const JSON_ONLY: &str = "Return ONLY valid JSON with exactly the fields shown. No prose, no markdown.";

/// System and user text for one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// What needs evaluation is reacting to this turn.
#[derive(Debug, Clone, Copy)]
pub enum NeedsFocus<'a> {
    Request {
        input: &'a str,
        assessment: &'a Assessment,
    },
    WeeklyUpdate {
        update: &'a str,
    },
}

pub fn assessment(input: &str) -> Prompt {
    let system = format!(
        "{COACH_PERSONA}\nExtract structured goal information from the user's message.\n{JSON_ONLY}"
    );
    let user = format!(
        r#"User message: {input}

Respond with:
{{
  "primary_goal": "clear, specific goal statement",
  "goals": ["short goal labels, e.g. exam-prep, weight-loss, better-sleep"],
  "domains": ["any of: nutrition, fitness, study, wellness"],
  "target_metric": "measurable target if stated, e.g. lose 4 kg, or null",
  "timeframe": "e.g. 6 weeks, or null",
  "constraints": {{
    "dietary": ["e.g. vegetarian"],
    "equipment": ["available equipment"],
    "time_budget_minutes": 60,
    "focus_time": "morning|afternoon|evening|flexible or null",
    "fitness_level": "beginner|intermediate|advanced or null",
    "calorie_target": null
  }},
  "motivation_score": 7,
  "change_reason": "why an earlier goal or constraint no longer applies, or null"
}}"#
    );
    Prompt { system, user }
}

pub fn needs_evaluation(
    profile: &Profile,
    focus: NeedsFocus<'_>,
    prior: Option<&Plan>,
    patterns: &[String],
) -> Prompt {
    let system = format!(
        "{COACH_PERSONA}\nEvaluate the user's needs: risks, opportunities and which plan \
         categories should change. This is advisory input for plan generation.\n{JSON_ONLY}"
    );

    let mut user = format!("Profile: {}\n", profile.summary_text());
    match focus {
        NeedsFocus::Request { input, assessment } => {
            user.push_str(&format!("Latest request: {input}\n"));
            user.push_str(&format!("Assessed primary goal: {}\n", assessment.primary_goal));
            if let Some(timeframe) = &assessment.timeframe {
                user.push_str(&format!("Timeframe: {timeframe}\n"));
            }
            if let Some(metric) = &assessment.target_metric {
                user.push_str(&format!("Target: {metric}\n"));
            }
        }
        NeedsFocus::WeeklyUpdate { update } => {
            user.push_str(&format!("Weekly progress update: {update}\n"));
            user.push_str(
                "Only list categories in adjust_categories that the update shows need a change.\n",
            );
        }
    }
    if let Some(plan) = prior {
        user.push_str(&format!("Current plan ({}):\n{}", plan.version(), plan_digest(plan)));
    }
    if !patterns.is_empty() {
        user.push_str("Patterns that worked for similar users:\n");
        for p in patterns {
            user.push_str(&format!("- {p}\n"));
        }
    }
    user.push_str(
        r#"
Respond with:
{
  "summary": "2-3 sentences on the user's situation and readiness",
  "risks": ["risk"],
  "opportunities": ["opportunity"],
  "adjust_categories": ["nutrition|fitness|study|wellness"],
  "category_notes": {"fitness": "guidance for that category"}
}"#,
    );
    Prompt { system, user }
}

pub fn progress_review(profile: &Profile, update: &str, prior: Option<&Plan>) -> Prompt {
    let system = format!(
        "{COACH_PERSONA}\nReview the user's weekly progress honestly and kindly.\n{JSON_ONLY}"
    );
    let mut user = format!(
        "Profile: {}\nWeekly update: {update}\n",
        profile.summary_text()
    );
    if let Some(plan) = prior {
        user.push_str(&format!("Current plan:\n{}", plan_digest(plan)));
    }
    user.push_str(
        r#"
Respond with:
{
  "progress_percent": 60,
  "encouragement": "one sentence",
  "adjustment": "one concrete adjustment for next week",
  "goal_status": [{"goal": "exam-prep", "status": "in_progress", "progress_percent": 50}],
  "time_budget_minutes": 45,
  "focus_time": "morning",
  "change_reason": "why a stated constraint changed"
}
Statuses: active, in_progress, needs_adjustment, completed, paused.
Omit time_budget_minutes, focus_time and change_reason unless the user reports a change."#,
    );
    Prompt { system, user }
}

pub fn category_plan(
    category: PlanCategory,
    profile: &Profile,
    needs_summary: &str,
    note: Option<&str>,
    prior: Option<&CategoryPlan>,
) -> Prompt {
    let system = format!(
        "{COACH_PERSONA}\nWrite the {category} part of the user's plan. Keep it practical, \
         personalised and within the user's constraints.\n{JSON_ONLY}"
    );

    let mut user = format!(
        "Profile: {}\nSituation: {needs_summary}\n",
        profile.summary_text()
    );
    if let Some(note) = note {
        user.push_str(&format!("Guidance for {category}: {note}\n"));
    }
    if let Some(prior) = prior {
        user.push_str(&format!(
            "Current {category} plan: {} Actions: {}\n",
            prior.summary,
            prior.actions.join("; ")
        ));
    }

    let kinds: Vec<String> = TargetKind::ALL
        .iter()
        .filter(|k| k.category() == category)
        .map(|k| {
            let range = k.safe_range();
            format!("{} ({}-{} {})", k.as_str(), range.min, range.max, k.unit())
        })
        .collect();
    user.push_str(&format!("Allowed numeric targets: {}\n", kinds.join(", ")));
    user.push_str(
        r#"
Respond with:
{
  "summary": "one or two sentences",
  "actions": ["specific daily or weekly action"],
  "targets": [{"kind": "target name from the allowed list", "value": 0}]
}"#,
    );
    Prompt { system, user }
}

fn plan_digest(plan: &Plan) -> String {
    let mut out = String::new();
    for category in PlanCategory::ALL {
        out.push_str(&format!("- {}: {}\n", category, plan.category(category).summary));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assessment::ResponseSanitizer;
    use crate::domain::foundation::UserKey;
    use crate::domain::plan::PlanCategories;

    fn profile() -> Profile {
        Profile::new_default(UserKey::new("abcdef01").unwrap())
    }

    #[test]
    fn assessment_prompt_embeds_input_and_contract() {
        let prompt = assessment("I want to sleep better");
        assert!(prompt.user.contains("I want to sleep better"));
        assert!(prompt.user.contains("\"primary_goal\""));
        assert!(prompt.system.contains("ONLY valid JSON"));
    }

    #[test]
    fn weekly_needs_prompt_uses_update_text() {
        let plan = Plan::first(
            UserKey::new("abcdef01").unwrap(),
            PlanCategories::baseline(),
            vec![],
        );
        let prompt = needs_evaluation(
            &profile(),
            NeedsFocus::WeeklyUpdate {
                update: "skipping workouts on Fridays",
            },
            Some(&plan),
            &[],
        );
        assert!(prompt.user.contains("skipping workouts on Fridays"));
        assert!(prompt.user.contains("Current plan (v1)"));
        assert!(!prompt.user.contains("similar users"));
    }

    #[test]
    fn request_needs_prompt_lists_patterns() {
        let a = Assessment::from_backend(
            &ResponseSanitizer::new(),
            r#"{"primary_goal": "Run a 10k", "goals": ["run-10k"], "timeframe": "8 weeks"}"#,
        )
        .unwrap();
        let prompt = needs_evaluation(
            &profile(),
            NeedsFocus::Request {
                input: "I want to run a 10k",
                assessment: &a,
            },
            None,
            &["goals: run-10k; readiness: 7".to_string()],
        );
        assert!(prompt.user.contains("Timeframe: 8 weeks"));
        assert!(prompt.user.contains("- goals: run-10k"));
    }

    #[test]
    fn category_prompt_only_offers_its_own_targets() {
        let prompt = category_plan(PlanCategory::Fitness, &profile(), "busy student", None, None);
        assert!(prompt.user.contains("workout_sessions_per_week"));
        assert!(!prompt.user.contains("daily_calories"));
    }
}
