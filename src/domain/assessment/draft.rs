//! Per-category plan drafts returned by the backend, before clamping.

use serde::Deserialize;

use super::extract::{clean_list, required, ExtractionError, ResponseSanitizer};
use crate::domain::plan::TargetKind;

/// Unvalidated numeric suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestedTarget {
    pub kind: TargetKind,
    pub value: f64,
}

/// A category plan as suggested by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDraft {
    pub summary: String,
    pub actions: Vec<String>,
    pub targets: Vec<SuggestedTarget>,
    /// Target names outside the known vocabulary.
    pub ignored_targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDraft {
    summary: Option<String>,
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    targets: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    kind: String,
    value: f64,
}

impl CategoryDraft {
    pub fn from_backend(
        sanitizer: &ResponseSanitizer,
        response: &str,
    ) -> Result<Self, ExtractionError> {
        let raw: RawDraft = sanitizer.parse_object(response)?;
        let summary = required("summary", raw.summary.as_deref().unwrap_or(""))?;
        let actions = clean_list(&raw.actions);
        if actions.is_empty() {
            return Err(ExtractionError::MissingField("actions".to_string()));
        }

        let mut targets = Vec::new();
        let mut ignored_targets = Vec::new();
        for t in raw.targets {
            match t.kind.parse::<TargetKind>() {
                Ok(kind) => targets.push(SuggestedTarget { kind, value: t.value }),
                Err(_) => ignored_targets.push(t.kind),
            }
        }

        Ok(Self {
            summary,
            actions,
            targets,
            ignored_targets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_targets_and_ignores_unknown_kinds() {
        let draft = CategoryDraft::from_backend(
            &ResponseSanitizer::new(),
            r#"{"summary": "Vegetarian deficit",
                "actions": ["Plan lentil dinners"],
                "targets": [{"kind": "weekly_weight_loss_kg", "value": 2.0},
                            {"kind": "protein_grams", "value": 120}]}"#,
        )
        .unwrap();
        assert_eq!(draft.targets.len(), 1);
        assert_eq!(draft.targets[0].value, 2.0);
        assert_eq!(draft.ignored_targets, vec!["protein_grams".to_string()]);
    }

    #[test]
    fn actions_are_required() {
        let err = CategoryDraft::from_backend(
            &ResponseSanitizer::new(),
            r#"{"summary": "x", "actions": []}"#,
        )
        .unwrap_err();
        assert_eq!(err, ExtractionError::MissingField("actions".into()));
    }

    #[test]
    fn non_numeric_target_value_is_a_shape_error() {
        let err = CategoryDraft::from_backend(
            &ResponseSanitizer::new(),
            r#"{"summary": "x", "actions": ["a"], "targets": [{"kind": "sleep_hours", "value": "lots"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::Shape(_)));
    }
}
