//! Needs evaluation: advisory risk/opportunity analysis, re-derived each turn.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::extract::{clean_list, required, ExtractionError, ResponseSanitizer};
use crate::domain::plan::PlanCategory;

/// Backend analysis of a resolved profile and the latest input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedsEvaluation {
    pub summary: String,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
    /// Categories the evaluation recommends revisiting.
    pub adjust_categories: Vec<PlanCategory>,
    /// Per-category guidance handed to plan synthesis.
    pub category_notes: BTreeMap<PlanCategory, String>,
}

#[derive(Debug, Deserialize)]
struct RawNeeds {
    summary: Option<String>,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    opportunities: Vec<String>,
    #[serde(default)]
    adjust_categories: Vec<String>,
    #[serde(default)]
    category_notes: BTreeMap<String, String>,
}

impl NeedsEvaluation {
    pub fn from_backend(
        sanitizer: &ResponseSanitizer,
        response: &str,
    ) -> Result<Self, ExtractionError> {
        let raw: RawNeeds = sanitizer.parse_object(response)?;
        let summary = required("summary", raw.summary.as_deref().unwrap_or(""))?;

        let mut adjust_categories: Vec<PlanCategory> = raw
            .adjust_categories
            .iter()
            .filter_map(|label| PlanCategory::from_domain_label(label))
            .collect();
        adjust_categories.sort();
        adjust_categories.dedup();

        let category_notes = raw
            .category_notes
            .iter()
            .filter_map(|(label, note)| {
                let category = PlanCategory::from_domain_label(label)?;
                let note = note.trim();
                (!note.is_empty()).then(|| (category, note.to_string()))
            })
            .collect();

        Ok(Self {
            summary,
            risks: clean_list(&raw.risks),
            opportunities: clean_list(&raw.opportunities),
            adjust_categories,
            category_notes,
        })
    }

    pub fn note_for(&self, category: PlanCategory) -> Option<&str> {
        self.category_notes.get(&category).map(String::as_str)
    }
}
