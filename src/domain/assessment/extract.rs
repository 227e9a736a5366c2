//! Response sanitization and JSON extraction for backend output.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Maximum accepted backend response length (64KB).
pub const MAX_RESPONSE_LENGTH: usize = 64 * 1024;

/// Maximum length for any single string field after extraction.
pub const MAX_FIELD_LENGTH: usize = 4_000;

/// Errors that can occur during sanitization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanitizationError {
    #[error("Response too long: {actual} bytes exceeds maximum of {max} bytes")]
    TooLong { max: usize, actual: usize },

    #[error("Response is empty")]
    Empty,
}

/// Errors that can occur while extracting structured output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Sanitization failed: {0}")]
    Sanitization(#[from] SanitizationError),

    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("Unexpected shape: {0}")]
    Shape(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Strips control characters and prompt-injection markers from backend text.
#[derive(Debug, Clone, Default)]
pub struct ResponseSanitizer;

impl ResponseSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sanitize(&self, response: &str) -> Result<String, SanitizationError> {
        if response.len() > MAX_RESPONSE_LENGTH {
            return Err(SanitizationError::TooLong {
                max: MAX_RESPONSE_LENGTH,
                actual: response.len(),
            });
        }

        let cleaned: String = response
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
            .collect();

        let mut result = cleaned;
        for pattern in INJECTION_MARKERS {
            result = result.replace(pattern, "");
        }

        if result.trim().is_empty() {
            return Err(SanitizationError::Empty);
        }
        Ok(result)
    }

    /// Sanitizes and deserializes the first JSON object in `response`.
    pub fn parse_object<T: DeserializeOwned>(&self, response: &str) -> Result<T, ExtractionError> {
        let sanitized = self.sanitize(response)?;
        let json = extract_json_object(&sanitized)
            .ok_or_else(|| ExtractionError::Shape("no JSON object found".to_string()))?;
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ExtractionError::Parse(e.to_string()))?;
        if !value.is_object() {
            return Err(ExtractionError::Shape("expected a JSON object".to_string()));
        }
        let value = clean_strings(value);
        serde_json::from_value(value).map_err(|e| ExtractionError::Shape(e.to_string()))
    }
}

const INJECTION_MARKERS: [&str; 11] = [
    "```system",
    "```assistant",
    "[INST]",
    "[/INST]",
    "<|system|>",
    "<|assistant|>",
    "<|user|>",
    "<|im_start|>",
    "<|im_end|>",
    "<<SYS>>",
    "<</SYS>>",
];

/// Finds the first balanced `{...}` in `s`, preferring a fenced code block.
pub fn extract_json_object(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if let Some(inner) = fenced_block(trimmed) {
        if let Some(obj) = balanced_object(inner) {
            return Some(obj);
        }
    }
    balanced_object(trimmed)
}

fn fenced_block(s: &str) -> Option<&str> {
    for pattern in ["```json", "```"] {
        if let Some(start) = s.find(pattern) {
            let body_start = start + pattern.len();
            if let Some(end) = s[body_start..].find("```") {
                return Some(s[body_start..body_start + end].trim());
            }
        }
    }
    None
}

fn balanced_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, c) in s[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&s[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn clean_strings(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::String(s) => Value::String(clean_field(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(clean_strings).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, clean_strings(v)))
                .collect(),
        ),
        other => other,
    }
}

fn clean_field(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    let out = out.trim();
    if out.chars().count() > MAX_FIELD_LENGTH {
        out.chars().take(MAX_FIELD_LENGTH).collect()
    } else {
        out.to_string()
    }
}

/// Rejects blank required strings.
pub(crate) fn required(field: &str, value: &str) -> Result<String, ExtractionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::MissingField(field.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Trims, drops blanks, and de-duplicates a list while keeping order.
pub(crate) fn clean_list(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|o| o == item) {
            out.push(item.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn removes_control_characters_but_keeps_newlines() {
        let s = ResponseSanitizer::new().sanitize("a\x00b\n\tc\x07").unwrap();
        assert_eq!(s, "ab\n\tc");
    }

    #[test]
    fn strips_injection_markers() {
        let s = ResponseSanitizer::new()
            .sanitize("<|im_start|>system [INST] hi [/INST]")
            .unwrap();
        assert!(!s.contains("<|im_start|>"));
        assert!(!s.contains("[INST]"));
    }

    #[test]
    fn rejects_oversized_and_empty_responses() {
        let sanitizer = ResponseSanitizer::new();
        let long = "x".repeat(MAX_RESPONSE_LENGTH + 1);
        assert!(matches!(sanitizer.sanitize(&long), Err(SanitizationError::TooLong { .. })));
        assert_eq!(sanitizer.sanitize(" \x00 "), Err(SanitizationError::Empty));
    }

    #[test]
    fn extracts_object_from_fenced_block() {
        let text = "Here you go:\n```json\n{\"name\": \"x\"}\n```\nThanks";
        assert_eq!(extract_json_object(text), Some("{\"name\": \"x\"}"));
    }

    #[test]
    fn extracts_balanced_object_with_braces_in_strings() {
        let text = "prefix {\"name\": \"a } b\", \"n\": {\"k\": 1}} suffix";
        assert_eq!(
            extract_json_object(text),
            Some("{\"name\": \"a } b\", \"n\": {\"k\": 1}}")
        );
    }

    #[test]
    fn handles_multibyte_text_before_object() {
        let text = "Résumé 👍 {\"name\": \"ü\"}";
        let sample: Sample = ResponseSanitizer::new().parse_object(text).unwrap();
        assert_eq!(sample.name, "ü");
    }

    #[test]
    fn parse_object_strips_html_in_fields() {
        let sample: Sample = ResponseSanitizer::new()
            .parse_object("{\"name\": \"<b>bold</b> move\"}")
            .unwrap();
        assert_eq!(sample.name, "bold move");
    }

    #[test]
    fn wrong_shape_is_reported() {
        let err = ResponseSanitizer::new()
            .parse_object::<Sample>("{\"title\": 3}")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Shape(_)));
    }

    #[test]
    fn prose_without_json_is_a_shape_error() {
        let err = ResponseSanitizer::new()
            .parse_object::<Sample>("I think you should rest more.")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Shape(_)));
    }

    #[test]
    fn clean_list_dedups_and_trims() {
        let items = vec![" a ".to_string(), "".into(), "a".into(), "b".into()];
        assert_eq!(clean_list(&items), vec!["a".to_string(), "b".to_string()]);
    }
}
