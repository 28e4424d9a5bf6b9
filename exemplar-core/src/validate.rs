//! Output validation: checks a model answer against the field contract.
//!
//! Structural problems (not an array, items that are not objects) are errors
//! and make the answer invalid. Unknown or missing keys are only warnings.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExemplarError;
use crate::models::ConfigField;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

fn join_names<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().collect::<Vec<_>>().join(", ")
}

pub fn validate_output(output: &Value, fields: &[ConfigField]) -> ValidationReport {
    let items = match output.as_array() {
        Some(items) => items,
        None => {
            return ValidationReport::from_parts(
                vec!["Output must be a JSON array".to_string()],
                Vec::new(),
            )
        }
    };

    let known: BTreeSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    let required: BTreeSet<&str> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name.as_str())
        .collect();

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (idx, item) in items.iter().enumerate() {
        let obj = match item.as_object() {
            Some(obj) => obj,
            None => {
                errors.push(format!("Item {} must be an object", idx));
                continue;
            }
        };

        let keys: BTreeSet<&str> = obj.keys().map(String::as_str).collect();

        let unknown: Vec<&str> = keys.difference(&known).copied().collect();
        if !unknown.is_empty() {
            warnings.push(format!("Item {} has unknown fields: {}", idx, join_names(unknown)));
        }

        let missing: Vec<&str> = required.difference(&keys).copied().collect();
        if !missing.is_empty() {
            warnings.push(format!("Item {} is missing fields: {}", idx, join_names(missing)));
        }
    }

    ValidationReport::from_parts(errors, warnings)
}

/// Strip a surrounding markdown code fence (```` ```json ```` or ```` ``` ````).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") up to the first newline.
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse raw model text into JSON, tolerating a markdown fence.
pub fn parse_model_output(raw: &str) -> Result<Value, ExemplarError> {
    let body = strip_code_fences(raw);
    serde_json::from_str(body)
        .map_err(|e| ExemplarError::MalformedOutput(format!("model output is not valid JSON: {}", e)))
}

/// Parse and validate raw model text. A parse failure is reported as a single
/// structural error rather than raised.
pub fn validate_response_text(raw: &str, fields: &[ConfigField]) -> (Option<Value>, ValidationReport) {
    match parse_model_output(raw) {
        Ok(value) => {
            let report = validate_output(&value, fields);
            (Some(value), report)
        }
        Err(e) => (None, ValidationReport::from_parts(vec![e.to_string()], Vec::new())),
    }
}
