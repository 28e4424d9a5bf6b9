//! Extraction fields and colour vocabularies, validated at the request boundary.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExemplarError;

/// One field the model is asked to extract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    /// Only required fields are reported as missing by the validator.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ConfigField {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            options: None,
            required: true,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Options worth rendering: present and not an empty/falsy value.
    pub fn rendered_options(&self) -> Option<&Value> {
        match self.options.as_ref()? {
            Value::Null | Value::Bool(false) => None,
            Value::Object(m) if m.is_empty() => None,
            Value::Array(a) if a.is_empty() => None,
            Value::String(s) if s.is_empty() => None,
            other => Some(other),
        }
    }
}

/// Parse a field list given either as a JSON array or a string holding one.
pub fn parse_config_fields(value: &Value) -> Result<Vec<ConfigField>, ExemplarError> {
    let parsed;
    let value = match value {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s).map_err(|e| {
                ExemplarError::MalformedConfig(format!("config_json is not valid JSON: {}", e))
            })?;
            &parsed
        }
        other => other,
    };

    let items = value.as_array().ok_or_else(|| {
        ExemplarError::MalformedConfig("config_json must be a list of fields".to_string())
    })?;

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or_else(|| {
            ExemplarError::MalformedConfig(format!("field {} must be an object", i))
        })?;

        let name = match obj.get("name") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Err(ExemplarError::MalformedConfig(format!(
                    "field {} is missing 'name'",
                    i
                )))
            }
        };
        let field_type = match obj.get("type") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Err(ExemplarError::MalformedConfig(format!(
                    "field '{}' is missing 'type'",
                    name
                )))
            }
        };
        let required = match obj.get("required").or_else(|| obj.get("is_required")) {
            None | Some(Value::Null) => true,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(ExemplarError::MalformedConfig(format!(
                    "field '{}': 'required' must be a boolean",
                    name
                )))
            }
        };

        if !seen.insert(name.clone()) {
            return Err(ExemplarError::MalformedConfig(format!(
                "duplicate field name '{}'",
                name
            )));
        }

        fields.push(ConfigField {
            name,
            field_type,
            options: obj.get("options").filter(|o| !o.is_null()).cloned(),
            required,
        });
    }

    Ok(fields)
}

/// Parse a colour list given as a JSON array or a comma-separated string.
/// Entries are trimmed and blanks dropped; `null` is an empty list.
pub fn parse_color_list(value: &Value) -> Result<Vec<String>, ExemplarError> {
    let raw: Vec<&str> = match value {
        Value::Null => Vec::new(),
        Value::String(s) => s.split(',').collect(),
        Value::Array(items) => items
            .iter()
            .map(|c| {
                c.as_str().ok_or_else(|| {
                    ExemplarError::InvalidInput("color_list entries must be strings".to_string())
                })
            })
            .collect::<Result<_, _>>()?,
        _ => {
            return Err(ExemplarError::InvalidInput(
                "color_list must be a list or a comma-separated string".to_string(),
            ))
        }
    };

    Ok(raw
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect())
}
