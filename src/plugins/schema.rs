//! Declarative plugin configuration schemas.
//!
//! # Responsibilities
//! - Let an export declare required keys and expected value kinds
//! - Validate a plugin's config table before any plugin code runs
//! - Report every violation, not just the first
//!
//! # Design Decisions
//! - Unknown keys are tolerated: plugins may read extras themselves
//! - Validation is a pure function over the JSON-shaped config value

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Expected kind of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_f64() || value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// Schema an export declares for its configuration table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSchema {
    /// Keys that must be present.
    #[serde(default)]
    pub required: Vec<String>,
    /// Expected kind per key, checked when the key is present.
    #[serde(default)]
    pub properties: HashMap<String, ValueKind>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, key: impl Into<String>, kind: ValueKind) -> Self {
        let key = key.into();
        self.required.push(key.clone());
        self.properties.insert(key, kind);
        self
    }

    pub fn optional(mut self, key: impl Into<String>, kind: ValueKind) -> Self {
        self.properties.insert(key.into(), kind);
        self
    }

    /// Validate a config value, returning all violations.
    pub fn validate(&self, config: &Value) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let Some(table) = config.as_object() else {
            return Err(vec![format!(
                "expected a configuration table, got {}",
                ValueKind::describe(config)
            )]);
        };

        for key in &self.required {
            if !table.contains_key(key) {
                errors.push(format!("missing required key {key:?}"));
            }
        }
        for (key, kind) in &self.properties {
            if let Some(value) = table.get(key) {
                if !kind.matches(value) {
                    errors.push(format!(
                        "key {key:?} expects {kind:?}, got {}",
                        ValueKind::describe(value)
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            errors.sort();
            Err(errors)
        }
    }
}
