//! Output contract validation.
//!
//! After a successful apply the engine exposes named outputs. Tests assert
//! on them through [`OutputSet`], which is provider-blind by contract: the
//! same checks validate an AWS, Azure, GCP, or DigitalOcean load balancer
//! as long as the logical keys are present. Provider-specific extra keys
//! are permitted but never required.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// An output failed a contract check. Always fatal to the calling test.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("output '{key}' is missing")]
    Missing { key: String },

    #[error("output '{key}' is empty")]
    Empty { key: String },

    #[error("output '{key}' is not a {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("output '{key}' value '{value}' does not match pattern '{pattern}'")]
    PatternMismatch {
        key: String,
        value: String,
        pattern: String,
    },

    #[error("output '{key}' has {actual} element(s), expected {expected}")]
    WrongCount {
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("engine output was not a JSON object: {reason}")]
    Malformed { reason: String },
}

/// Named outputs of a completed apply.
///
/// Read-only once produced. The lifecycle controller clears the session's
/// cached set at the start of every apply, so a stale set from a prior
/// apply is never consulted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSet {
    values: BTreeMap<String, Value>,
}

impl OutputSet {
    /// Build a set from already-unwrapped values.
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Parse the engine's `output -json` document.
    ///
    /// The engine wraps each output as `{"value": …, "type": …,
    /// "sensitive": …}`; a plain `{"name": value}` map is accepted too so
    /// scripted engines in tests can keep their fixtures short.
    pub fn from_engine_json(raw: &str) -> Result<Self, ValidationError> {
        let document: Value =
            serde_json::from_str(raw).map_err(|e| ValidationError::Malformed {
                reason: e.to_string(),
            })?;

        let object = match document {
            Value::Object(map) => map,
            other => {
                return Err(ValidationError::Malformed {
                    reason: format!("expected an object, got {other}"),
                })
            }
        };

        let values = object
            .into_iter()
            .map(|(key, entry)| {
                let value = match entry {
                    Value::Object(mut wrapper) if wrapper.contains_key("value") => wrapper
                        .remove("value")
                        .unwrap_or(Value::Null),
                    plain => plain,
                };
                (key, value)
            })
            .collect();

        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value under `key`, which must exist and be non-empty.
    ///
    /// Null, `""`, `[]`, and `{}` all count as empty.
    pub fn require_non_empty(&self, key: &str) -> Result<&Value, ValidationError> {
        let value = self.values.get(key).ok_or_else(|| ValidationError::Missing {
            key: key.to_string(),
        })?;
        if is_empty_value(value) {
            return Err(ValidationError::Empty {
                key: key.to_string(),
            });
        }
        Ok(value)
    }

    /// The value under `key` as a non-empty string.
    pub fn require_string(&self, key: &str) -> Result<&str, ValidationError> {
        match self.require_non_empty(key)? {
            Value::String(s) => Ok(s),
            _ => Err(ValidationError::WrongType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    /// The value under `key` as a string matching `pattern`.
    ///
    /// For format-constrained outputs, e.g. CIDR blocks against
    /// `^\d+\.\d+\.\d+\.\d+/\d+$`.
    pub fn require_matches(&self, key: &str, pattern: &Regex) -> Result<&str, ValidationError> {
        let value = self.require_string(key)?;
        if !pattern.is_match(value) {
            return Err(ValidationError::PatternMismatch {
                key: key.to_string(),
                value: value.to_string(),
                pattern: pattern.as_str().to_string(),
            });
        }
        Ok(value)
    }

    /// The value under `key` as a non-empty list of strings.
    pub fn require_string_list(&self, key: &str) -> Result<Vec<String>, ValidationError> {
        let value = self.require_non_empty(key)?;
        let items = value.as_array().ok_or_else(|| ValidationError::WrongType {
            key: key.to_string(),
            expected: "list",
        })?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ValidationError::WrongType {
                        key: key.to_string(),
                        expected: "list of strings",
                    })
            })
            .collect()
    }

    /// The value under `key` as a non-empty string-to-string map.
    pub fn require_string_map(&self, key: &str) -> Result<BTreeMap<String, String>, ValidationError> {
        let value = self.require_non_empty(key)?;
        let entries = value.as_object().ok_or_else(|| ValidationError::WrongType {
            key: key.to_string(),
            expected: "map",
        })?;
        entries
            .iter()
            .map(|(name, entry)| {
                entry
                    .as_str()
                    .map(|s| (name.clone(), s.to_string()))
                    .ok_or_else(|| ValidationError::WrongType {
                        key: key.to_string(),
                        expected: "map of strings",
                    })
            })
            .collect()
    }

    /// Assert that the sequence under `key` has exactly `expected` elements.
    pub fn require_count(&self, key: &str, expected: usize) -> Result<(), ValidationError> {
        let value = self.values.get(key).ok_or_else(|| ValidationError::Missing {
            key: key.to_string(),
        })?;
        let items = value.as_array().ok_or_else(|| ValidationError::WrongType {
            key: key.to_string(),
            expected: "list",
        })?;
        if items.len() != expected {
            return Err(ValidationError::WrongCount {
                key: key.to_string(),
                expected,
                actual: items.len(),
            });
        }
        Ok(())
    }

    /// Assert that every logical key is present and non-empty.
    ///
    /// This is the cross-provider equivalence check: the matrix requires
    /// the same contract keys from every provider's output set, while
    /// provider-specific extras are ignored.
    pub fn require_keys<'k>(
        &self,
        keys: impl IntoIterator<Item = &'k str>,
    ) -> Result<(), ValidationError> {
        for key in keys {
            self.require_non_empty(key)?;
        }
        Ok(())
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
