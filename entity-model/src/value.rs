//! FILENAME: entity-model/src/value.rs
//! PURPOSE: Defines the scalar value type shared by entity data and flattened tables.
//! CONTEXT: This file contains the `Value` enum used for dimension members,
//! parameter values and rendered table cells. Values must be usable as row and
//! column keys, so equality and hashing are total (NaN compares equal to NaN).

use serde::{Deserialize, Serialize};

/// A scalar datum flowing from the relational source into flattened tables.
///
/// `Empty` renders as the absence of a value: writing it into a table is a
/// no-op rather than a write of an empty string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Empty => 0u8.hash(state),
            Value::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
            Value::Number(n) => {
                2u8.hash(state);
                if n.is_nan() {
                    // All NaN values hash to the same thing
                    u64::MAX.hash(state);
                } else if *n == 0.0 {
                    // 0.0 and -0.0 compare equal, so they must share a hash
                    0u64.hash(state);
                } else {
                    n.to_bits().hash(state);
                }
            }
            Value::Boolean(b) => {
                3u8.hash(state);
                b.hash(state);
            }
        }
    }
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    pub fn number(num: f64) -> Self {
        Value::Number(num)
    }

    pub fn boolean(value: bool) -> Self {
        Value::Boolean(value)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Returns the numeric content, if any. Text and booleans are not
    /// coerced; numeric aggregation treats them as type errors.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Short label of the variant, for diagnostics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Text(_) => "text",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
        }
    }

    /// Returns the display form of the value as a String.
    /// This is used for concatenation and other features that need
    /// the value as text.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Number(n) => {
                // Format without unnecessary decimal places
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{:.0}", n)
                } else {
                    format!("{}", n)
                }
            }
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => {
                if *b { "true" } else { "false" }.to_string()
            }
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Empty
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<f64> for Value {
    fn from(num: f64) -> Self {
        Value::Number(num)
    }
}

impl From<i64> for Value {
    fn from(num: i64) -> Self {
        Value::Number(num as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

// ============================================================================
// TESTS
// ============================================================================
