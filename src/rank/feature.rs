//! Opaque per-document feature values.
//!
//! Feature values are read from stored fields during the feature phase and
//! are only interpreted by the reranker. A field that a document does not
//! have is recorded as [`FeatureValue::Missing`], never dropped, so payload
//! slots always line up with the requested field names.
//!
//! ```
//! use rankwise::rank::FeatureValue;
//!
//! let value = FeatureValue::Text("0.25".to_string());
//! assert_eq!(value.as_f32(), Some(0.25));
//! assert!(FeatureValue::Missing.is_missing());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents one feature value attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// The field is absent for this document.
    Missing,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Multi-valued field
    List(Vec<FeatureValue>),
}

impl FeatureValue {
    /// Whether this slot is the explicit empty marker.
    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }

    /// Get the text content if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Interpret the value as a score.
    ///
    /// Numbers convert directly, text is parsed, a single-element list
    /// delegates to its element. Everything else yields `None`.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            FeatureValue::Integer(value) => Some(*value as f32),
            FeatureValue::Float(value) => Some(*value as f32),
            FeatureValue::Text(text) => text.trim().parse::<f32>().ok(),
            FeatureValue::List(values) if values.len() == 1 => values[0].as_f32(),
            _ => None,
        }
    }

    /// Render the value as the text sent to an external scorer.
    pub fn to_feature_text(&self) -> String {
        match self {
            FeatureValue::Missing => String::new(),
            FeatureValue::Text(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Missing => write!(f, "null"),
            FeatureValue::Boolean(value) => write!(f, "{value}"),
            FeatureValue::Integer(value) => write!(f, "{value}"),
            FeatureValue::Float(value) => write!(f, "{value}"),
            FeatureValue::Text(text) => write!(f, "{text}"),
            FeatureValue::List(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Text(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Float(value)
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        FeatureValue::Integer(value)
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        FeatureValue::Boolean(value)
    }
}
