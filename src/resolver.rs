//! Attribute path resolution
//!
//! Walks a dotted path such as `country.names.en` through a decoded record
//! and renders the leaf as plain text.

use crate::data_section::DataValue;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The record has nothing at the requested path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("attribute path absent")]
pub struct PathAbsent;

/// A validated, non-empty sequence of map keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttributePath {
    segments: Vec<String>,
}

impl AttributePath {
    /// Parse a dotted path like `city.names.en`
    pub fn parse(dotted: &str) -> Result<Self, ConfigError> {
        Self::new(dotted.split('.').map(str::to_string).collect())
    }

    /// Build from explicit segments
    pub fn new(segments: Vec<String>) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidAttributePath {
            path: segments.join("."),
            reason,
        };
        if segments.is_empty() {
            return Err(invalid("path is empty"));
        }
        if segments.iter().any(String::is_empty) {
            return Err(invalid("path has an empty segment"));
        }
        Ok(Self { segments })
    }

    /// Built-in paths known to be well formed
    pub(crate) fn from_trusted(dotted: &str) -> Self {
        Self {
            segments: dotted.split('.').map(str::to_string).collect(),
        }
    }

    /// Path segments, outermost first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for AttributePath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AttributePath {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AttributePath> for String {
    fn from(path: AttributePath) -> Self {
        path.to_string()
    }
}

/// Find the value at `path` inside `record`
///
/// Stops at the first segment whose parent is not a map or lacks the key.
pub fn lookup_value<'a>(
    record: &'a DataValue,
    path: &AttributePath,
) -> Result<&'a DataValue, PathAbsent> {
    path.segments()
        .iter()
        .try_fold(record, |node, key| node.get(key).ok_or(PathAbsent))
}

/// Resolve `path` inside `record` and render the leaf as text
pub fn resolve(record: &DataValue, path: &AttributePath) -> Result<String, PathAbsent> {
    lookup_value(record, path).map(render)
}

/// Render a value as display text
///
/// Numbers in decimal, strings unchanged, booleans as `true`/`false`,
/// bytes as lowercase hex, maps and arrays as compact JSON.
pub fn render(value: &DataValue) -> String {
    match value {
        DataValue::String(s) => s.clone(),
        DataValue::Uint16(n) => n.to_string(),
        DataValue::Uint32(n) => n.to_string(),
        DataValue::Uint64(n) => n.to_string(),
        DataValue::Uint128(n) => n.to_string(),
        DataValue::Int32(n) => n.to_string(),
        DataValue::Double(d) => d.to_string(),
        DataValue::Float(f) => f.to_string(),
        DataValue::Bool(b) => b.to_string(),
        DataValue::Bytes(bytes) => bytes.iter().map(|b| format!("{:02x}", b)).collect(),
        DataValue::Map(_) | DataValue::Array(_) => value.to_json().to_string(),
    }
}
