//! Core types for the cycle log engine
//!
//! This module defines the values that flow through the engine: events extracted
//! from single log lines, and the flat records built from completed cycles.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Timestamp type used throughout the engine
pub type Timestamp = NaiveDateTime;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while reading and processing log files
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to read log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// A single matched occurrence of a stage pattern within one log line
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Timestamp parsed from the bracketed prefix of the line
    pub timestamp: Timestamp,
    /// File the line was read from
    pub source_file: PathBuf,
    /// Name of the stage this line was attributed to
    pub event_type: String,
    /// Only the fields whose pattern matched; values are trimmed
    pub fields: BTreeMap<String, String>,
}

impl Event {
    /// Get a field value by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A value in an output record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(u64),
    Number(f64),
    /// Serialized as an empty cell
    Missing,
}

impl FieldValue {
    pub fn is_nan(&self) -> bool {
        matches!(self, FieldValue::Number(v) if v.is_nan())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(FieldValue::Missing, FieldValue::Number)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Integer(v) => write!(f, "{}", v),
            // Whole numbers keep one decimal so 150.0 is not written as 150
            FieldValue::Number(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            FieldValue::Number(v) => write!(f, "{}", v),
            FieldValue::Missing => Ok(()),
        }
    }
}

/// The flattened, aggregated representation of one completed cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Iterate over all fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render the record as a row following the given column order
    ///
    /// Columns the record does not carry become empty cells; fields not listed
    /// in `columns` are dropped.
    pub fn to_row(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|column| self.fields.get(column).map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Number(150.0).to_string(), "150.0");
        assert_eq!(FieldValue::Number(3.14).to_string(), "3.14");
        assert_eq!(FieldValue::Number(0.0).to_string(), "0.0");
        assert_eq!(FieldValue::Integer(2).to_string(), "2");
        assert_eq!(FieldValue::from("NA").to_string(), "NA");
        assert_eq!(FieldValue::Missing.to_string(), "");
    }

    #[test]
    fn test_record_row_follows_columns() {
        let mut record = Record::new();
        record.insert("Step", "1");
        record.insert("frames", FieldValue::Integer(1));
        record.insert("Unlisted", "dropped");

        let columns = vec!["frames".to_string(), "Missing".to_string(), "Step".to_string()];
        assert_eq!(record.to_row(&columns), vec!["1", "", "1"]);
    }

    #[test]
    fn test_nan_detection() {
        assert!(FieldValue::Number(f64::NAN).is_nan());
        assert!(!FieldValue::Number(1.0).is_nan());
        assert!(!FieldValue::Missing.is_nan());
    }
}
