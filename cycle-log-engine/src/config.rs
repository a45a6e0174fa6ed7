//! Engine configuration types
//!
//! `EngineConfig` is the raw, deserializable form of the options the engine
//! consumes. It is compiled once into a `CompiledConfig`, which resolves the
//! dynamic field mappings into fixed per-stage pattern lists and checks every
//! invariant the extractor and the state machine rely on.

use encoding_rs::Encoding;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Errors found while validating a configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("EVENT_SEQUENCE must contain at least one event type")]
    EmptySequence,

    #[error("Event '{0}' appears more than once in EVENT_SEQUENCE")]
    DuplicateStage(String),

    #[error("Event '{0}' in EVENT_SEQUENCE is not in PATTERN_CONFIG")]
    UnknownStage(String),

    #[error("Event '{0}' declares no field patterns")]
    NoFields(String),

    #[error("Invalid pattern for {stage}.{field}: {message}")]
    InvalidPattern {
        stage: String,
        field: String,
        message: String,
    },

    #[error("Pattern for {stage}.{field} has no capture group")]
    MissingCaptureGroup { stage: String, field: String },

    #[error("Pattern {pattern:?} is declared by both '{first}' and '{second}'")]
    AmbiguousPattern {
        pattern: String,
        first: String,
        second: String,
    },

    #[error("{role} stage '{stage}' cannot be the repeating stage")]
    DesignatedRepeatingStage { role: &'static str, stage: String },

    #[error("TIMESTAMP_FORMATS must not contain empty formats")]
    EmptyTimestampFormat,

    #[error("Unknown encoding label: {0}")]
    UnknownEncoding(String),
}

/// Raw engine options, as they appear in the configuration document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct EngineConfig {
    /// Candidate timestamp formats, tried in order
    #[serde(default = "default_timestamp_formats")]
    pub timestamp_formats: Vec<String>,

    /// Event type name → (output field name → extraction pattern)
    #[serde(default)]
    pub pattern_config: BTreeMap<String, BTreeMap<String, String>>,

    /// Expected stage order of one cycle; the last stage repeats
    #[serde(default)]
    pub event_sequence: Vec<String>,

    /// Stage whose timestamp becomes `StartTime`
    #[serde(default = "default_technique_stage")]
    pub technique_stage: String,

    /// Second stage whose fields are copied into each record
    #[serde(default = "default_query_stage")]
    pub query_stage: String,

    /// Encoding used for files without a BOM that are not valid UTF-8
    #[serde(default = "default_fallback_encoding")]
    pub fallback_encoding: String,
}

fn default_timestamp_formats() -> Vec<String> {
    vec![
        "%Y/%m/%d %H:%M:%S.%f".to_string(),
        "%Y-%m-%d %H:%M:%S.%f".to_string(),
        "%d/%m/%Y %H:%M:%S.%f".to_string(),
    ]
}

fn default_technique_stage() -> String {
    "technique".to_string()
}

fn default_query_stage() -> String {
    "query".to_string()
}

fn default_fallback_encoding() -> String {
    "windows-1252".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timestamp_formats: default_timestamp_formats(),
            pattern_config: BTreeMap::new(),
            event_sequence: Vec::new(),
            technique_stage: default_technique_stage(),
            query_stage: default_query_stage(),
            fallback_encoding: default_fallback_encoding(),
        }
    }
}

impl EngineConfig {
    /// Create an empty configuration with default formats and stage names
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: append a stage to the sequence with its field patterns
    pub fn add_stage<'a, I>(mut self, name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.event_sequence.push(name.to_string());
        self.pattern_config.insert(
            name.to_string(),
            fields
                .into_iter()
                .map(|(field, pattern)| (field.to_string(), pattern.to_string()))
                .collect(),
        );
        self
    }

    /// Builder method: replace the candidate timestamp formats
    pub fn with_timestamp_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method: set the technique stage name
    pub fn with_technique_stage(mut self, stage: impl Into<String>) -> Self {
        self.technique_stage = stage.into();
        self
    }

    /// Builder method: set the query stage name
    pub fn with_query_stage(mut self, stage: impl Into<String>) -> Self {
        self.query_stage = stage.into();
        self
    }

    /// Validate the configuration and resolve it into a `CompiledConfig`
    pub fn compile(&self) -> Result<CompiledConfig, ConfigError> {
        if self.event_sequence.is_empty() {
            return Err(ConfigError::EmptySequence);
        }

        let mut seen = HashSet::new();
        for name in &self.event_sequence {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateStage(name.clone()));
            }
        }

        // pattern text → first stage declaring it
        let mut owners: HashMap<&str, &str> = HashMap::new();
        let mut stages = Vec::with_capacity(self.event_sequence.len());

        for name in &self.event_sequence {
            let patterns = self
                .pattern_config
                .get(name)
                .ok_or_else(|| ConfigError::UnknownStage(name.clone()))?;
            if patterns.is_empty() {
                return Err(ConfigError::NoFields(name.clone()));
            }

            let mut fields = Vec::with_capacity(patterns.len());
            for (field, pattern) in patterns {
                let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    stage: name.clone(),
                    field: field.clone(),
                    message: e.to_string(),
                })?;
                // captures_len counts the implicit whole-match group
                if regex.captures_len() < 2 {
                    return Err(ConfigError::MissingCaptureGroup {
                        stage: name.clone(),
                        field: field.clone(),
                    });
                }
                if let Some(first) = owners.get(pattern.as_str()) {
                    if *first != name.as_str() {
                        return Err(ConfigError::AmbiguousPattern {
                            pattern: pattern.clone(),
                            first: first.to_string(),
                            second: name.clone(),
                        });
                    }
                }
                owners.insert(pattern.as_str(), name.as_str());
                fields.push(FieldPattern {
                    name: field.clone(),
                    regex,
                });
            }
            stages.push(StageSpec {
                name: name.clone(),
                fields,
            });
        }

        for name in self.pattern_config.keys() {
            if !seen.contains(name.as_str()) {
                log::debug!("PATTERN_CONFIG entry '{}' is not part of EVENT_SEQUENCE", name);
            }
        }

        let repeating = &self.event_sequence[self.event_sequence.len() - 1];
        for (role, stage) in [("technique", &self.technique_stage), ("query", &self.query_stage)] {
            if stage == repeating {
                return Err(ConfigError::DesignatedRepeatingStage {
                    role,
                    stage: stage.clone(),
                });
            }
        }

        if self.timestamp_formats.iter().any(|f| f.trim().is_empty()) {
            return Err(ConfigError::EmptyTimestampFormat);
        }
        let timestamp_formats = self
            .timestamp_formats
            .iter()
            .map(|f| normalize_format(f))
            .collect();

        let fallback_encoding = Encoding::for_label(self.fallback_encoding.as_bytes())
            .ok_or_else(|| ConfigError::UnknownEncoding(self.fallback_encoding.clone()))?;

        Ok(CompiledConfig {
            timestamp_formats,
            stages,
            technique_stage: self.technique_stage.clone(),
            query_stage: self.query_stage.clone(),
            fallback_encoding,
        })
    }
}

/// Translate strftime-style fractional seconds into chrono's notation
///
/// `.%f` means "a dot followed by fractional digits" in strftime; chrono spells
/// that `%.f` (its `%f` reads the digits as a nanosecond count instead).
fn normalize_format(format: &str) -> String {
    format.replace(".%f", "%.f")
}

/// One output field of a stage, with its compiled extraction pattern
#[derive(Debug, Clone)]
pub struct FieldPattern {
    pub name: String,
    pub regex: Regex,
}

/// One stage of the event sequence
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub name: String,
    pub fields: Vec<FieldPattern>,
}

impl StageSpec {
    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Validated configuration, immutable for the run
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    timestamp_formats: Vec<String>,
    stages: Vec<StageSpec>,
    technique_stage: String,
    query_stage: String,
    fallback_encoding: &'static Encoding,
}

impl CompiledConfig {
    /// Timestamp formats in chrono notation, in the configured order
    pub fn timestamp_formats(&self) -> &[String] {
        &self.timestamp_formats
    }

    /// Stages in sequence order
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Number of stages in one cycle
    pub fn sequence_len(&self) -> usize {
        self.stages.len()
    }

    /// Position of a stage in the sequence
    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// The last stage, which accumulates events
    pub fn repeating_stage(&self) -> &StageSpec {
        &self.stages[self.stages.len() - 1]
    }

    pub fn technique_stage(&self) -> &str {
        &self.technique_stage
    }

    pub fn query_stage(&self) -> &str {
        &self.query_stage
    }

    pub fn fallback_encoding(&self) -> &'static Encoding {
        self.fallback_encoding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EngineConfig {
        EngineConfig::new()
            .add_stage("init", [("Step", r"Step=(\d+)")])
            .add_stage("execute", [("Value", r"Value=(\d+)")])
    }

    #[test]
    fn test_compile_valid_config() {
        let compiled = sample().compile().unwrap();
        assert_eq!(compiled.sequence_len(), 2);
        assert_eq!(compiled.repeating_stage().name, "execute");
        assert_eq!(compiled.stage_index("init"), Some(0));
        assert_eq!(compiled.stage("execute").unwrap().field_names().collect::<Vec<_>>(), vec!["Value"]);
    }

    #[test]
    fn test_empty_sequence_rejected() {
        assert_eq!(EngineConfig::new().compile().unwrap_err(), ConfigError::EmptySequence);
    }

    #[test]
    fn test_sequence_must_reference_patterns() {
        let mut config = sample();
        config.event_sequence.push("cleanup".to_string());
        assert_eq!(
            config.compile().unwrap_err(),
            ConfigError::UnknownStage("cleanup".to_string())
        );
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let mut config = sample();
        config.event_sequence.push("init".to_string());
        assert_eq!(
            config.compile().unwrap_err(),
            ConfigError::DuplicateStage("init".to_string())
        );
    }

    #[test]
    fn test_pattern_without_group_rejected() {
        let config = EngineConfig::new()
            .add_stage("init", [("Step", r"Step=\d+")])
            .add_stage("execute", [("Value", r"Value=(\d+)")]);
        assert!(matches!(
            config.compile(),
            Err(ConfigError::MissingCaptureGroup { .. })
        ));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let config = EngineConfig::new()
            .add_stage("init", [("Step", r"Step=(\d+")])
            .add_stage("execute", [("Value", r"Value=(\d+)")]);
        assert!(matches!(config.compile(), Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_shared_pattern_rejected() {
        let config = EngineConfig::new()
            .add_stage("init", [("Step", r"Step=(\d+)")])
            .add_stage("execute", [("Again", r"Step=(\d+)")]);
        assert!(matches!(
            config.compile(),
            Err(ConfigError::AmbiguousPattern { .. })
        ));
    }

    #[test]
    fn test_designated_stage_cannot_repeat() {
        let config = sample().with_technique_stage("execute");
        assert!(matches!(
            config.compile(),
            Err(ConfigError::DesignatedRepeatingStage { role: "technique", .. })
        ));
    }

    #[test]
    fn test_query_stage_builder() {
        let compiled = sample().with_query_stage("init").compile().unwrap();
        assert_eq!(compiled.query_stage(), "init");
        assert_eq!(compiled.technique_stage(), "technique");

        assert!(matches!(
            sample().with_query_stage("execute").compile(),
            Err(ConfigError::DesignatedRepeatingStage { role: "query", .. })
        ));
    }

    #[test]
    fn test_format_normalization() {
        assert_eq!(normalize_format("%Y/%m/%d %H:%M:%S.%f"), "%Y/%m/%d %H:%M:%S%.f");
        assert_eq!(normalize_format("%H:%M:%S"), "%H:%M:%S");
    }

    #[test]
    fn test_deserialize_uppercase_keys() {
        let json = r#"{
            "EVENT_SEQUENCE": ["init", "execute"],
            "PATTERN_CONFIG": {
                "init": {"Step": "Step=(\\d+)"},
                "execute": {"Value": "Value=(\\d+)"}
            },
            "TECHNIQUE_STAGE": "init"
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.technique_stage, "init");
        assert_eq!(config.query_stage, "query");
        assert_eq!(config.timestamp_formats.len(), 3);
        assert!(config.compile().is_ok());
    }

    #[test]
    fn test_unknown_fallback_encoding() {
        let mut config = sample();
        config.fallback_encoding = "not-an-encoding".to_string();
        assert_eq!(
            config.compile().unwrap_err(),
            ConfigError::UnknownEncoding("not-an-encoding".to_string())
        );
    }
}
