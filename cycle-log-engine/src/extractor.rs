//! Event extraction
//!
//! Attributes a timestamped line to at most one stage of the event sequence and
//! captures the fields whose patterns match.

use crate::config::{CompiledConfig, StageSpec};
use crate::types::{Event, Timestamp};
use std::collections::BTreeMap;
use std::path::Path;

/// Matches lines against the configured stages
#[derive(Debug, Clone)]
pub struct EventExtractor {
    stages: Vec<StageSpec>,
}

impl EventExtractor {
    pub fn new(config: &CompiledConfig) -> Self {
        Self {
            stages: config.stages().to_vec(),
        }
    }

    /// Extract an event from a line whose timestamp is already known
    ///
    /// Stages are tried in sequence order; the first stage with at least one
    /// matching field pattern wins. Fields that do not match are left out of
    /// the event.
    pub fn extract(&self, line: &str, timestamp: Timestamp, source: &Path) -> Option<Event> {
        for stage in &self.stages {
            let fields = match_fields(stage, line);
            if !fields.is_empty() {
                return Some(Event {
                    timestamp,
                    source_file: source.to_path_buf(),
                    event_type: stage.name.clone(),
                    fields,
                });
            }
        }
        None
    }
}

fn match_fields(stage: &StageSpec, line: &str) -> BTreeMap<String, String> {
    stage
        .fields
        .iter()
        .filter_map(|field| {
            let value = field.regex.captures(line)?.get(1)?;
            Some((field.name.clone(), value.as_str().trim().to_string()))
        })
        .collect()
}
