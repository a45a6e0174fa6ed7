//! Cycle aggregation
//!
//! Turns a completed cycle into a flat output record: designated stage fields
//! are copied, repeating-stage measurements are averaged, and the sample count
//! and elapsed time of the repeating stage are added.

use crate::config::{CompiledConfig, StageSpec};
use crate::cycle::Cycle;
use crate::metrics::RunMetrics;
use crate::types::{FieldValue, Record};

/// Placeholder for values a cycle could not provide
pub const NOT_AVAILABLE: &str = "NA";

/// `StartTime` rendering
pub const START_TIME_FORMAT: &str = "%y/%m/%d %H:%M:%S";

/// Reasons a built record is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("record has no StartTime")]
    MissingStartTime,

    #[error("record has no frame count")]
    MissingFrames,

    #[error("field {0} is NaN")]
    NotANumber(String),
}

/// Builds and validates records from completed cycles
#[derive(Debug, Clone)]
pub struct CycleAggregator {
    technique_stage: String,
    /// Designated stages present in the sequence, in copy order
    copied_stages: Vec<StageSpec>,
    repeating_fields: Vec<String>,
}

impl CycleAggregator {
    pub fn new(config: &CompiledConfig) -> Self {
        let copied_stages = [config.query_stage(), config.technique_stage()]
            .into_iter()
            .filter_map(|name| config.stage(name).cloned())
            .collect();
        Self {
            technique_stage: config.technique_stage().to_string(),
            copied_stages,
            repeating_fields: config.repeating_stage().field_names().map(String::from).collect(),
        }
    }

    /// Build the record for a cycle without validating it
    pub fn build(&self, cycle: &Cycle) -> Record {
        let mut record = Record::new();

        let mut files: Vec<String> = cycle
            .source_files()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        files.sort();
        record.insert("SourceFiles", files.join("+"));

        let start_time = cycle
            .single(&self.technique_stage)
            .map(|event| event.timestamp.format(START_TIME_FORMAT).to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        record.insert("StartTime", start_time);

        // Query first so technique fields win on a name clash
        for stage in &self.copied_stages {
            if let Some(event) = cycle.single(&stage.name) {
                for field in stage.field_names() {
                    record.insert(field, event.field(field).unwrap_or(NOT_AVAILABLE));
                }
            }
        }

        let samples = cycle.repeating();
        for field in &self.repeating_fields {
            let values: Vec<f64> = samples
                .iter()
                .filter_map(|event| event.field(field)?.parse::<f64>().ok())
                .collect();
            let average = (!values.is_empty())
                .then(|| round_to(values.iter().sum::<f64>() / values.len() as f64, 2));
            record.insert(format!("Avg{}", field), average);
        }

        record.insert("frames", FieldValue::Integer(samples.len() as u64));

        if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
            let duration = (last.timestamp - first.timestamp)
                .num_microseconds()
                .map(|us| round_to(us as f64 / 1_000_000.0, 3));
            record.insert("Duration(s)", duration);
        }

        record
    }

    /// Check the invariants every saved record must satisfy
    pub fn validate(&self, record: &Record) -> Result<(), BuildError> {
        match record.get("StartTime").and_then(FieldValue::as_str) {
            Some(s) if !s.is_empty() => {}
            _ => return Err(BuildError::MissingStartTime),
        }
        if !matches!(record.get("frames"), Some(FieldValue::Integer(_))) {
            return Err(BuildError::MissingFrames);
        }
        if let Some((name, _)) = record.iter().find(|(_, value)| value.is_nan()) {
            return Err(BuildError::NotANumber(name.to_string()));
        }
        Ok(())
    }

    /// Build and validate; rejected cycles are counted and dropped
    pub fn finalize(&self, cycle: &Cycle, metrics: &mut RunMetrics) -> Option<Record> {
        let record = self.build(cycle);
        match self.validate(&record) {
            Ok(()) => {
                metrics.cycles_completed += 1;
                Some(record)
            }
            Err(e) => {
                log::error!("Error finalizing cycle: {}", e);
                metrics.cycle_errors += 1;
                None
            }
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::types::{Event, Timestamp};
    use chrono::{Duration, NaiveDate};
    use std::path::PathBuf;

    fn config() -> CompiledConfig {
        EngineConfig::new()
            .add_stage("technique", [("Method", r"Method=(\w+)"), ("Mode", r"Mode=(\w+)")])
            .add_stage("query", [("Sample", r"Sample=(\w+)")])
            .add_stage("timing", [("Value", r"Value=(\S+)")])
            .compile()
            .unwrap()
    }

    fn at(ms: i64) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 7, 9).unwrap().and_hms_opt(8, 30, 0).unwrap()
            + Duration::milliseconds(ms)
    }

    fn event(kind: &str, ms: i64, file: &str, fields: &[(&str, &str)]) -> Event {
        Event {
            timestamp: at(ms),
            source_file: PathBuf::from(file),
            event_type: kind.to_string(),
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    fn cycle(config: &CompiledConfig, timing: &[(i64, &str)]) -> Cycle {
        let mut cycle = Cycle::new(config);
        cycle.record(0, event("technique", 0, "b.log", &[("Method", "scan")]));
        cycle.record(1, event("query", 10, "a.log", &[("Sample", "S1")]));
        for (ms, value) in timing {
            cycle.record(2, event("timing", *ms, "a.log", &[("Value", value)]));
        }
        cycle
    }

    #[test]
    fn test_average_and_frames() {
        let config = config();
        let aggregator = CycleAggregator::new(&config);
        let record = aggregator.build(&cycle(&config, &[(100, "100"), (1600, "200")]));

        assert_eq!(record.get("AvgValue"), Some(&FieldValue::Number(150.0)));
        assert_eq!(record.get("frames"), Some(&FieldValue::Integer(2)));
        assert_eq!(record.get("Duration(s)"), Some(&FieldValue::Number(1.5)));
        assert_eq!(record.get("SourceFiles"), Some(&FieldValue::from("a.log+b.log")));
        assert_eq!(record.get("StartTime"), Some(&FieldValue::from("25/07/09 08:30:00")));
    }

    #[test]
    fn test_designated_fields_copied_with_na() {
        let config = config();
        let record = CycleAggregator::new(&config).build(&cycle(&config, &[(100, "1")]));
        assert_eq!(record.get("Method"), Some(&FieldValue::from("scan")));
        assert_eq!(record.get("Mode"), Some(&FieldValue::from("NA")));
        assert_eq!(record.get("Sample"), Some(&FieldValue::from("S1")));
        assert_eq!(record.get("Duration(s)"), Some(&FieldValue::Number(0.0)));
    }

    #[test]
    fn test_technique_wins_field_clash() {
        let config = EngineConfig::new()
            .add_stage("technique", [("Mode", r"Mode=(\w+)")])
            .add_stage("query", [("Mode", r"mode:(\w+)"), ("Sample", r"Sample=(\w+)")])
            .add_stage("timing", [("Value", r"Value=(\S+)")])
            .compile()
            .unwrap();
        let mut cycle = Cycle::new(&config);
        cycle.record(0, event("technique", 0, "a.log", &[("Mode", "fast")]));
        cycle.record(1, event("query", 10, "a.log", &[("Mode", "slow"), ("Sample", "S1")]));
        cycle.record(2, event("timing", 20, "a.log", &[("Value", "1")]));

        let record = CycleAggregator::new(&config).build(&cycle);
        assert_eq!(record.get("Mode"), Some(&FieldValue::from("fast")));
        assert_eq!(record.get("Sample"), Some(&FieldValue::from("S1")));
    }

    #[test]
    fn test_missing_designated_stage_leaves_fields_absent() {
        let config = config();
        let mut cycle = Cycle::new(&config);
        cycle.record(0, event("technique", 0, "a.log", &[("Method", "scan")]));
        cycle.record(2, event("timing", 20, "a.log", &[("Value", "1")]));

        let record = CycleAggregator::new(&config).build(&cycle);
        assert_eq!(record.get("Method"), Some(&FieldValue::from("scan")));
        assert_eq!(record.get("Sample"), None);
    }

    #[test]
    fn test_unparseable_values_skipped() {
        let config = config();
        let record = CycleAggregator::new(&config)
            .build(&cycle(&config, &[(100, "1.234"), (200, "n/a"), (300, "2.0")]));
        assert_eq!(record.get("AvgValue"), Some(&FieldValue::Number(1.62)));
        assert_eq!(record.get("frames"), Some(&FieldValue::Integer(3)));
    }

    #[test]
    fn test_absent_field_not_averaged_as_zero() {
        let config = config();
        let mut cycle = cycle(&config, &[(100, "4")]);
        cycle.record(2, event("timing", 200, "a.log", &[]));
        let record = CycleAggregator::new(&config).build(&cycle);
        assert_eq!(record.get("AvgValue"), Some(&FieldValue::Number(4.0)));
        assert_eq!(record.get("frames"), Some(&FieldValue::Integer(2)));
    }

    #[test]
    fn test_all_values_unusable() {
        let config = config();
        let record = CycleAggregator::new(&config).build(&cycle(&config, &[(100, "x")]));
        assert_eq!(record.get("AvgValue"), Some(&FieldValue::Missing));
    }

    #[test]
    fn test_empty_repeating_stage() {
        let config = EngineConfig::new()
            .add_stage("init", [("Step", r"Step=(\d+)")])
            .add_stage("execute", [("Value", r"Value=(\d+)")])
            .compile()
            .unwrap();
        let empty = Cycle::new(&config);
        let mut metrics = RunMetrics::new();
        let aggregator = CycleAggregator::new(&config);
        let record = aggregator.build(&empty);

        assert_eq!(record.get("frames"), Some(&FieldValue::Integer(0)));
        assert_eq!(record.get("AvgValue"), Some(&FieldValue::Missing));
        assert_eq!(record.get("Duration(s)"), None);
        assert_eq!(record.get("StartTime"), Some(&FieldValue::from("NA")));
        assert_eq!(record.get("SourceFiles"), Some(&FieldValue::from("")));
        assert!(aggregator.finalize(&empty, &mut metrics).is_some());
        assert_eq!(metrics.cycles_completed, 1);
    }

    #[test]
    fn test_nan_rejected() {
        let config = config();
        let aggregator = CycleAggregator::new(&config);
        let mut metrics = RunMetrics::new();
        let nan_cycle = cycle(&config, &[(100, "NaN")]);

        assert_eq!(
            aggregator.validate(&aggregator.build(&nan_cycle)),
            Err(BuildError::NotANumber("AvgValue".to_string()))
        );
        assert!(aggregator.finalize(&nan_cycle, &mut metrics).is_none());
        assert_eq!(metrics.cycle_errors, 1);
        assert_eq!(metrics.cycles_completed, 0);
    }

    #[test]
    fn test_validate_requires_start_time() {
        let aggregator = CycleAggregator::new(&config());
        let mut record = Record::new();
        record.insert("frames", FieldValue::Integer(1));
        assert_eq!(aggregator.validate(&record), Err(BuildError::MissingStartTime));

        record.insert("StartTime", "");
        assert_eq!(aggregator.validate(&record), Err(BuildError::MissingStartTime));

        record.insert("StartTime", "25/07/09 00:00:00");
        assert_eq!(aggregator.validate(&record), Ok(()));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.005_1, 2), 1.01);
        assert_eq!(round_to(0.123_456, 3), 0.123);
    }
}
