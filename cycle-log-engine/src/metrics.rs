//! Run counters
//!
//! One `RunMetrics` value lives for a single run and is passed by `&mut`
//! through each stage of the pipeline.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunMetrics {
    /// Files read to the end without error
    pub files_processed: u64,
    /// Files skipped because they could not be read
    pub files_failed: u64,
    pub events_parsed: u64,
    /// Cycles whose record passed validation
    pub cycles_completed: u64,
    /// Cycles dropped while building or validating their record
    pub cycle_errors: u64,
    /// Events that arrived out of the expected stage order
    pub order_anomalies: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another set of counters into this one
    pub fn merge(&mut self, other: &RunMetrics) {
        self.files_processed += other.files_processed;
        self.files_failed += other.files_failed;
        self.events_parsed += other.events_parsed;
        self.cycles_completed += other.cycles_completed;
        self.cycle_errors += other.cycle_errors;
        self.order_anomalies += other.order_anomalies;
    }
}
