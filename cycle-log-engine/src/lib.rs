//! Cycle Log Engine Library
//!
//! Extracts timestamped events from free-text instrument logs and groups them
//! into cycles following a configured stage sequence.
//!
//! # Architecture
//!
//! The engine is a single pass over a chronologically ordered event list:
//! - Parses the bracketed timestamp of each line with fallback formats
//! - Attributes each line to at most one stage and captures its fields
//! - Groups events into cycles with an ordered state machine
//! - Aggregates each completed cycle into a flat, validated record
//!
//! The library does NOT:
//! - Discover or rename log files
//! - Write CSV output
//! - Configure logging
//!
//! All of that lives in the application layer (cycle-log-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use cycle_log_engine::{EngineConfig, Processor, ReadMode, RunMetrics};
//! use std::path::PathBuf;
//!
//! let config = EngineConfig::new()
//!     .add_stage("init", [("Step", r"Step=(\d+)")])
//!     .add_stage("execute", [("Value", r"Value=(\d+)")])
//!     .with_technique_stage("init");
//!
//! let mut processor = Processor::from_config(&config).unwrap();
//! let mut metrics = RunMetrics::new();
//! let records = processor.run(&[PathBuf::from("logs/run1.log")], ReadMode::Sequential, &mut metrics);
//!
//! for record in &records {
//!     println!("{:?}", record.get("AvgValue"));
//! }
//! ```

// Public modules
pub mod aggregator;
pub mod config;
pub mod cycle;
pub mod extractor;
pub mod metrics;
pub mod processor;
pub mod source;
pub mod timestamp;
pub mod types;

// Re-export main types for convenience
pub use aggregator::{BuildError, CycleAggregator};
pub use config::{CompiledConfig, ConfigError, EngineConfig};
pub use cycle::{Cycle, CycleStateMachine};
pub use extractor::EventExtractor;
pub use metrics::RunMetrics;
pub use processor::{Processor, ReadMode};
pub use source::{EncodingCache, LogSource};
pub use timestamp::TimestampParser;
pub use types::{EngineError, Event, FieldValue, Record, Result, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: a minimal sequence compiles into a processor
        let config = EngineConfig::new()
            .add_stage("init", [("Step", r"Step=(\d+)")])
            .compile()
            .unwrap();
        let processor = Processor::new(config);
        assert!(processor.events().is_empty());
        assert_eq!(processor.config().sequence_len(), 1);
    }
}
