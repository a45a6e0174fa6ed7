//! Main processing API
//!
//! The `Processor` drives the whole engine: it reads files into a single event
//! list, orders that list chronologically, groups it into cycles and turns the
//! cycles into records.

use crate::aggregator::CycleAggregator;
use crate::config::{CompiledConfig, EngineConfig};
use crate::cycle::group_cycles;
use crate::extractor::EventExtractor;
use crate::metrics::RunMetrics;
use crate::source::{EncodingCache, Lines, LogSource};
use crate::timestamp::TimestampParser;
use crate::types::{Event, Record, Result};
use rayon::prelude::*;
use std::mem;
use std::path::{Path, PathBuf};

/// How the file list is read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// One file at a time, in list order
    #[default]
    Sequential,
    /// Files read concurrently; events are still merged in list order
    Parallel,
}

/// The main processor struct - entry point for a run
pub struct Processor {
    config: CompiledConfig,
    parser: TimestampParser,
    extractor: EventExtractor,
    aggregator: CycleAggregator,
    encodings: EncodingCache,
    events: Vec<Event>,
}

impl Processor {
    pub fn new(config: CompiledConfig) -> Self {
        Self {
            parser: TimestampParser::new(config.timestamp_formats()),
            extractor: EventExtractor::new(&config),
            aggregator: CycleAggregator::new(&config),
            encodings: EncodingCache::new(config.fallback_encoding()),
            events: Vec::new(),
            config,
        }
    }

    /// Compile `config` and build a processor from it
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(config.compile()?))
    }

    pub fn config(&self) -> &CompiledConfig {
        &self.config
    }

    /// Events collected so far, in encounter order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn encodings(&self) -> &EncodingCache {
        &self.encodings
    }

    /// Extract the events of one file and add them to the run
    ///
    /// Returns the number of events found. A file that cannot be read leaves
    /// the metrics untouched and returns the error.
    pub fn ingest_file(&mut self, path: &Path, metrics: &mut RunMetrics) -> Result<usize> {
        let source = LogSource::open(path, &mut self.encodings)?;
        log::debug!("Reading {:?} as {}", path, source.encoding().name());
        let before = self.events.len();
        self.events
            .extend(EventIter::new(source.lines(), path, &self.parser, &self.extractor));
        let found = self.events.len() - before;
        metrics.files_processed += 1;
        metrics.events_parsed += found as u64;
        Ok(found)
    }

    /// Extract the events of every file; unreadable files are skipped
    pub fn ingest_files(&mut self, paths: &[PathBuf], mode: ReadMode, metrics: &mut RunMetrics) {
        match mode {
            ReadMode::Sequential => {
                for path in paths {
                    if let Err(e) = self.ingest_file(path, metrics) {
                        log::error!("Error processing {:?}: {}", path, e);
                        metrics.files_failed += 1;
                    }
                }
            }
            ReadMode::Parallel => self.ingest_parallel(paths, metrics),
        }
    }

    fn ingest_parallel(&mut self, paths: &[PathBuf], metrics: &mut RunMetrics) {
        let parser = &self.parser;
        let extractor = &self.extractor;
        let encodings = &self.encodings;
        let fallback = encodings.fallback();

        // collect() keeps input order, so the merge below is deterministic
        let results: Vec<_> = paths
            .par_iter()
            .map(|path| {
                LogSource::open_with(path, encodings.get(path), fallback).map(|source| {
                    let events: Vec<Event> =
                        EventIter::new(source.lines(), path, parser, extractor).collect();
                    (source.encoding(), events)
                })
            })
            .collect();

        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok((encoding, events)) => {
                    self.encodings.insert(path, encoding);
                    metrics.files_processed += 1;
                    metrics.events_parsed += events.len() as u64;
                    self.events.extend(events);
                }
                Err(e) => {
                    log::error!("Error processing {:?}: {}", path, e);
                    metrics.files_failed += 1;
                }
            }
        }
    }

    /// Group all collected events into cycles and build their records
    ///
    /// Events are stable-sorted by timestamp first, so ties keep their
    /// encounter order. Records come back in cycle completion order.
    pub fn analyze(&mut self, metrics: &mut RunMetrics) -> Vec<Record> {
        let mut events = mem::take(&mut self.events);
        if events.is_empty() {
            log::warn!("No events to analyze.");
            return Vec::new();
        }
        events.sort_by_key(|event| event.timestamp);

        let cycles = group_cycles(&self.config, events, metrics);
        log::debug!("Grouped {} completed cycles", cycles.len());
        cycles
            .iter()
            .filter_map(|cycle| self.aggregator.finalize(cycle, metrics))
            .collect()
    }

    /// Ingest the files and analyze them in one call
    pub fn run(&mut self, paths: &[PathBuf], mode: ReadMode, metrics: &mut RunMetrics) -> Vec<Record> {
        self.ingest_files(paths, mode, metrics);
        self.analyze(metrics)
    }
}

/// Iterator that turns the lines of one file into events
///
/// Lines without a usable timestamp or without a matching stage are skipped.
pub struct EventIter<'a> {
    lines: Lines<'a>,
    path: &'a Path,
    parser: &'a TimestampParser,
    extractor: &'a EventExtractor,
}

impl<'a> EventIter<'a> {
    pub fn new(
        lines: Lines<'a>,
        path: &'a Path,
        parser: &'a TimestampParser,
        extractor: &'a EventExtractor,
    ) -> Self {
        Self {
            lines,
            path,
            parser,
            extractor,
        }
    }
}

impl<'a> Iterator for EventIter<'a> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            let Some(timestamp) = self.parser.parse_line(line.text) else {
                continue;
            };
            match self.extractor.extract(line.text, timestamp, self.path) {
                Some(event) => return Some(event),
                None => log::debug!("No pattern matched: {}", line.text.trim()),
            }
        }
        None
    }
}
