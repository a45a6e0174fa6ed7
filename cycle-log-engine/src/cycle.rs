//! Cycle grouping state machine
//!
//! Consumes events in ascending timestamp order and groups them into cycles
//! following the configured stage sequence. The machine never looks ahead: a
//! first-stage event always starts a new cycle, an event for the expected next
//! stage advances it, and anything else discards the cycle in progress.

use crate::config::CompiledConfig;
use crate::metrics::RunMetrics;
use crate::types::Event;
use std::collections::BTreeSet;
use std::mem;
use std::path::PathBuf;

/// Contents of one stage within a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum StageSlot {
    Single(Option<Event>),
    Repeating(Vec<Event>),
}

/// A cycle being assembled (or just completed) by the state machine
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    slots: Vec<(String, StageSlot)>,
    source_files: BTreeSet<PathBuf>,
}

impl Cycle {
    /// Empty cycle: every stage unset, the last stage an empty list
    pub fn new(config: &CompiledConfig) -> Self {
        let last = config.sequence_len() - 1;
        let slots = config
            .stages()
            .iter()
            .enumerate()
            .map(|(i, stage)| {
                let slot = if i == last {
                    StageSlot::Repeating(Vec::new())
                } else {
                    StageSlot::Single(None)
                };
                (stage.name.clone(), slot)
            })
            .collect();
        Self {
            slots,
            source_files: BTreeSet::new(),
        }
    }

    /// The event recorded for a non-repeating stage
    pub fn single(&self, stage: &str) -> Option<&Event> {
        self.slots.iter().find_map(|(name, slot)| match slot {
            StageSlot::Single(event) if name == stage => event.as_ref(),
            _ => None,
        })
    }

    /// Events of the repeating stage, in arrival order
    pub fn repeating(&self) -> &[Event] {
        match self.slots.last() {
            Some((_, StageSlot::Repeating(events))) => events,
            _ => &[],
        }
    }

    /// Files that contributed at least one event, sorted
    pub fn source_files(&self) -> &BTreeSet<PathBuf> {
        &self.source_files
    }

    /// Store `event` in the slot at `index` and note its file
    pub(crate) fn record(&mut self, index: usize, event: Event) {
        self.source_files.insert(event.source_file.clone());
        match &mut self.slots[index].1 {
            StageSlot::Single(slot) => *slot = Some(event),
            StageSlot::Repeating(events) => events.push(event),
        }
    }
}

/// Groups a chronological event stream into cycles
pub struct CycleStateMachine<'a> {
    config: &'a CompiledConfig,
    /// Index of the next expected stage; `sequence_len()` once complete
    state: usize,
    cycle: Cycle,
}

impl<'a> CycleStateMachine<'a> {
    pub fn new(config: &'a CompiledConfig) -> Self {
        Self {
            config,
            state: 0,
            cycle: Cycle::new(config),
        }
    }

    /// Current stage index
    pub fn state(&self) -> usize {
        self.state
    }

    fn is_complete(&self) -> bool {
        self.state == self.config.sequence_len()
    }

    /// Feed the next event; returns the previous cycle if this event closed it
    pub fn feed(&mut self, event: Event, metrics: &mut RunMetrics) -> Option<Cycle> {
        let Some(index) = self.config.stage_index(&event.event_type) else {
            log::debug!("Unknown event type: {}", event.event_type);
            return None;
        };

        if index == 0 {
            let complete = self.is_complete();
            let previous = mem::replace(&mut self.cycle, Cycle::new(self.config));
            self.cycle.record(0, event);
            self.state = 1;
            complete.then_some(previous)
        } else if index == self.state {
            self.cycle.record(index, event);
            self.state += 1;
            None
        } else {
            log::warn!(
                "Unexpected event order: {} at state {} ({})",
                event.event_type,
                self.state,
                event.timestamp
            );
            metrics.order_anomalies += 1;
            self.state = 0;
            self.cycle = Cycle::new(self.config);
            None
        }
    }

    /// End of input: returns the last cycle if it completed
    pub fn finish(self) -> Option<Cycle> {
        if self.is_complete() {
            Some(self.cycle)
        } else {
            if self.state > 0 {
                log::debug!("Discarding incomplete cycle at state {}", self.state);
            }
            None
        }
    }
}

/// Run the state machine over an already sorted event list
pub fn group_cycles(config: &CompiledConfig, events: Vec<Event>, metrics: &mut RunMetrics) -> Vec<Cycle> {
    let mut machine = CycleStateMachine::new(config);
    let mut cycles: Vec<Cycle> = events
        .into_iter()
        .filter_map(|event| machine.feed(event, metrics))
        .collect();
    cycles.extend(machine.finish());
    cycles
}
