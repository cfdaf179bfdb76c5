//! # Rundown Processing
//!
//! Sink side of a trace session. Each record goes through:
//!
//! 1. cancellation check
//! 2. provider filter (a reused session may still have the other
//!    generation's provider enabled)
//! 3. process filter (rundown-complete of the ID protocol always passes)
//! 4. [`decode`] into a [`ClrEvent`](crate::events::ClrEvent)
//! 5. [`TreeBuilder::apply`]
//!
//! and the outcome is tallied in [`ProcessorStats`]. A completion marker
//! stops the pump.

use clrtree_common::DC_START_COMPLETE_V1;
use crossbeam_channel::Sender;
use log::debug;

use crate::domain::{Pid, ProtocolGeneration};
use crate::events::{decode, EventRecord};
use crate::session::{CancelToken, PumpControl, SessionSummary};
use crate::tree::{ApplyOutcome, NodeStore, TreeBuilder};

/// Notification for an observer of a running inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    SessionStarted(ProtocolGeneration),
    /// A node was added; carries its structure text
    NodeCreated(String),
    SessionFinished(SessionSummary),
}

/// Per-record counters, summed over every session of an inspection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Records seen
    pub events: usize,
    /// Records from other processes
    pub foreign: usize,
    /// Records from a provider the current session did not ask for
    pub other_provider: usize,
    /// Records with IDs or opcodes that are not rundown starts
    pub irrelevant: usize,
    /// Records whose payload failed to decode
    pub malformed: usize,
    pub created: usize,
    pub annotated: usize,
    pub duplicates: usize,
    /// Lookup misses, and legacy modules with no v2 container
    pub orphans: usize,
    /// Completion markers seen
    pub completed: usize,
}

pub struct RundownProcessor<'a> {
    target: Pid,
    generation: Option<ProtocolGeneration>,
    store: &'a mut NodeStore,
    cancel: CancelToken,
    progress_tx: Option<Sender<Progress>>,

    pub stats: ProcessorStats,
}

impl<'a> RundownProcessor<'a> {
    pub fn new(
        target: Pid,
        store: &'a mut NodeStore,
        cancel: CancelToken,
        progress_tx: Option<Sender<Progress>>,
    ) -> Self {
        Self {
            target,
            generation: None,
            store,
            cancel,
            progress_tx,
            stats: ProcessorStats::default(),
        }
    }

    /// Only accept records from `generation`'s provider from now on
    pub fn begin_session(&mut self, generation: ProtocolGeneration) {
        self.generation = Some(generation);
    }

    /// Handle one record and tell the pump whether to keep going
    pub fn process_event(&mut self, record: &EventRecord<'_>) -> PumpControl {
        if self.cancel.is_cancelled() {
            return PumpControl::Stop;
        }
        self.stats.events += 1;

        if self.generation.is_some_and(|generation| record.provider != generation.provider()) {
            self.stats.other_provider += 1;
            return PumpControl::Continue;
        }

        if record.process_id != self.target.0 && record.id != DC_START_COMPLETE_V1 {
            self.stats.foreign += 1;
            return PumpControl::Continue;
        }

        let event = match decode(record) {
            Ok(Some(event)) => event,
            Ok(None) => {
                self.stats.irrelevant += 1;
                return PumpControl::Continue;
            }
            Err(e) => {
                debug!("Skipping event {} (opcode {}): {e}", record.id, record.opcode);
                self.stats.malformed += 1;
                return PumpControl::Continue;
            }
        };

        let name = event.name();
        let outcome = TreeBuilder::new(self.store).apply(event);
        match outcome {
            ApplyOutcome::Created(id) => {
                self.stats.created += 1;
                self.notify(Progress::NodeCreated(self.store.node(id).structure_text.clone()));
            }
            ApplyOutcome::Annotated(_) => self.stats.annotated += 1,
            ApplyOutcome::Duplicate => {
                debug!("Duplicate {name} dropped");
                self.stats.duplicates += 1;
            }
            ApplyOutcome::Orphan | ApplyOutcome::Ignored => {
                debug!("{name} has no parent in the tree, dropped");
                self.stats.orphans += 1;
            }
            ApplyOutcome::Complete(generation) => {
                debug!("{generation} rundown complete");
                self.stats.completed += 1;
                return PumpControl::Stop;
            }
        }
        PumpControl::Continue
    }

    fn notify(&self, progress: Progress) {
        if let Some(tx) = &self.progress_tx {
            // A full or closed channel must not stall the pump
            let _ = tx.try_send(progress);
        }
    }
}
