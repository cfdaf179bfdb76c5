//! # Inspection
//!
//! One-shot walk of a target process:
//!
//! 1. probe loaded runtime DLLs for CLR versions
//! 2. add a placeholder root per pre-4.0 version (the v2.0 one becomes the
//!    container for legacy module records)
//! 3. run the legacy session if v2.0 is present, then the ID-based session
//!    if v4 or later is present
//!
//! The first session failure ends the inspection; the nodes gathered so
//! far stay in the store and the error is carried in [`Inspection::error`]
//! for the presenter to show instead of the tree.

use clrtree_common::ClrVersions;
use crossbeam_channel::Sender;
use log::{info, warn};

use crate::domain::{Pid, ProbeError, ProtocolGeneration, TraceError};
use crate::events::EventRecord;
use crate::probe::{probe_process, ModuleSource};
use crate::processor::{ProcessorStats, Progress, RundownProcessor};
use crate::session::{CancelToken, SessionSummary, TraceBackend, TraceSessionController};
use crate::tree::NodeStore;

/// Display names of the placeholder runtimes
pub const CLR_V1_0_PLACEHOLDER: &str = "CLR v1.0.3705";
pub const CLR_V1_1_PLACEHOLDER: &str = "CLR v1.1.4322";
pub const CLR_V2_0_PLACEHOLDER: &str = "CLR v2.0.50727";

/// Everything an inspection produced
#[derive(Debug)]
pub struct Inspection {
    pub pid: Pid,
    pub versions: ClrVersions,
    pub store: NodeStore,
    pub sessions: Vec<SessionSummary>,
    pub stats: ProcessorStats,
    /// Session failure; when set the tree should not be shown
    pub error: Option<TraceError>,
}

impl Inspection {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Inspector<B, S> {
    controller: TraceSessionController<B>,
    modules: S,
    cancel: CancelToken,
    progress_tx: Option<Sender<Progress>>,
}

impl<B: TraceBackend, S: ModuleSource> Inspector<B, S> {
    pub fn new(controller: TraceSessionController<B>, modules: S) -> Self {
        Self { controller, modules, cancel: CancelToken::new(), progress_tx: None }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress_tx: Sender<Progress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    #[must_use]
    pub fn controller(&self) -> &TraceSessionController<B> {
        &self.controller
    }

    /// Inspect `pid`
    ///
    /// # Errors
    /// Only module enumeration failures are returned as errors. Session
    /// failures end up in [`Inspection::error`].
    pub fn run(&mut self, pid: Pid) -> Result<Inspection, ProbeError> {
        let versions = probe_process(&self.modules, pid)?;
        let mut store = NodeStore::new();
        add_placeholders(&mut store, versions);

        let mut generations = Vec::new();
        if versions.contains(ClrVersions::V2_0) {
            generations.push(ProtocolGeneration::Legacy);
        }
        if versions.contains(ClrVersions::V4_ABOVE) {
            generations.push(ProtocolGeneration::IdBased);
        }
        if generations.is_empty() {
            info!("{pid}: no traceable CLR loaded");
        }

        let mut sessions = Vec::new();
        let mut error = None;
        let mut processor =
            RundownProcessor::new(pid, &mut store, self.cancel.clone(), self.progress_tx.clone());

        for generation in generations {
            if self.cancel.is_cancelled() {
                info!("Inspection cancelled before {generation} session");
                break;
            }
            notify(self.progress_tx.as_ref(), Progress::SessionStarted(generation));
            processor.begin_session(generation);

            let mut sink = |record: &EventRecord<'_>| processor.process_event(record);
            match self.controller.run(generation, &mut sink) {
                Ok(summary) => {
                    notify(self.progress_tx.as_ref(), Progress::SessionFinished(summary));
                    sessions.push(summary);
                }
                Err(e) => {
                    warn!("{generation} session failed: {e}");
                    error = Some(e);
                    break;
                }
            }
        }

        let stats = processor.stats;
        drop(processor);

        Ok(Inspection { pid, versions, store, sessions, stats, error })
    }
}

/// Add one synthetic root per detected pre-4.0 version
pub fn add_placeholders(store: &mut NodeStore, versions: ClrVersions) {
    if versions.contains(ClrVersions::V1_0) {
        store.add_synthetic_runtime(CLR_V1_0_PLACEHOLDER);
    }
    if versions.contains(ClrVersions::V1_1) {
        store.add_synthetic_runtime(CLR_V1_1_PLACEHOLDER);
    }
    if versions.contains(ClrVersions::V2_0) {
        let container = store.add_synthetic_runtime(CLR_V2_0_PLACEHOLDER);
        store.set_legacy_container(container);
    }
}

fn notify(tx: Option<&Sender<Progress>>, progress: Progress) {
    if let Some(tx) = tx {
        let _ = tx.try_send(progress);
    }
}
