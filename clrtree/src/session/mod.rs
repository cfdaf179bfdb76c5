//! # Trace Session Controller
//!
//! Drives one real-time tracing session per runtime generation:
//!
//! ```text
//! available? ─no──▶ TraceError::Unsupported
//!     │
//! start "PhDnLogger" ──already exists──▶ query + reuse handle
//!     │
//! enable provider (level 4, LOADER | START_ENUMERATION)
//!     │
//! pump records into the sink until it says Stop or the stream ends
//!     │
//! stop session (best effort)
//! ```
//!
//! The OS facing calls sit behind [`TraceBackend`] so the controller can be
//! exercised with a scripted backend. [`NativeBackend`] is ETW on Windows and
//! [`UnsupportedBackend`] everywhere else.

#[cfg(windows)]
pub mod etw;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clrtree_common::{Guid, CLR_RUNDOWN_KEYWORDS, LOGGER_NAME, TRACE_LEVEL_INFORMATION};
use log::{debug, info, warn};

use crate::domain::{ProtocolGeneration, TraceError};
use crate::events::EventRecord;

#[cfg(windows)]
pub type NativeBackend = etw::EtwBackend;

#[cfg(not(windows))]
pub type NativeBackend = UnsupportedBackend;

/// Controller handle of a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle(pub u64);

/// Result of asking the OS to start a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStart {
    Started(SessionHandle),
    /// A session with the same name is already running
    AlreadyExists,
}

/// Sink verdict after each record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpControl {
    Continue,
    Stop,
}

/// Why the pump returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The sink returned [`PumpControl::Stop`]
    Stopped,
    /// The stream ran out of records
    Exhausted,
}

pub type RecordSink<'s> = dyn FnMut(&EventRecord<'_>) -> PumpControl + 's;

/// OS tracing facility
pub trait TraceBackend {
    /// Whether the provider enable entry point can be resolved
    fn is_available(&self) -> bool;

    fn start_session(&mut self, name: &str) -> Result<SessionStart, TraceError>;

    /// Handle of an already running session called `name`
    fn query_session(&mut self, name: &str) -> Result<SessionHandle, TraceError>;

    fn enable_provider(
        &mut self,
        session: SessionHandle,
        provider: &Guid,
        level: u8,
        keywords: u64,
    ) -> Result<(), TraceError>;

    /// Deliver records of the real-time session `name` to `sink`, in stream
    /// order, until the sink stops the pump or the stream ends. Blocks the
    /// calling thread.
    fn process(&mut self, name: &str, sink: &mut RecordSink<'_>) -> Result<PumpExit, TraceError>;

    fn stop_session(&mut self, session: SessionHandle, name: &str) -> Result<(), TraceError>;
}

/// Session parameters; defaults are the rundown values every CLR understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub logger_name: String,
    pub level: u8,
    pub keywords: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            logger_name: LOGGER_NAME.to_string(),
            level: TRACE_LEVEL_INFORMATION,
            keywords: CLR_RUNDOWN_KEYWORDS,
        }
    }
}

/// What a finished session did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub generation: ProtocolGeneration,
    /// The session already existed and its handle was reused
    pub reused_existing: bool,
    /// Records delivered to the sink
    pub records: usize,
    pub exit: PumpExit,
}

impl SessionSummary {
    /// The sink stopped the pump, on a completion marker or cancellation
    #[must_use]
    pub fn stopped_by_sink(&self) -> bool {
        self.exit == PumpExit::Stopped
    }
}

pub struct TraceSessionController<B> {
    backend: B,
    config: SessionConfig,
}

impl<B: TraceBackend> TraceSessionController<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, SessionConfig::default())
    }

    pub fn with_config(backend: B, config: SessionConfig) -> Self {
        Self { backend, config }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run one session for `generation`, feeding every record to `sink`
    ///
    /// # Errors
    /// [`TraceError::Unsupported`] when tracing is unavailable; otherwise the
    /// first start, enable or pump failure. Enable and pump failures are
    /// returned after the session has been stopped.
    pub fn run(
        &mut self,
        generation: ProtocolGeneration,
        sink: &mut RecordSink<'_>,
    ) -> Result<SessionSummary, TraceError> {
        if !self.backend.is_available() {
            return Err(TraceError::Unsupported);
        }

        let name = self.config.logger_name.clone();
        let (session, reused_existing) = match self.backend.start_session(&name)? {
            SessionStart::Started(handle) => (handle, false),
            SessionStart::AlreadyExists => {
                info!("Session {name} already running, reusing it");
                (self.backend.query_session(&name)?, true)
            }
        };

        let provider = generation.provider();
        debug!("Enabling provider {provider} for {generation} rundown");

        let mut records = 0usize;
        let pumped = self
            .backend
            .enable_provider(session, &provider, self.config.level, self.config.keywords)
            .and_then(|()| {
                self.backend.process(&name, &mut |record| {
                    records += 1;
                    sink(record)
                })
            });

        if let Err(e) = self.backend.stop_session(session, &name) {
            warn!("Failed to stop session {name}: {e}");
        }

        let exit = pumped?;
        info!("{generation} rundown finished: {records} records ({exit:?})");

        Ok(SessionSummary { generation, reused_existing, records, exit })
    }
}

/// Shared stop flag checked by the sink once per record
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Stop the running session called `name` through its name alone
///
/// A pump blocked on a session that delivers nothing only returns once the
/// session itself is stopped, and the thread that owns it cannot do that.
///
/// # Errors
/// Returns the backend's error if the session cannot be found or stopped.
pub fn stop_session_by_name<B: TraceBackend + ?Sized>(
    backend: &mut B,
    name: &str,
) -> Result<(), TraceError> {
    let session = backend.query_session(name)?;
    backend.stop_session(session, name)
}

/// Backend for targets without ETW
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

impl TraceBackend for UnsupportedBackend {
    fn is_available(&self) -> bool {
        false
    }

    fn start_session(&mut self, _name: &str) -> Result<SessionStart, TraceError> {
        Err(TraceError::Unsupported)
    }

    fn query_session(&mut self, _name: &str) -> Result<SessionHandle, TraceError> {
        Err(TraceError::Unsupported)
    }

    fn enable_provider(
        &mut self,
        _session: SessionHandle,
        _provider: &Guid,
        _level: u8,
        _keywords: u64,
    ) -> Result<(), TraceError> {
        Err(TraceError::Unsupported)
    }

    fn process(&mut self, _name: &str, _sink: &mut RecordSink<'_>) -> Result<PumpExit, TraceError> {
        Err(TraceError::Unsupported)
    }

    fn stop_session(&mut self, _session: SessionHandle, _name: &str) -> Result<(), TraceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clrtree_common::{CLR_RUNDOWN_PROVIDER, CLR_RUNTIME_PROVIDER};

    #[derive(Default)]
    struct FakeBackend {
        exists: bool,
        enable_error: Option<TraceError>,
        stop_error: Option<TraceError>,
        records: Vec<(u16, u8)>,
        calls: Vec<String>,
        enabled: Vec<(Guid, u8, u64)>,
    }

    impl TraceBackend for FakeBackend {
        fn is_available(&self) -> bool {
            true
        }

        fn start_session(&mut self, name: &str) -> Result<SessionStart, TraceError> {
            self.calls.push(format!("start {name}"));
            if self.exists {
                Ok(SessionStart::AlreadyExists)
            } else {
                Ok(SessionStart::Started(SessionHandle(1)))
            }
        }

        fn query_session(&mut self, name: &str) -> Result<SessionHandle, TraceError> {
            self.calls.push(format!("query {name}"));
            Ok(SessionHandle(2))
        }

        fn enable_provider(
            &mut self,
            session: SessionHandle,
            provider: &Guid,
            level: u8,
            keywords: u64,
        ) -> Result<(), TraceError> {
            self.calls.push(format!("enable {}", session.0));
            self.enabled.push((*provider, level, keywords));
            self.enable_error.clone().map_or(Ok(()), Err)
        }

        fn process(
            &mut self,
            _name: &str,
            sink: &mut RecordSink<'_>,
        ) -> Result<PumpExit, TraceError> {
            self.calls.push("process".into());
            for &(id, opcode) in &self.records {
                let record = EventRecord {
                    provider: CLR_RUNTIME_PROVIDER,
                    process_id: 1,
                    id,
                    opcode,
                    payload: &[],
                };
                if sink(&record) == PumpControl::Stop {
                    return Ok(PumpExit::Stopped);
                }
            }
            Ok(PumpExit::Exhausted)
        }

        fn stop_session(&mut self, session: SessionHandle, _name: &str) -> Result<(), TraceError> {
            self.calls.push(format!("stop {}", session.0));
            self.stop_error.clone().map_or(Ok(()), Err)
        }
    }

    #[test]
    fn test_unsupported_backend() {
        let mut controller = TraceSessionController::new(UnsupportedBackend);
        let result = controller.run(ProtocolGeneration::IdBased, &mut |_| PumpControl::Continue);
        assert_eq!(result, Err(TraceError::Unsupported));
    }

    #[test]
    fn test_session_lifecycle_order() {
        let backend = FakeBackend { records: vec![(187, 0), (146, 0)], ..Default::default() };
        let mut controller = TraceSessionController::new(backend);

        let summary = controller
            .run(ProtocolGeneration::IdBased, &mut |record| {
                if record.id == 146 {
                    PumpControl::Stop
                } else {
                    PumpControl::Continue
                }
            })
            .unwrap();

        assert_eq!(summary.records, 2);
        assert!(summary.stopped_by_sink());
        assert!(!summary.reused_existing);
        assert_eq!(
            controller.backend().calls,
            vec!["start PhDnLogger", "enable 1", "process", "stop 1"]
        );
        assert_eq!(controller.backend().enabled, vec![(CLR_RUNTIME_PROVIDER, 4, 0x48)]);
    }

    #[test]
    fn test_existing_session_is_reused() {
        let backend = FakeBackend { exists: true, ..Default::default() };
        let mut controller = TraceSessionController::new(backend);

        let summary =
            controller.run(ProtocolGeneration::Legacy, &mut |_| PumpControl::Continue).unwrap();

        assert!(summary.reused_existing);
        assert_eq!(summary.exit, PumpExit::Exhausted);
        assert_eq!(
            controller.backend().calls,
            vec!["start PhDnLogger", "query PhDnLogger", "enable 2", "process", "stop 2"]
        );
        assert_eq!(controller.backend().enabled[0].0, CLR_RUNDOWN_PROVIDER);
    }

    #[test]
    fn test_enable_failure_still_stops_session() {
        let backend = FakeBackend { enable_error: Some(TraceError::AccessDenied), ..Default::default() };
        let mut controller = TraceSessionController::new(backend);

        let result = controller.run(ProtocolGeneration::IdBased, &mut |_| PumpControl::Continue);

        assert_eq!(result, Err(TraceError::AccessDenied));
        assert_eq!(controller.backend().calls, vec!["start PhDnLogger", "enable 1", "stop 1"]);
    }

    #[test]
    fn test_stop_failure_is_not_propagated() {
        let backend = FakeBackend {
            stop_error: Some(TraceError::from_os_code(4201)),
            ..Default::default()
        };
        let mut controller = TraceSessionController::new(backend);
        assert!(controller.run(ProtocolGeneration::IdBased, &mut |_| PumpControl::Continue).is_ok());
    }

    #[test]
    fn test_custom_logger_name() {
        let config = SessionConfig { logger_name: "TestLogger".into(), ..SessionConfig::default() };
        let mut controller = TraceSessionController::with_config(FakeBackend::default(), config);
        controller.run(ProtocolGeneration::IdBased, &mut |_| PumpControl::Continue).unwrap();
        assert_eq!(controller.backend().calls[0], "start TestLogger");
    }

    #[test]
    fn test_stop_session_by_name() {
        let mut backend = FakeBackend::default();
        stop_session_by_name(&mut backend, LOGGER_NAME).unwrap();
        assert_eq!(backend.calls, vec!["query PhDnLogger", "stop 2"]);

        let mut backend = FakeBackend {
            stop_error: Some(TraceError::AccessDenied),
            ..Default::default()
        };
        assert_eq!(stop_session_by_name(&mut backend, LOGGER_NAME), Err(TraceError::AccessDenied));
    }

    #[test]
    fn test_cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
