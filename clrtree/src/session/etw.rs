//! ETW implementation of [`TraceBackend`]
//!
//! Thin wrappers over `StartTraceW`/`ControlTraceW`/`EnableTraceEx` and the
//! `OpenTraceW`/`ProcessTrace` consumer loop. The consumer callback forwards
//! each `EVENT_RECORD` to the sink as a borrowed [`EventRecord`] and closes
//! the trace when the sink asks to stop, which makes `ProcessTrace` return.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::mem::{offset_of, size_of};

use clrtree_common::Guid;
use log::{debug, warn};
use windows::core::{s, w, GUID, PCWSTR, PWSTR};
use windows::Win32::Foundation::{
    GetLastError, ERROR_ALREADY_EXISTS, ERROR_CANCELLED, ERROR_SUCCESS, WIN32_ERROR,
};
use windows::Win32::System::Diagnostics::Etw::{
    CloseTrace, ControlTraceW, EnableTraceEx, OpenTraceW, ProcessTrace, StartTraceW,
    CONTROLTRACE_HANDLE, EVENT_RECORD, EVENT_TRACE_CONTROL, EVENT_TRACE_CONTROL_QUERY,
    EVENT_TRACE_CONTROL_STOP, EVENT_TRACE_LOGFILEW, EVENT_TRACE_PROPERTIES,
    EVENT_TRACE_REAL_TIME_MODE, EVENT_TRACE_USE_PAGED_MEMORY, PROCESSTRACE_HANDLE, PROCESS_TRACE_MODE_EVENT_RECORD,
    PROCESS_TRACE_MODE_REAL_TIME, WNODE_FLAG_TRACED_GUID,
};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

use super::{PumpControl, PumpExit, RecordSink, SessionHandle, SessionStart, TraceBackend};
use crate::domain::TraceError;
use crate::events::EventRecord;

/// `INVALID_PROCESSTRACE_HANDLE` on 64-bit Windows
const INVALID_PROCESSTRACE_HANDLE: u64 = u64::MAX;

/// Longest session name ETW accepts, in UTF-16 units
const MAX_LOGGER_NAME: usize = 1024;

/// `EVENT_TRACE_PROPERTIES` followed by the buffer ETW writes the logger
/// name into
#[repr(C)]
struct TraceProperties {
    properties: EVENT_TRACE_PROPERTIES,
    logger_name: [u16; MAX_LOGGER_NAME],
}

impl TraceProperties {
    fn new() -> Box<Self> {
        let mut this = Box::new(Self {
            properties: EVENT_TRACE_PROPERTIES::default(),
            logger_name: [0; MAX_LOGGER_NAME],
        });

        #[allow(clippy::cast_possible_truncation)]
        {
            this.properties.Wnode.BufferSize = size_of::<Self>() as u32;
            this.properties.LoggerNameOffset = offset_of!(Self, logger_name) as u32;
        }
        this.properties.Wnode.Flags = WNODE_FLAG_TRACED_GUID;
        // System time timestamps
        this.properties.Wnode.ClientContext = 2;
        this.properties.LogFileMode = EVENT_TRACE_REAL_TIME_MODE | EVENT_TRACE_USE_PAGED_MEMORY;
        this
    }

    fn as_mut_ptr(&mut self) -> *mut EVENT_TRACE_PROPERTIES {
        std::ptr::addr_of_mut!(self.properties)
    }
}

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn to_windows_guid(guid: &Guid) -> GUID {
    GUID::from_values(guid.data1, guid.data2, guid.data3, guid.data4)
}

fn from_windows_guid(guid: &GUID) -> Guid {
    Guid::new(guid.data1, guid.data2, guid.data3, guid.data4)
}

fn check(status: WIN32_ERROR) -> Result<(), TraceError> {
    if status == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(TraceError::from_os_code(status.0))
    }
}

/// Native ETW backend
#[derive(Debug, Default)]
pub struct EtwBackend;

impl EtwBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn control(&mut self, handle: u64, name: &str, code: EVENT_TRACE_CONTROL) -> Result<u64, TraceError> {
        let name = wide(name);
        let mut properties = TraceProperties::new();

        // SAFETY: `properties` is sized and laid out as ETW expects and
        // `name` is NUL-terminated; both outlive the call.
        let status = unsafe {
            ControlTraceW(
                CONTROLTRACE_HANDLE { Value: handle },
                PCWSTR(name.as_ptr()),
                properties.as_mut_ptr(),
                code,
            )
        };
        check(status)?;

        // SAFETY: HistoricalContext is the variant ETW fills in on return
        Ok(unsafe { properties.properties.Wnode.Anonymous1.HistoricalContext })
    }
}

impl TraceBackend for EtwBackend {
    fn is_available(&self) -> bool {
        // SAFETY: both names are static NUL-terminated literals
        unsafe {
            LoadLibraryW(w!("advapi32.dll"))
                .map(|module| GetProcAddress(module, s!("EnableTraceEx")).is_some())
                .unwrap_or(false)
        }
    }

    fn start_session(&mut self, name: &str) -> Result<SessionStart, TraceError> {
        let wide_name = wide(name);
        let mut properties = TraceProperties::new();
        let mut handle = CONTROLTRACE_HANDLE::default();

        // SAFETY: all pointers refer to live locals for the duration of the call
        let status =
            unsafe { StartTraceW(&mut handle, PCWSTR(wide_name.as_ptr()), properties.as_mut_ptr()) };

        if status == ERROR_ALREADY_EXISTS {
            return Ok(SessionStart::AlreadyExists);
        }
        check(status)?;
        debug!("Started trace session {name} ({:#x})", handle.Value);
        Ok(SessionStart::Started(SessionHandle(handle.Value)))
    }

    fn query_session(&mut self, name: &str) -> Result<SessionHandle, TraceError> {
        self.control(0, name, EVENT_TRACE_CONTROL_QUERY).map(SessionHandle)
    }

    fn enable_provider(
        &mut self,
        session: SessionHandle,
        provider: &Guid,
        level: u8,
        keywords: u64,
    ) -> Result<(), TraceError> {
        let provider = to_windows_guid(provider);

        // SAFETY: `provider` outlives the call; no source id or filter
        let status = unsafe {
            EnableTraceEx(
                &provider,
                None,
                CONTROLTRACE_HANDLE { Value: session.0 },
                1,
                level,
                keywords,
                0,
                0,
                None,
            )
        };
        check(status)
    }

    fn process(&mut self, name: &str, sink: &mut RecordSink<'_>) -> Result<PumpExit, TraceError> {
        let mut logger_name = wide(name);
        let mut context = PumpContext {
            sink,
            trace: PROCESSTRACE_HANDLE { Value: INVALID_PROCESSTRACE_HANDLE },
            stopped: false,
        };

        let mut logfile = EVENT_TRACE_LOGFILEW {
            LoggerName: PWSTR(logger_name.as_mut_ptr()),
            Context: std::ptr::addr_of_mut!(context).cast::<c_void>(),
            ..Default::default()
        };
        logfile.Anonymous1.ProcessTraceMode =
            PROCESS_TRACE_MODE_REAL_TIME | PROCESS_TRACE_MODE_EVENT_RECORD;
        logfile.Anonymous2.EventRecordCallback = Some(on_event_record);

        // SAFETY: `logfile` points at `logger_name` and `context`, both of
        // which live until after ProcessTrace and CloseTrace return.
        let trace = unsafe { OpenTraceW(&mut logfile) };
        if trace.Value == INVALID_PROCESSTRACE_HANDLE {
            // SAFETY: reads the calling thread's last-error value
            return Err(TraceError::from_os_code(unsafe { GetLastError() }.0));
        }
        context.trace = trace;

        // SAFETY: blocks until the stream ends or the callback closes `trace`
        let status = unsafe { ProcessTrace(&[trace], None, None) };

        if !context.stopped {
            // SAFETY: `trace` came from OpenTraceW and has not been closed
            let close = unsafe { CloseTrace(trace) };
            if close != ERROR_SUCCESS && close != ERROR_CANCELLED {
                warn!("CloseTrace failed: {}", close.0);
            }
        }

        if context.stopped {
            return Ok(PumpExit::Stopped);
        }
        if status != ERROR_CANCELLED {
            check(status)?;
        }
        Ok(PumpExit::Exhausted)
    }

    fn stop_session(&mut self, session: SessionHandle, name: &str) -> Result<(), TraceError> {
        self.control(session.0, name, EVENT_TRACE_CONTROL_STOP).map(|_| ())
    }
}

/// State reachable from the consumer callback through `UserContext`
struct PumpContext<'s, 'a> {
    sink: &'s mut RecordSink<'a>,
    trace: PROCESSTRACE_HANDLE,
    stopped: bool,
}

unsafe extern "system" fn on_event_record(record: *mut EVENT_RECORD) {
    // SAFETY: ETW passes a valid record for the duration of the callback
    let Some(record) = (unsafe { record.as_ref() }) else {
        return;
    };
    // SAFETY: UserContext is the PumpContext installed by `process`, which is
    // alive while ProcessTrace runs on this thread
    let Some(context) = (unsafe { record.UserContext.cast::<PumpContext<'_, '_>>().as_mut() })
    else {
        return;
    };
    if context.stopped {
        return;
    }

    let payload = if record.UserData.is_null() || record.UserDataLength == 0 {
        &[][..]
    } else {
        // SAFETY: UserData holds UserDataLength bytes for the callback's duration
        unsafe {
            std::slice::from_raw_parts(
                record.UserData.cast::<u8>(),
                usize::from(record.UserDataLength),
            )
        }
    };

    let header = &record.EventHeader;
    let event = EventRecord {
        provider: from_windows_guid(&header.ProviderId),
        process_id: header.ProcessId,
        id: header.EventDescriptor.Id,
        opcode: header.EventDescriptor.Opcode,
        payload,
    };

    if (context.sink)(&event) == PumpControl::Stop {
        context.stopped = true;
        // SAFETY: the handle is open; closing it ends ProcessTrace once
        // buffered records are delivered
        unsafe {
            let _ = CloseTrace(context.trace);
        }
    }
}
