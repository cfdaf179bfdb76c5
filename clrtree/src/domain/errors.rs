//! Structured error types for clrtree
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! The `Display` text of [`TraceError`] is what the presenter shows in place
//! of the tree.

use super::types::Pid;
use thiserror::Error;

/// Win32 `ERROR_ACCESS_DENIED`
pub const ERROR_ACCESS_DENIED: u32 = 5;

/// Win32 `ERROR_NOT_SUPPORTED`
pub const ERROR_NOT_SUPPORTED: u32 = 50;

/// Session-level failure reported by the trace session controller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("Event tracing is not supported on this system.")]
    Unsupported,

    #[error(
        "Unable to start the event tracing session. \
         Make sure clrtree is running with administrative privileges."
    )]
    AccessDenied,

    #[error("Unable to start the event tracing session: {message}")]
    Os { code: u32, message: String },
}

impl TraceError {
    /// Classify a Win32 status code returned by the tracing API
    #[must_use]
    pub fn from_os_code(code: u32) -> Self {
        match code {
            ERROR_ACCESS_DENIED => TraceError::AccessDenied,
            ERROR_NOT_SUPPORTED => TraceError::Unsupported,
            _ => TraceError::Os { code, message: system_message(code) },
        }
    }

    /// Win32 status code equivalent of this error
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            TraceError::Unsupported => ERROR_NOT_SUPPORTED,
            TraceError::AccessDenied => ERROR_ACCESS_DENIED,
            TraceError::Os { code, .. } => *code,
        }
    }
}

#[cfg(windows)]
#[allow(clippy::cast_possible_wrap)]
fn system_message(code: u32) -> String {
    // On Windows the io::Error text comes from FormatMessageW
    std::io::Error::from_raw_os_error(code as i32).to_string()
}

#[cfg(not(windows))]
fn system_message(code: u32) -> String {
    format!("Win32 error {code}")
}

/// A record whose payload does not fit the expected layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload truncated: needed {needed} bytes at offset {offset}, {len} available")]
    Truncated { offset: usize, needed: usize, len: usize },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Process {0} not found")]
    ProcessNotFound(Pid),

    #[error("Failed to enumerate modules of process {pid}: {reason}")]
    ModuleEnumerationFailed { pid: Pid, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
