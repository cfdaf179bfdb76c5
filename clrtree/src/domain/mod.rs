//! Identifier newtypes and error types shared across clrtree
//!
//! Runtime, domain, assembly and module IDs all arrive as plain integers in
//! rundown payloads; wrapping them keeps an `AppDomainId` from being looked
//! up as an `AssemblyId`.

pub mod errors;
pub mod types;

pub use types::{
    AppDomainId, AssemblyId, ClrInstanceId, ModuleId, NodeId, Pid, ProtocolGeneration,
};

pub use errors::{DecodeError, ExportError, ProbeError, TraceError};
