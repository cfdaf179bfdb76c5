//! # Event Decoding
//!
//! Turns raw rundown records into typed [`ClrEvent`]s.
//!
//! - `raw`: the record header fields and payload delivered by the pump
//! - `cursor`: bounds-checked reader over a positional payload
//! - `payloads`: typed record shapes
//! - `decoder`: one decoding function per record shape, and the dispatch on
//!   event ID / opcode that picks between them

pub mod cursor;
pub mod decoder;
pub mod payloads;
pub mod raw;

pub use cursor::PayloadCursor;
pub use decoder::decode;
pub use payloads::{
    AssemblyStart, ClrEvent, DomainStart, LegacyModuleStart, ModuleStart, RuntimeStart,
};
pub use raw::EventRecord;
