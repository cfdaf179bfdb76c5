//! Raw event record as delivered by a trace backend

use clrtree_common::Guid;

/// Header fields the decoder looks at, plus the borrowed user payload
#[derive(Debug, Clone, Copy)]
pub struct EventRecord<'a> {
    pub provider: Guid,
    /// Process that emitted the event
    pub process_id: u32,
    pub id: u16,
    pub opcode: u8,
    pub payload: &'a [u8],
}
