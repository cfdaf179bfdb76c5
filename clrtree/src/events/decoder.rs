//! # Rundown Record Decoding
//!
//! Dispatches on event ID (CLR 4+) or on opcode for event ID 0 (CLR 2.0)
//! and decodes the payload with one function per record shape.
//!
//! ## Payload layouts (packed, little-endian, `wstr` = UTF-16LE + NUL)
//!
//! ```text
//! RuntimeInformationDCStart  u16 instance, u16 sku, u16 bcl[4], u16 vm[4],
//!                            u32 startup_flags, u8 startup_mode, wstr command_line, ...
//! AppDomainDCStart_V1        u64 domain, u32 flags, wstr name, u32 index, u16 instance
//! AssemblyDCStart_V1         u64 assembly, u64 domain, u64 binding, u32 flags,
//!                            wstr fully_qualified_name, u16 instance
//! ModuleDCStart_V1           u64 module, u64 assembly, u32 flags, u32 reserved,
//!                            wstr il_path, wstr native_path, u16 instance
//! legacy module (opcode 35)  same as ModuleDCStart_V1 without the instance
//! ```
//!
//! Records with any other ID or opcode are not relevant and decode to
//! `Ok(None)`.

use clrtree_common::{
    APP_DOMAIN_DC_START_V1, ASSEMBLY_DC_START_V1, CLR_METHOD_DC_START_COMPLETE_OPCODE,
    CLR_MODULE_DC_START_OPCODE, DC_START_COMPLETE_V1, LEGACY_EVENT_ID, MODULE_DC_START_V1,
    RUNTIME_INFORMATION_DC_START,
};

use super::cursor::PayloadCursor;
use super::payloads::{
    AssemblyStart, ClrEvent, DomainStart, LegacyModuleStart, ModuleStart, RuntimeStart,
};
use super::raw::EventRecord;
use crate::domain::{
    AppDomainId, AssemblyId, ClrInstanceId, DecodeError, ModuleId, ProtocolGeneration,
};

/// Decode `record` into a typed event, if it is one we consume
///
/// # Errors
/// Returns a [`DecodeError`] when the payload is shorter than its layout
/// requires or a string runs off the end of the buffer.
pub fn decode(record: &EventRecord<'_>) -> Result<Option<ClrEvent>, DecodeError> {
    let payload = record.payload;

    let event = match record.id {
        RUNTIME_INFORMATION_DC_START => ClrEvent::RuntimeStart(decode_runtime_start(payload)?),
        APP_DOMAIN_DC_START_V1 => ClrEvent::DomainStart(decode_domain_start(payload)?),
        ASSEMBLY_DC_START_V1 => ClrEvent::AssemblyStart(decode_assembly_start(payload)?),
        MODULE_DC_START_V1 => ClrEvent::ModuleStart(decode_module_start(payload)?),
        DC_START_COMPLETE_V1 => ClrEvent::RundownComplete(ProtocolGeneration::IdBased),
        LEGACY_EVENT_ID => match record.opcode {
            CLR_MODULE_DC_START_OPCODE => {
                ClrEvent::LegacyModuleStart(decode_legacy_module_start(payload)?)
            }
            CLR_METHOD_DC_START_COMPLETE_OPCODE => {
                ClrEvent::RundownComplete(ProtocolGeneration::Legacy)
            }
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };

    Ok(Some(event))
}

pub fn decode_runtime_start(payload: &[u8]) -> Result<RuntimeStart, DecodeError> {
    let mut cursor = PayloadCursor::new(payload);

    let instance_id = ClrInstanceId(cursor.read_u16()?);
    // Sku, then the BCL version quad
    cursor.skip(2 + 4 * 2)?;
    let vm_version = [cursor.read_u16()?, cursor.read_u16()?, cursor.read_u16()?, cursor.read_u16()?];
    let startup_flags = cursor.read_u32()?;
    let startup_mode = cursor.read_u8()?;
    // Some runtimes end the record here
    let command_line =
        if cursor.remaining() == 0 { String::new() } else { cursor.read_utf16z()? };

    Ok(RuntimeStart { instance_id, vm_version, startup_flags, startup_mode, command_line })
}

pub fn decode_domain_start(payload: &[u8]) -> Result<DomainStart, DecodeError> {
    let mut cursor = PayloadCursor::new(payload);

    let domain_id = AppDomainId(cursor.read_u64()?);
    let flags = cursor.read_u32()?;
    let name = cursor.read_utf16z()?;
    // AppDomainIndex
    cursor.skip(4)?;
    let instance_id = ClrInstanceId(cursor.read_u16()?);

    Ok(DomainStart { domain_id, flags, name, instance_id })
}

pub fn decode_assembly_start(payload: &[u8]) -> Result<AssemblyStart, DecodeError> {
    let mut cursor = PayloadCursor::new(payload);

    let assembly_id = AssemblyId(cursor.read_u64()?);
    let domain_id = AppDomainId(cursor.read_u64()?);
    // BindingID
    cursor.skip(8)?;
    let flags = cursor.read_u32()?;
    let fully_qualified_name = cursor.read_utf16z()?;
    let instance_id = ClrInstanceId(cursor.read_u16()?);

    Ok(AssemblyStart { assembly_id, domain_id, flags, fully_qualified_name, instance_id })
}

pub fn decode_module_start(payload: &[u8]) -> Result<ModuleStart, DecodeError> {
    let mut cursor = PayloadCursor::new(payload);
    let (module_id, assembly_id, flags, il_path, native_path) = read_module_common(&mut cursor)?;
    let instance_id = ClrInstanceId(cursor.read_u16()?);

    Ok(ModuleStart { module_id, assembly_id, flags, il_path, native_path, instance_id })
}

pub fn decode_legacy_module_start(payload: &[u8]) -> Result<LegacyModuleStart, DecodeError> {
    let mut cursor = PayloadCursor::new(payload);
    let (module_id, assembly_id, flags, il_path, native_path) = read_module_common(&mut cursor)?;

    Ok(LegacyModuleStart { module_id, assembly_id, flags, il_path, native_path })
}

/// Fields shared by both module record shapes, up to the native path
fn read_module_common(
    cursor: &mut PayloadCursor<'_>,
) -> Result<(ModuleId, AssemblyId, u32, String, String), DecodeError> {
    let module_id = ModuleId(cursor.read_u64()?);
    let assembly_id = AssemblyId(cursor.read_u64()?);
    let flags = cursor.read_u32()?;
    // Reserved1
    cursor.skip(4)?;
    let il_path = cursor.read_utf16z()?;
    let native_path = cursor.read_utf16z()?;
    Ok((module_id, assembly_id, flags, il_path, native_path))
}
