//! Typed rundown records
//!
//! Only the fields the tree needs are kept; fixed fields that sit between
//! them on the wire are skipped by the decoder.

use crate::domain::{AppDomainId, AssemblyId, ClrInstanceId, ModuleId, ProtocolGeneration};

/// `RuntimeInformationDCStart`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStart {
    pub instance_id: ClrInstanceId,
    /// VM major, minor, build, QFE
    pub vm_version: [u16; 4],
    pub startup_flags: u32,
    pub startup_mode: u8,
    pub command_line: String,
}

/// `AppDomainDCStart_V1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainStart {
    pub domain_id: AppDomainId,
    pub flags: u32,
    pub name: String,
    pub instance_id: ClrInstanceId,
}

/// `AssemblyDCStart_V1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyStart {
    pub assembly_id: AssemblyId,
    pub domain_id: AppDomainId,
    pub flags: u32,
    pub fully_qualified_name: String,
    pub instance_id: ClrInstanceId,
}

/// `ModuleDCStart_V1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStart {
    pub module_id: ModuleId,
    pub assembly_id: AssemblyId,
    pub flags: u32,
    pub il_path: String,
    /// Empty when no native image is loaded
    pub native_path: String,
    pub instance_id: ClrInstanceId,
}

/// CLR 2.0 module rundown (event ID 0, module opcode)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyModuleStart {
    pub module_id: ModuleId,
    pub assembly_id: AssemblyId,
    pub flags: u32,
    pub il_path: String,
    pub native_path: String,
}

/// A decoded record the tree builder understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClrEvent {
    RuntimeStart(RuntimeStart),
    DomainStart(DomainStart),
    AssemblyStart(AssemblyStart),
    ModuleStart(ModuleStart),
    LegacyModuleStart(LegacyModuleStart),
    /// Terminal marker of a start rundown
    RundownComplete(ProtocolGeneration),
}

impl ClrEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClrEvent::RuntimeStart(_) => "RuntimeInformationDCStart",
            ClrEvent::DomainStart(_) => "AppDomainDCStart",
            ClrEvent::AssemblyStart(_) => "AssemblyDCStart",
            ClrEvent::ModuleStart(_) => "ModuleDCStart",
            ClrEvent::LegacyModuleStart(_) => "ModuleDCStart (legacy)",
            ClrEvent::RundownComplete(_) => "DCStartComplete",
        }
    }
}
