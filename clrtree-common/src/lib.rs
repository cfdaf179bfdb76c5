//! # Shared Wire Constants (ETW ↔ clrtree)
//!
//! Identifiers that must match the CLR's event manifests exactly for the
//! tracing subsystem to route events to us. Everything here is read-only
//! constant data.
//!
//! ## Key Items
//!
//! - [`Guid`] - Provider identity, laid out like the Win32 `GUID`
//! - [`CLR_RUNTIME_PROVIDER`] / [`CLR_RUNDOWN_PROVIDER`] - Provider GUIDs
//! - [`LOGGER_NAME`] - Real-time session name
//! - Event IDs and opcodes for both protocol generations
//! - [`ClrVersions`] - Runtime generations detected in the target

#![cfg_attr(not(test), no_std)]

use core::fmt;

use bitflags::bitflags;

// ============================================================================
// Provider Identity
// ============================================================================

/// Provider GUID with the same field layout as the Win32 `GUID`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    #[must_use]
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self { data1, data2, data3, data4 }
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

/// `Microsoft-Windows-DotNETRuntime`
pub const CLR_RUNTIME_PROVIDER: Guid =
    Guid::new(0xe13c_0d23, 0xccbc, 0x4e12, [0x93, 0x1b, 0xd9, 0xcc, 0x2e, 0xee, 0x27, 0xe4]);

/// `Microsoft-Windows-DotNETRuntimeRundown`
pub const CLR_RUNDOWN_PROVIDER: Guid =
    Guid::new(0xa669_021c, 0xc450, 0x4609, [0xa0, 0x35, 0x5a, 0xf5, 0x9a, 0xf4, 0xdf, 0x18]);

/// Name of the real-time logger session. A session left behind by an
/// earlier run under this name is reused rather than recreated.
pub const LOGGER_NAME: &str = "PhDnLogger";

// ============================================================================
// Enablement
// ============================================================================

/// `TRACE_LEVEL_INFORMATION`
pub const TRACE_LEVEL_INFORMATION: u8 = 4;

/// Loader events (domains, assemblies, modules)
pub const CLR_LOADER_KEYWORD: u64 = 0x8;

/// Ask the runtime to enumerate already-loaded state at session start
pub const CLR_STARTENUMERATION_KEYWORD: u64 = 0x40;

/// Keyword mask used for every session
pub const CLR_RUNDOWN_KEYWORDS: u64 = CLR_LOADER_KEYWORD | CLR_STARTENUMERATION_KEYWORD;

// ============================================================================
// ID-based protocol (CLR 4 and above)
// ============================================================================

/// `RuntimeInformationDCStart`
pub const RUNTIME_INFORMATION_DC_START: u16 = 187;

/// `AppDomainDCStart_V1`
pub const APP_DOMAIN_DC_START_V1: u16 = 157;

/// `AssemblyDCStart_V1`
pub const ASSEMBLY_DC_START_V1: u16 = 155;

/// `ModuleDCStart_V1`
pub const MODULE_DC_START_V1: u16 = 153;

/// `DCStartComplete_V1`: end of the start rundown
pub const DC_START_COMPLETE_V1: u16 = 146;

// ============================================================================
// Opcode-based protocol (CLR 2.0)
// ============================================================================

/// Legacy events all carry event ID 0 and are told apart by opcode
pub const LEGACY_EVENT_ID: u16 = 0;

/// Module enumerated during start rundown
pub const CLR_MODULE_DC_START_OPCODE: u8 = 35;

/// Method rundown finished; last event of the legacy start rundown
pub const CLR_METHOD_DC_START_COMPLETE_OPCODE: u8 = 14;

// ============================================================================
// Version presence
// ============================================================================

bitflags! {
    /// Set of runtime generations found in the target process
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ClrVersions: u32 {
        const V1_0 = 0x1;
        const V1_1 = 0x2;
        const V2_0 = 0x4;
        const V4_ABOVE = 0x8;
    }
}

impl fmt::Display for ClrVersions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let label = match name {
                "V1_0" => "1.0",
                "V1_1" => "1.1",
                "V2_0" => "2.0",
                _ => "4+",
            };
            f.write_str(label)?;
        }
        Ok(())
    }
}
