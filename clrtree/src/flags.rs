//! Bitmask → label decoding for the flag fields carried by rundown events.

/// One named bit of a flags field
#[derive(Debug, Clone, Copy)]
pub struct FlagDefinition {
    pub name: &'static str,
    pub flag: u32,
}

const fn flag(name: &'static str, flag: u32) -> FlagDefinition {
    FlagDefinition { name, flag }
}

pub const APP_DOMAIN_FLAGS: &[FlagDefinition] =
    &[flag("Default", 0x1), flag("Executable", 0x2), flag("Shared", 0x4)];

pub const ASSEMBLY_FLAGS: &[FlagDefinition] = &[
    flag("DomainNeutral", 0x1),
    flag("Dynamic", 0x2),
    flag("Native", 0x4),
    flag("Collectible", 0x8),
];

pub const MODULE_FLAGS: &[FlagDefinition] = &[
    flag("DomainNeutral", 0x1),
    flag("Native", 0x2),
    flag("Dynamic", 0x4),
    flag("Manifest", 0x8),
];

pub const STARTUP_MODE: &[FlagDefinition] = &[
    flag("ManagedExe", 0x1),
    flag("HostedCLR", 0x2),
    flag("IjwDll", 0x4),
    flag("ComActivated", 0x8),
    flag("Other", 0x10),
];

pub const STARTUP_FLAGS: &[FlagDefinition] = &[
    flag("CONCURRENT_GC", 0x1),
    flag("LOADER_OPTIMIZATION_SINGLE_DOMAIN", 0x2),
    flag("LOADER_OPTIMIZATION_MULTI_DOMAIN", 0x4),
    flag("LOADER_SAFEMODE", 0x10),
    flag("LOADER_SETPREFERENCE", 0x100),
    flag("SERVER_GC", 0x1000),
    flag("HOARD_GC_VM", 0x2000),
    flag("SINGLE_VERSION_HOSTING_INTERFACE", 0x4000),
    flag("LEGACY_IMPERSONATION", 0x10000),
    flag("DISABLE_COMMITTHREADSTACK", 0x20000),
    flag("ALWAYSFLOW_IMPERSONATION", 0x40000),
    flag("TRIM_GC_COMMIT", 0x80000),
    flag("ETW", 0x10_0000),
    flag("SERVER_BUILD", 0x20_0000),
    flag("ARM", 0x40_0000),
];

/// Labels of every set bit that has a table entry, in table order,
/// separated by `", "`. Bits without an entry are ignored.
#[must_use]
pub fn flags_to_string(flags: u32, map: &[FlagDefinition]) -> String {
    map.iter()
        .filter(|def| flags & def.flag != 0)
        .map(|def| def.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Join two decoded flag strings, skipping whichever is empty
#[must_use]
pub fn join_flag_text(first: String, second: String) -> String {
    match (first.is_empty(), second.is_empty()) {
        (false, false) => format!("{first}, {second}"),
        (false, true) => first,
        (true, _) => second,
    }
}
