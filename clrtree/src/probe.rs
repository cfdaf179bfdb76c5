//! # Version Prober
//!
//! Tells which CLR generations a process has loaded by looking at the file
//! paths of its runtime DLLs:
//!
//! ```text
//! C:\Windows\Microsoft.NET\Framework\v2.0.50727\mscorwks.dll  -> V2_0
//! C:\Windows\Microsoft.NET\Framework64\v4.0.30319\clr.dll     -> (no match: Framework64)
//! C:\Windows\Microsoft.NET\Framework\v4.0.30319\clr.dll       -> V4_ABOVE
//! ```
//!
//! Module enumeration goes through [`ModuleSource`]. On Windows the native
//! source is a Toolhelp snapshot; elsewhere it is `/proc/<pid>/maps`, which
//! lists the DLLs of a process running under Wine with their host paths.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::PathBuf;

use clrtree_common::ClrVersions;
use log::{debug, info};

use crate::domain::{Pid, ProbeError};

/// Runtime DLLs whose location identifies the CLR version
pub const RUNTIME_MODULE_NAMES: [&str; 3] = ["clr.dll", "mscorwks.dll", "mscorsvr.dll"];

/// Path component that precedes the version folder
const FRAMEWORK_MARKER: &str = "microsoft.net\\framework\\";

/// A module mapped into the target process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    /// File name, e.g. `clr.dll`
    pub name: String,
    /// Full path as reported by the OS
    pub path: String,
}

impl LoadedModule {
    /// Build from a path, taking the name from its last component
    #[must_use]
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit(['\\', '/']).next().unwrap_or_default().to_string();
        Self { name, path }
    }
}

/// Enumerates the modules loaded in a process
pub trait ModuleSource {
    /// # Errors
    /// Returns [`ProbeError`] if the process does not exist or its modules
    /// cannot be listed.
    fn modules(&self, pid: Pid) -> Result<Vec<LoadedModule>, ProbeError>;
}

#[cfg(windows)]
pub type NativeModuleSource = ToolhelpSource;

#[cfg(not(windows))]
pub type NativeModuleSource = ProcMapsSource;

/// Version bit for a single runtime DLL path, or empty if the path is not
/// under a recognised framework folder
#[must_use]
pub fn version_from_path(path: &str) -> ClrVersions {
    // ASCII folding keeps byte offsets stable
    let folded: String = path
        .chars()
        .map(|c| if c == '/' { '\\' } else { c.to_ascii_lowercase() })
        .collect();

    let Some(index) = folded.find(FRAMEWORK_MARKER) else {
        return ClrVersions::empty();
    };
    let folder: Vec<char> = folded[index + FRAMEWORK_MARKER.len()..].chars().take(4).collect();

    // "vX.Y" at minimum
    if folder.len() < 4 {
        return ClrVersions::empty();
    }

    match (folder[1], folder[3]) {
        ('1', '0') => ClrVersions::V1_0,
        ('1', '1') => ClrVersions::V1_1,
        ('2', _) => ClrVersions::V2_0,
        ('4'..='9', _) => ClrVersions::V4_ABOVE,
        _ => ClrVersions::empty(),
    }
}

/// Fold the versions of every runtime DLL in `modules` into one mask
#[must_use]
pub fn detect_versions(modules: &[LoadedModule]) -> ClrVersions {
    modules
        .iter()
        .filter(|module| {
            RUNTIME_MODULE_NAMES.iter().any(|name| module.name.eq_ignore_ascii_case(name))
        })
        .fold(ClrVersions::empty(), |versions, module| {
            let found = version_from_path(&module.path);
            if !found.is_empty() {
                debug!("{} -> CLR {found}", module.path);
            }
            versions | found
        })
}

/// Enumerate the modules of `pid` once and detect its CLR versions
///
/// # Errors
/// Propagates the [`ModuleSource`] failure.
pub fn probe_process<S: ModuleSource + ?Sized>(
    source: &S,
    pid: Pid,
) -> Result<ClrVersions, ProbeError> {
    let modules = source.modules(pid)?;
    let versions = detect_versions(&modules);
    info!("{pid}: {} modules, CLR versions: {versions}", modules.len());
    Ok(versions)
}

/// Reads `<root>/<pid>/maps`
#[derive(Debug, Clone)]
pub struct ProcMapsSource {
    root: PathBuf,
}

impl Default for ProcMapsSource {
    fn default() -> Self {
        Self { root: PathBuf::from("/proc") }
    }
}

impl ProcMapsSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `root` in place of `/proc`
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn maps_path(&self, pid: Pid) -> PathBuf {
        self.root.join(pid.0.to_string()).join("maps")
    }
}

impl ModuleSource for ProcMapsSource {
    fn modules(&self, pid: Pid) -> Result<Vec<LoadedModule>, ProbeError> {
        let maps_path = self.maps_path(pid);
        match fs::read_to_string(&maps_path) {
            Ok(maps) => Ok(parse_maps(&maps)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ProbeError::ProcessNotFound(pid)),
            Err(e) => Err(ProbeError::ModuleEnumerationFailed {
                pid,
                reason: format!("{}: {e}", maps_path.display()),
            }),
        }
    }
}

/// File-backed mappings of a maps file, one entry per distinct path
///
/// Line format: `start-end perms offset dev inode pathname`. The pathname
/// may contain spaces and is absent for anonymous mappings.
#[must_use]
pub fn parse_maps(maps: &str) -> Vec<LoadedModule> {
    let mut seen = HashSet::new();
    let mut modules = Vec::new();

    for line in maps.lines() {
        let mut rest = line.trim_start();
        // Skip the five fixed columns
        for _ in 0..5 {
            rest = rest.split_once(char::is_whitespace).map_or("", |(_, tail)| tail).trim_start();
        }
        let path = rest.trim_end();

        // Anonymous and pseudo mappings ([heap], [stack], ...)
        if path.is_empty() || path.starts_with('[') {
            continue;
        }
        if seen.insert(path) {
            modules.push(LoadedModule::from_path(path));
        }
    }
    modules
}

#[cfg(windows)]
pub use toolhelp::ToolhelpSource;

#[cfg(windows)]
mod toolhelp {
    #![allow(unsafe_code)]

    use std::mem::size_of;

    use windows::Win32::Foundation::{CloseHandle, ERROR_INVALID_PARAMETER};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Module32FirstW, Module32NextW, MODULEENTRY32W,
        TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32,
    };

    use super::{LoadedModule, ModuleSource};
    use crate::domain::{Pid, ProbeError};

    /// Toolhelp module snapshot of a live process
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ToolhelpSource;

    fn wide_to_string(buf: &[u16]) -> String {
        let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        String::from_utf16_lossy(&buf[..len])
    }

    impl ModuleSource for ToolhelpSource {
        fn modules(&self, pid: Pid) -> Result<Vec<LoadedModule>, ProbeError> {
            // SAFETY: plain snapshot call, the handle is closed below
            let snapshot =
                unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid.0) }
                    .map_err(|e| {
                        if e.code() == ERROR_INVALID_PARAMETER.to_hresult() {
                            ProbeError::ProcessNotFound(pid)
                        } else {
                            ProbeError::ModuleEnumerationFailed { pid, reason: e.message() }
                        }
                    })?;

            let mut modules = Vec::new();
            #[allow(clippy::cast_possible_truncation)]
            let mut entry =
                MODULEENTRY32W { dwSize: size_of::<MODULEENTRY32W>() as u32, ..Default::default() };

            // SAFETY: `entry` is a correctly sized MODULEENTRY32W
            let mut next = unsafe { Module32FirstW(snapshot, &mut entry) };
            while next.is_ok() {
                modules.push(LoadedModule {
                    name: wide_to_string(&entry.szModule),
                    path: wide_to_string(&entry.szExePath),
                });
                // SAFETY: as above
                next = unsafe { Module32NextW(snapshot, &mut entry) };
            }

            // SAFETY: `snapshot` is a valid handle owned here
            let _ = unsafe { CloseHandle(snapshot) };
            Ok(modules)
        }
    }
}
