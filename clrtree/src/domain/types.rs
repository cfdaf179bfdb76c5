//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep the three identifier spaces of the runtime
//! (instances, domains, assemblies) from being mixed up at call sites.

use clrtree_common::{Guid, CLR_RUNDOWN_PROVIDER, CLR_RUNTIME_PROVIDER};
use std::fmt;

/// Process ID of the inspected process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

/// CLR instance ID
///
/// Small integer the runtime assigns to each loaded CLR within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClrInstanceId(pub u16);

impl fmt::Display for ClrInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// AppDomain ID, unique within one CLR instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppDomainId(pub u64);

impl fmt::Display for AppDomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Assembly ID, unique within one CLR instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssemblyId(pub u64);

impl fmt::Display for AssemblyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Module ID
///
/// Only used to tell legacy (CLR 2.0) module records apart, since that
/// protocol has no assembly layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u64);

/// Index of a node inside a [`NodeStore`](crate::tree::NodeStore)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Event protocol spoken by a runtime generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolGeneration {
    /// CLR 2.0: event ID 0, records told apart by opcode
    Legacy,
    /// CLR 4 and above: manifest event IDs
    IdBased,
}

impl ProtocolGeneration {
    /// Provider enabled on the session for this generation
    #[must_use]
    pub fn provider(self) -> Guid {
        match self {
            ProtocolGeneration::IdBased => CLR_RUNTIME_PROVIDER,
            ProtocolGeneration::Legacy => CLR_RUNDOWN_PROVIDER,
        }
    }
}

impl fmt::Display for ProtocolGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolGeneration::Legacy => f.write_str("CLR 2.0 (opcode protocol)"),
            ProtocolGeneration::IdBased => f.write_str("CLR 4+ (event ID protocol)"),
        }
    }
}
