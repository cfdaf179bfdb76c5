//! # Tree Builder
//!
//! Applies decoded rundown events to a [`NodeStore`], one at a time and in
//! stream order. Every event either creates a node, annotates an existing
//! one, or is dropped; nothing is ever removed or re-parented.
//!
//! ## Correlation
//!
//! ```text
//! RuntimeStart   instance_id                   -> new root
//! DomainStart    instance_id -> runtime         -> new child of runtime
//! AssemblyStart  instance_id -> runtime
//!                domain_id   -> domain          -> new child of domain
//! ModuleStart    instance_id -> runtime
//!                assembly_id -> component       -> paths set on component
//! LegacyModule   (synthetic v2 container)       -> new child of container
//! ```
//!
//! A lookup miss anywhere in a chain drops the event ([`ApplyOutcome::Orphan`]).
//! A start event for an identifier already present in its scope is a no-op
//! ([`ApplyOutcome::Duplicate`]).

use log::debug;

use super::node::{Node, NodeKind};
use super::store::NodeStore;
use crate::domain::{NodeId, ProtocolGeneration};
use crate::events::{
    AssemblyStart, ClrEvent, DomainStart, LegacyModuleStart, ModuleStart, RuntimeStart,
};
use crate::flags::{
    flags_to_string, join_flag_text, APP_DOMAIN_FLAGS, ASSEMBLY_FLAGS, MODULE_FLAGS,
    STARTUP_FLAGS, STARTUP_MODE,
};

/// What applying one event did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A node was created
    Created(NodeId),
    /// An existing node received path information
    Annotated(NodeId),
    /// The identifier already exists in its scope
    Duplicate,
    /// A parent or target lookup missed
    Orphan,
    /// Nothing to apply (legacy module without a v2 container)
    Ignored,
    /// Rundown-complete marker; the pump should stop
    Complete(ProtocolGeneration),
}

pub struct TreeBuilder<'a> {
    store: &'a mut NodeStore,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(store: &'a mut NodeStore) -> Self {
        Self { store }
    }

    pub fn apply(&mut self, event: ClrEvent) -> ApplyOutcome {
        match event {
            ClrEvent::RuntimeStart(data) => self.apply_runtime_start(data),
            ClrEvent::DomainStart(data) => self.apply_domain_start(data),
            ClrEvent::AssemblyStart(data) => self.apply_assembly_start(data),
            ClrEvent::ModuleStart(data) => self.apply_module_start(data),
            ClrEvent::LegacyModuleStart(data) => self.apply_legacy_module_start(data),
            ClrEvent::RundownComplete(generation) => ApplyOutcome::Complete(generation),
        }
    }

    fn apply_runtime_start(&mut self, data: RuntimeStart) -> ApplyOutcome {
        if self.store.find_runtime(data.instance_id).is_some() {
            return ApplyOutcome::Duplicate;
        }

        let [major, minor, build, qfe] = data.vm_version;
        let flags_text = join_flag_text(
            flags_to_string(data.startup_flags, STARTUP_FLAGS),
            flags_to_string(u32::from(data.startup_mode), STARTUP_MODE),
        );

        let mut node = Node::new(
            NodeKind::Runtime { instance_id: data.instance_id, synthetic: false },
            format!("CLR v{major}.{minor}.{build}.{qfe}"),
        )
        .with_id_text(data.instance_id.to_string())
        .with_flags_text(flags_text);

        if !data.command_line.is_empty() {
            node.path = Some(data.command_line);
        }

        ApplyOutcome::Created(self.store.create_node(node, None))
    }

    fn apply_domain_start(&mut self, data: DomainStart) -> ApplyOutcome {
        let Some(runtime) = self.store.find_runtime(data.instance_id) else {
            debug!("AppDomain {} has no runtime {}", data.domain_id, data.instance_id);
            return ApplyOutcome::Orphan;
        };
        if self.store.find_domain(runtime, data.domain_id).is_some() {
            return ApplyOutcome::Duplicate;
        }

        let node = Node::new(
            NodeKind::Domain { domain_id: data.domain_id },
            format!("AppDomain: {}", data.name),
        )
        .with_id_text(data.domain_id.to_string())
        .with_flags_text(flags_to_string(data.flags, APP_DOMAIN_FLAGS));

        ApplyOutcome::Created(self.store.create_node(node, Some(runtime)))
    }

    fn apply_assembly_start(&mut self, data: AssemblyStart) -> ApplyOutcome {
        let Some(runtime) = self.store.find_runtime(data.instance_id) else {
            return ApplyOutcome::Orphan;
        };
        let Some(domain) = self.store.find_domain(runtime, data.domain_id) else {
            debug!("Assembly {} has no AppDomain {}", data.assembly_id, data.domain_id);
            return ApplyOutcome::Orphan;
        };
        if self.store.find_component(runtime, data.assembly_id).is_some() {
            return ApplyOutcome::Duplicate;
        }

        let structure_text = short_assembly_name(&data.fully_qualified_name).to_string();
        let node = Node::new(
            NodeKind::Component {
                assembly_id: data.assembly_id,
                module_id: None,
                fully_qualified_name: Some(data.fully_qualified_name),
            },
            structure_text,
        )
        .with_id_text(data.assembly_id.to_string())
        .with_flags_text(flags_to_string(data.flags, ASSEMBLY_FLAGS));

        ApplyOutcome::Created(self.store.create_node(node, Some(domain)))
    }

    fn apply_module_start(&mut self, data: ModuleStart) -> ApplyOutcome {
        let component = self
            .store
            .find_runtime(data.instance_id)
            .and_then(|runtime| self.store.find_component(runtime, data.assembly_id));

        let Some(component) = component else {
            debug!("Module path {} has no assembly {}", data.il_path, data.assembly_id);
            return ApplyOutcome::Orphan;
        };

        let native_path = (!data.native_path.is_empty()).then_some(data.native_path);
        self.store.set_paths(component, data.il_path, native_path);
        ApplyOutcome::Annotated(component)
    }

    fn apply_legacy_module_start(&mut self, data: LegacyModuleStart) -> ApplyOutcome {
        let Some(container) = self.store.legacy_container() else {
            return ApplyOutcome::Ignored;
        };
        if self.store.find_legacy_module(container, data.module_id).is_some() {
            return ApplyOutcome::Duplicate;
        }

        let mut node = Node::new(
            NodeKind::Component {
                assembly_id: data.assembly_id,
                module_id: Some(data.module_id),
                fully_qualified_name: None,
            },
            module_structure_text(&data.il_path),
        )
        .with_flags_text(flags_to_string(data.flags, MODULE_FLAGS));

        node.path = Some(data.il_path);
        if !data.native_path.is_empty() {
            node.native_path = Some(data.native_path);
        }

        ApplyOutcome::Created(self.store.create_node(node, Some(container)))
    }
}

/// Assembly name without version, culture and key token
///
/// `"mscorlib, Version=4.0.0.0, ..."` becomes `"mscorlib"`; a name without
/// a comma is returned whole.
#[must_use]
pub fn short_assembly_name(fully_qualified_name: &str) -> &str {
    fully_qualified_name
        .split_once(',')
        .map_or(fully_qualified_name, |(name, _)| name)
}

/// File name of a module path, without its extension
///
/// `C:\...\AcmeSoft.BigLib.dll` becomes `AcmeSoft.BigLib`. A path without
/// a backslash is returned whole.
#[must_use]
pub fn module_structure_text(path: &str) -> &str {
    let Some(backslash) = path.rfind('\\') else {
        return path;
    };
    let file_name = &path[backslash + 1..];

    match path.rfind('.') {
        Some(dot) if dot > backslash => &path[backslash + 1..dot],
        _ => file_name,
    }
}
