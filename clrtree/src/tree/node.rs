//! Tree node and its cached display columns

use serde::Serialize;

use crate::domain::{AppDomainId, AssemblyId, ClrInstanceId, ModuleId, NodeId};

/// Variant-specific part of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// CLR instance. Synthetic runtimes come from version probing alone and
    /// never match an instance ID lookup.
    Runtime { instance_id: ClrInstanceId, synthetic: bool },
    Domain { domain_id: AppDomainId },
    /// Assembly. Legacy (CLR 2.0) components are keyed by module ID instead
    /// and have no fully-qualified name.
    Component {
        assembly_id: AssemblyId,
        module_id: Option<ModuleId>,
        fully_qualified_name: Option<String>,
    },
}

/// Display column of the tree view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Structure,
    Id,
    Flags,
    Path,
    NativePath,
}

impl Column {
    pub const ALL: [Column; 5] =
        [Column::Structure, Column::Id, Column::Flags, Column::Path, Column::NativePath];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Column::Structure => "Structure",
            Column::Id => "ID",
            Column::Flags => "Flags",
            Column::Path => "Path",
            Column::NativePath => "Native Image Path",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,

    pub structure_text: String,
    pub id_text: Option<String>,
    pub flags_text: String,
    pub path: Option<String>,
    pub native_path: Option<String>,
}

impl Node {
    #[must_use]
    pub fn new(kind: NodeKind, structure_text: impl Into<String>) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            structure_text: structure_text.into(),
            id_text: None,
            flags_text: String::new(),
            path: None,
            native_path: None,
        }
    }

    /// Placeholder runtime created from version evidence only
    #[must_use]
    pub fn synthetic_runtime(display_name: &str) -> Self {
        Self::new(
            NodeKind::Runtime { instance_id: ClrInstanceId(0), synthetic: true },
            display_name,
        )
    }

    #[must_use]
    pub fn with_id_text(mut self, id_text: impl Into<String>) -> Self {
        self.id_text = Some(id_text.into());
        self
    }

    #[must_use]
    pub fn with_flags_text(mut self, flags_text: String) -> Self {
        self.flags_text = flags_text;
        self
    }

    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        matches!(self.kind, NodeKind::Runtime { synthetic: true, .. })
    }

    /// Instance ID of a real runtime node
    #[must_use]
    pub fn real_instance_id(&self) -> Option<ClrInstanceId> {
        match self.kind {
            NodeKind::Runtime { instance_id, synthetic: false } => Some(instance_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn domain_id(&self) -> Option<AppDomainId> {
        match self.kind {
            NodeKind::Domain { domain_id } => Some(domain_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn assembly_id(&self) -> Option<AssemblyId> {
        match self.kind {
            NodeKind::Component { assembly_id, module_id: None, .. } => Some(assembly_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        match self.kind {
            NodeKind::Component { module_id, .. } => module_id,
            _ => None,
        }
    }

    /// Text shown in `column`; absent values render as the empty string
    #[must_use]
    pub fn cell_text(&self, column: Column) -> &str {
        match column {
            Column::Structure => &self.structure_text,
            Column::Id => self.id_text.as_deref().unwrap_or_default(),
            Column::Flags => &self.flags_text,
            Column::Path => self.path.as_deref().unwrap_or_default(),
            Column::NativePath => self.native_path.as_deref().unwrap_or_default(),
        }
    }

    /// Fully-qualified assembly name, for components that have one
    #[must_use]
    pub fn tooltip(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Component { fully_qualified_name: Some(name), .. } if !name.is_empty() => {
                Some(name)
            }
            _ => None,
        }
    }
}
