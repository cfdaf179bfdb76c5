//! JSON snapshot of an inspection

use std::io::Write;

use serde::Serialize;

use crate::domain::{ExportError, NodeId, TraceError};
use crate::inspect::Inspection;
use crate::processor::ProcessorStats;
use crate::tree::{Column, NodeStore};

#[derive(Debug, Serialize)]
pub struct SnapshotNode {
    pub structure: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub flags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_path: Option<String>,
    /// Fully-qualified assembly name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    pub synthetic: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,
}

impl SnapshotNode {
    fn build(store: &NodeStore, id: NodeId) -> Self {
        let non_empty =
            |column| Some(store.cell_text(id, column)).filter(|s| !s.is_empty()).map(String::from);

        Self {
            structure: store.cell_text(id, Column::Structure).to_string(),
            id: non_empty(Column::Id),
            flags: store.cell_text(id, Column::Flags).to_string(),
            path: non_empty(Column::Path),
            native_path: non_empty(Column::NativePath),
            tooltip: store.tooltip(id).map(String::from),
            synthetic: store.node(id).is_synthetic(),
            children: store.children(id).into_iter().map(|child| Self::build(store, child)).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotStats {
    pub sessions: usize,
    pub events: usize,
    pub foreign: usize,
    pub other_provider: usize,
    pub malformed: usize,
    pub created: usize,
    pub duplicates: usize,
    pub orphans: usize,
}

impl SnapshotStats {
    fn new(sessions: usize, stats: &ProcessorStats) -> Self {
        Self {
            sessions,
            events: stats.events,
            foreign: stats.foreign,
            other_provider: stats.other_provider,
            malformed: stats.malformed,
            created: stats.created,
            duplicates: stats.duplicates,
            orphans: stats.orphans,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub pid: u32,
    /// Detected CLR versions, e.g. `"2.0, 4+"`
    pub versions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Win32 status code of `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u32>,
    pub stats: SnapshotStats,
    pub roots: Vec<SnapshotNode>,
}

impl Snapshot {
    #[must_use]
    pub fn from_inspection(inspection: &Inspection) -> Self {
        let store = &inspection.store;
        // A failed inspection shows no tree
        let roots = if inspection.error.is_some() {
            Vec::new()
        } else {
            store.roots().iter().map(|&root| SnapshotNode::build(store, root)).collect()
        };

        Self {
            pid: inspection.pid.0,
            versions: inspection.versions.to_string(),
            error: inspection.error.as_ref().map(ToString::to_string),
            error_code: inspection.error.as_ref().map(TraceError::code),
            stats: SnapshotStats::new(inspection.sessions.len(), &inspection.stats),
            roots,
        }
    }
}

/// Write `inspection` as pretty-printed JSON
///
/// # Errors
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(inspection: &Inspection, mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, &Snapshot::from_inspection(inspection))?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssemblyId, ModuleId, Pid};
    use crate::tree::{Node, NodeKind};
    use clrtree_common::ClrVersions;

    fn legacy_inspection(error: Option<TraceError>) -> Inspection {
        let mut store = NodeStore::new();
        let container = store.add_synthetic_runtime("CLR v2.0.50727");
        store.set_legacy_container(container);
        let mut node = Node::new(
            NodeKind::Component {
                assembly_id: AssemblyId(1),
                module_id: Some(ModuleId(2)),
                fully_qualified_name: None,
            },
            "Lib",
        )
        .with_flags_text("Native".into());
        node.path = Some("C:\\Lib.dll".into());
        store.create_node(node, Some(container));

        Inspection {
            pid: Pid(42),
            versions: ClrVersions::V2_0,
            store,
            sessions: Vec::new(),
            stats: ProcessorStats::default(),
            error,
        }
    }

    #[test]
    fn test_snapshot_shape() {
        let value = serde_json::to_value(Snapshot::from_inspection(&legacy_inspection(None))).unwrap();

        assert_eq!(value["pid"], 42);
        assert_eq!(value["versions"], "2.0");
        assert!(value.get("error").is_none());
        assert!(value.get("error_code").is_none());

        let root = &value["roots"][0];
        assert_eq!(root["structure"], "CLR v2.0.50727");
        assert_eq!(root["synthetic"], true);
        assert!(root.get("id").is_none());

        let module = &root["children"][0];
        assert_eq!(module["structure"], "Lib");
        assert_eq!(module["flags"], "Native");
        assert_eq!(module["path"], "C:\\Lib.dll");
        assert!(module.get("children").is_none());
    }

    #[test]
    fn test_failed_inspection_has_error_and_no_tree() {
        let inspection = legacy_inspection(Some(TraceError::AccessDenied));
        let mut out = Vec::new();
        write_json(&inspection, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value["error"].as_str().unwrap().contains("administrative privileges"));
        assert_eq!(value["error_code"], 5);
        assert_eq!(value["roots"].as_array().unwrap().len(), 0);
    }
}
