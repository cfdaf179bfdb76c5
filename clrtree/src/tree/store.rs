//! # Node Store
//!
//! Arena that owns every node of the tree. Nodes are addressed by
//! [`NodeId`] and are never removed individually; the whole arena is
//! released by [`NodeStore::clear`] or on drop.
//!
//! ## Lookups
//!
//! All lookups are linear scans. A process hosts tens of domains and
//! assemblies at most, so a scan over the owning runtime's subtree is
//! cheaper to maintain than per-scope indexes.
//!
//! ## Presenter queries
//!
//! [`roots`](NodeStore::roots), [`children`](NodeStore::children),
//! [`is_leaf`](NodeStore::is_leaf), [`cell_text`](NodeStore::cell_text) and
//! [`tooltip`](NodeStore::tooltip) are everything a tree view needs. Children
//! of a domain, and of the legacy flat container, are sorted on every call
//! so insertions between two queries are always reflected.

use std::cmp::Ordering;

use super::node::{Column, Node, NodeKind};
use crate::domain::{AppDomainId, AssemblyId, ClrInstanceId, ModuleId, NodeId};

#[derive(Debug, Default)]
pub struct NodeStore {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    /// Synthetic CLR 2.0 runtime that holds legacy modules directly
    legacy_container: Option<NodeId>,
}

impl NodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `node` and link it under `parent`, or append it to
    /// the roots when `parent` is `None`.
    pub fn create_node(&mut self, mut node: Node, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = parent;
        node.children.clear();
        self.nodes.push(node);

        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Add a placeholder runtime root
    pub fn add_synthetic_runtime(&mut self, display_name: &str) -> NodeId {
        self.create_node(Node::synthetic_runtime(display_name), None)
    }

    /// Mark `id` as the container legacy module records attach to
    pub fn set_legacy_container(&mut self, id: NodeId) {
        self.legacy_container = Some(id);
    }

    #[must_use]
    pub fn legacy_container(&self) -> Option<NodeId> {
        self.legacy_container
    }

    /// Release every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.legacy_container = None;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// # Panics
    /// Panics if `id` was not issued by this store.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Attach module path information to an existing node
    pub fn set_paths(&mut self, id: NodeId, path: String, native_path: Option<String>) {
        let node = &mut self.nodes[id.0];
        node.path = Some(path);
        if native_path.is_some() {
            node.native_path = native_path;
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Real runtime with `instance_id`; synthetic placeholders never match
    #[must_use]
    pub fn find_runtime(&self, instance_id: ClrInstanceId) -> Option<NodeId> {
        self.roots
            .iter()
            .copied()
            .find(|&id| self.node(id).real_instance_id() == Some(instance_id))
    }

    #[must_use]
    pub fn find_domain(&self, runtime: NodeId, domain_id: AppDomainId) -> Option<NodeId> {
        self.node(runtime)
            .children
            .iter()
            .copied()
            .find(|&id| self.node(id).domain_id() == Some(domain_id))
    }

    /// Assembly anywhere below `runtime` (one level of domains deep)
    #[must_use]
    pub fn find_component(&self, runtime: NodeId, assembly_id: AssemblyId) -> Option<NodeId> {
        for &domain in &self.node(runtime).children {
            for &component in &self.node(domain).children {
                if self.node(component).assembly_id() == Some(assembly_id) {
                    return Some(component);
                }
            }
        }
        None
    }

    /// Legacy module directly below the flat `container`
    #[must_use]
    pub fn find_legacy_module(&self, container: NodeId, module_id: ModuleId) -> Option<NodeId> {
        self.node(container)
            .children
            .iter()
            .copied()
            .find(|&id| self.node(id).module_id() == Some(module_id))
    }

    // ------------------------------------------------------------------
    // Presenter queries
    // ------------------------------------------------------------------

    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Children of `id`. Domain children and legacy container children are
    /// returned sorted by structure text, ignoring case.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        let mut children = node.children.clone();

        if matches!(node.kind, NodeKind::Domain { .. }) || self.legacy_container == Some(id) {
            children.sort_by(|&a, &b| {
                compare_ignore_case(&self.node(a).structure_text, &self.node(b).structure_text)
            });
        }
        children
    }

    #[must_use]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).children.is_empty()
    }

    #[must_use]
    pub fn cell_text(&self, id: NodeId, column: Column) -> &str {
        self.node(id).cell_text(column)
    }

    #[must_use]
    pub fn tooltip(&self, id: NodeId) -> Option<&str> {
        self.node(id).tooltip()
    }
}

/// Case-insensitive order folding to upper case, so `_` sorts after letters
fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars().flat_map(char::to_uppercase).cmp(b.chars().flat_map(char::to_uppercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(store: &mut NodeStore, instance: u16) -> NodeId {
        store.create_node(
            Node::new(
                NodeKind::Runtime { instance_id: ClrInstanceId(instance), synthetic: false },
                format!("CLR {instance}"),
            ),
            None,
        )
    }

    fn domain(store: &mut NodeStore, runtime: NodeId, id: u64) -> NodeId {
        store.create_node(
            Node::new(NodeKind::Domain { domain_id: AppDomainId(id) }, format!("AppDomain: {id}")),
            Some(runtime),
        )
    }

    fn assembly(store: &mut NodeStore, domain: NodeId, id: u64, name: &str) -> NodeId {
        store.create_node(
            Node::new(
                NodeKind::Component {
                    assembly_id: AssemblyId(id),
                    module_id: None,
                    fully_qualified_name: Some(name.to_string()),
                },
                name,
            ),
            Some(domain),
        )
    }

    #[test]
    fn test_find_runtime_skips_synthetic() {
        let mut store = NodeStore::new();
        store.add_synthetic_runtime("CLR v2.0.50727");
        assert_eq!(store.find_runtime(ClrInstanceId(0)), None);

        let real = runtime(&mut store, 0);
        assert_eq!(store.find_runtime(ClrInstanceId(0)), Some(real));
    }

    #[test]
    fn test_domain_and_component_ids_are_scoped_per_runtime() {
        let mut store = NodeStore::new();
        let first = runtime(&mut store, 1);
        let second = runtime(&mut store, 2);
        let d1 = domain(&mut store, first, 1);
        let d2 = domain(&mut store, second, 1);
        let a1 = assembly(&mut store, d1, 100, "A");
        let a2 = assembly(&mut store, d2, 100, "A");

        assert_eq!(store.find_domain(first, AppDomainId(1)), Some(d1));
        assert_eq!(store.find_domain(second, AppDomainId(1)), Some(d2));
        assert_eq!(store.find_component(first, AssemblyId(100)), Some(a1));
        assert_eq!(store.find_component(second, AssemblyId(100)), Some(a2));
        assert_eq!(store.find_component(first, AssemblyId(101)), None);
    }

    #[test]
    fn test_parent_is_fixed_at_creation() {
        let mut store = NodeStore::new();
        let rt = runtime(&mut store, 1);
        let d = domain(&mut store, rt, 5);

        assert_eq!(store.parent(d), Some(rt));
        assert_eq!(store.parent(rt), None);
        assert!(!store.is_leaf(rt));
        assert!(store.is_leaf(d));
        assert_eq!(store.roots(), &[rt]);
    }

    #[test]
    fn test_domain_children_sorted_at_read_time() {
        let mut store = NodeStore::new();
        let rt = runtime(&mut store, 1);
        let d = domain(&mut store, rt, 1);
        let zeta = assembly(&mut store, d, 1, "zeta");
        let alpha = assembly(&mut store, d, 2, "Alpha");

        assert_eq!(store.children(d), vec![alpha, zeta]);

        let beta = assembly(&mut store, d, 3, "BETA");
        assert_eq!(store.children(d), vec![alpha, beta, zeta]);
    }

    #[test]
    fn test_punctuation_sorts_after_letters() {
        let mut store = NodeStore::new();
        let rt = runtime(&mut store, 1);
        let d = domain(&mut store, rt, 1);
        let zeta = assembly(&mut store, d, 1, "Zeta");
        let private = assembly(&mut store, d, 2, "_Private");
        let alpha = assembly(&mut store, d, 3, "alpha");

        assert_eq!(store.children(d), vec![alpha, zeta, private]);
    }

    #[test]
    fn test_runtime_children_keep_insertion_order() {
        let mut store = NodeStore::new();
        let rt = runtime(&mut store, 1);
        let z = store.create_node(
            Node::new(NodeKind::Domain { domain_id: AppDomainId(1) }, "Z"),
            Some(rt),
        );
        let a = store.create_node(
            Node::new(NodeKind::Domain { domain_id: AppDomainId(2) }, "A"),
            Some(rt),
        );
        assert_eq!(store.children(rt), vec![z, a]);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut store = NodeStore::new();
        let placeholder = store.add_synthetic_runtime("CLR v2.0.50727");
        store.set_legacy_container(placeholder);
        runtime(&mut store, 1);

        store.clear();
        assert!(store.is_empty());
        assert!(store.roots().is_empty());
        assert_eq!(store.legacy_container(), None);
    }
}
