//! Dependency graph wrapper using petgraph::StableDiGraph with custom NodeId

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use crate::model::*;
use crate::path::CanonicalPath;

/// Files and references discovered by one scan, plus the issues found along the way.
///
/// Nodes are stored in discovery (breadth-first) order and never removed, so
/// iteration order is the deterministic manifest order.
pub struct DependencyGraph {
    inner: StableDiGraph<FileNode, DependencyEdge>,
    by_path: HashMap<CanonicalPath, NodeId>,
    root: Option<NodeId>,
    issues: Vec<ScanIssue>,
    /// A required reference could not be turned into a path at all.
    unresolvable_required: bool,
    identified: bool,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .field("issues", &self.issues.len())
            .field("identified", &self.identified)
            .finish()
    }
}

fn index(id: NodeId) -> NodeIndex {
    NodeIndex::new(id.0 as usize)
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        DependencyGraph {
            inner: StableDiGraph::new(),
            by_path: HashMap::new(),
            root: None,
            issues: Vec::new(),
            unresolvable_required: false,
            identified: false,
        }
    }

    /// Insert a node, assigning its id. The first node inserted is the root.
    pub(crate) fn add_node(&mut self, mut node: FileNode) -> NodeId {
        debug_assert!(!self.by_path.contains_key(&node.path), "duplicate node {}", node.path);
        let id = NodeId(self.inner.node_count() as u64);
        node.id = id;
        let path = node.path.clone();
        let idx = self.inner.add_node(node);
        debug_assert_eq!(idx.index() as u64, id.0);
        self.by_path.insert(path, id);
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    pub(crate) fn add_edge(&mut self, source: NodeId, target: NodeId, required: bool) {
        let edge = DependencyEdge {
            source,
            target,
            required,
        };
        self.inner.add_edge(index(source), index(target), edge);
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut FileNode> {
        self.inner.node_weight_mut(index(id))
    }

    pub(crate) fn push_issue(&mut self, issue: ScanIssue) {
        self.issues.push(issue);
    }

    pub(crate) fn mark_unresolvable_required(&mut self) {
        self.unresolvable_required = true;
    }

    pub(crate) fn mark_identified(&mut self) {
        self.identified = true;
    }

    /// Would an edge `source -> target` close a cycle?
    ///
    /// True when `target` already reaches `source`, including `source == target`.
    pub fn would_close_cycle(&self, source: NodeId, target: NodeId) -> bool {
        has_path_connecting(&self.inner, index(target), index(source), None)
    }

    pub fn root(&self) -> Option<&FileNode> {
        self.root.and_then(|id| self.node(id))
    }

    pub fn node(&self, id: NodeId) -> Option<&FileNode> {
        self.inner.node_weight(index(id))
    }

    /// Look up a node by canonical path.
    pub fn find(&self, path: &CanonicalPath) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    pub fn node_by_path(&self, path: &CanonicalPath) -> Option<&FileNode> {
        self.find(path).and_then(|id| self.node(id))
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &FileNode> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// Direct references of `source`.
    pub fn edges_from(&self, source: NodeId) -> impl Iterator<Item = &DependencyEdge> {
        self.inner
            .edges_directed(index(source), Direction::Outgoing)
            .filter_map(move |edge_ref| self.inner.edge_weight(edge_ref.id()))
    }

    /// Documents referencing `target`.
    pub fn edges_to(&self, target: NodeId) -> impl Iterator<Item = &DependencyEdge> {
        self.inner
            .edges_directed(index(target), Direction::Incoming)
            .filter_map(move |edge_ref| self.inner.edge_weight(edge_ref.id()))
    }

    pub fn issues(&self) -> &[ScanIssue] {
        &self.issues
    }

    pub fn issues_of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &ScanIssue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    /// Any required file missing on disk, or any required reference whose
    /// path could not be resolved?
    pub fn has_unresolved_references(&self) -> bool {
        self.unresolvable_required || self.nodes().any(|n| !n.exists && n.required)
    }

    /// Have content identities been computed?
    pub fn is_identified(&self) -> bool {
        self.identified
    }
}
