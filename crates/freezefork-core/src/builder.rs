//! Breadth-first dependency discovery over a [`CadModel`].

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cad::{CadModel, DocumentHandle};
use crate::error::GraphBuildError;
use crate::graph::DependencyGraph;
use crate::model::{FileNode, FileRole, NodeId, ScanIssue};
use crate::path::{CanonicalPath, PathResolver};
use crate::progress::ScanProgress;

/// Walks a CAD model's reference tree into a [`DependencyGraph`].
///
/// Traversal is breadth-first in the host's reference order, so an unchanged
/// assembly always produces the same node order. Anomalies (missing files,
/// cycles, documents the host cannot open) are attached to the graph as
/// [`ScanIssue`]s; only a bad root aborts the scan.
#[derive(Debug, Clone)]
pub struct DependencyGraphBuilder {
    case_insensitive: bool,
}

impl DependencyGraphBuilder {
    pub fn new() -> Self {
        Self {
            case_insensitive: cfg!(windows),
        }
    }

    /// Fold path case when deduplicating (default: Windows hosts only).
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Scan the model's active document.
    pub fn scan_active<M: CadModel + ?Sized>(
        &self,
        model: &M,
    ) -> Result<DependencyGraph, GraphBuildError> {
        let root = model
            .root_document()
            .ok_or(GraphBuildError::NoActiveDocument)?;
        self.build(model, &root)
    }

    /// Build the graph rooted at `root`.
    pub fn build<M: CadModel + ?Sized>(
        &self,
        model: &M,
        root: &DocumentHandle,
    ) -> Result<DependencyGraph, GraphBuildError> {
        self.build_with_progress(model, root, &mut |_| {})
    }

    /// Build the graph, reporting progress after each expanded document.
    pub fn build_with_progress<M: CadModel + ?Sized>(
        &self,
        model: &M,
        root: &DocumentHandle,
        on_progress: &mut dyn FnMut(&ScanProgress),
    ) -> Result<DependencyGraph, GraphBuildError> {
        let started = Instant::now();
        let base = PathResolver::from_current_dir()?.case_insensitive(self.case_insensitive);
        let root_path = base.resolve(root.path())?;

        let meta = fs::metadata(&root_path.native).map_err(|source| {
            GraphBuildError::RootUnreadable {
                path: root_path.native.clone(),
                source,
            }
        })?;
        if !meta.is_file() {
            return Err(GraphBuildError::RootUnreadable {
                path: root_path.native.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        // Relative references are anchored at the root assembly's directory.
        let resolver = base.for_document(&root_path)?;

        let mut graph = DependencyGraph::new();
        let root_id = graph.add_node(FileNode {
            id: NodeId::default(),
            path: root_path.canonical.clone(),
            native_path: root_path.native.clone(),
            role: FileRole::RootAssembly,
            exists: true,
            required: true,
            size: meta.len(),
            content_id: None,
        });
        info!("Scanning assembly {}", root_path.canonical);

        let mut queue: VecDeque<(NodeId, DocumentHandle)> = VecDeque::new();
        queue.push_back((root_id, root.clone()));
        let mut progress = ScanProgress {
            nodes_discovered: 1,
            ..ScanProgress::new()
        };

        // Why each missing node is missing, replayed for every later reference to it.
        let mut absent: HashMap<NodeId, Absence> = HashMap::new();

        while let Some((parent_id, handle)) = queue.pop_front() {
            let parent_path = match graph.node(parent_id) {
                Some(node) => node.path.clone(),
                None => continue,
            };
            debug!("Expanding {}", parent_path);

            let references = match model.references(&handle) {
                Ok(references) => references,
                Err(source) if parent_id == root_id => {
                    return Err(GraphBuildError::RootReferences {
                        path: root.path().to_string(),
                        source,
                    });
                }
                Err(e) => {
                    record(&mut graph, ScanIssue::unreadable(parent_path.clone(), None, e));
                    continue;
                }
            };

            for reference in references {
                let resolved = match resolver.resolve(&reference.path) {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        let raw = CanonicalPath::from_raw(reference.path.clone());
                        let mut issue = ScanIssue::missing_reference(raw, parent_path.clone());
                        issue.message = format!("{} (referenced by {parent_path}): {e}", reference.path);
                        record(&mut graph, issue);
                        if reference.required {
                            graph.mark_unresolvable_required();
                        }
                        continue;
                    }
                };

                // Shared file: one node, another edge.
                if let Some(existing) = graph.find(&resolved.canonical) {
                    if graph.would_close_cycle(parent_id, existing) {
                        record(
                            &mut graph,
                            ScanIssue::cycle(resolved.canonical.clone(), parent_path.clone()),
                        );
                        continue;
                    }
                    graph.add_edge(parent_id, existing, reference.required);
                    if let Some(node) = graph.node_mut(existing) {
                        node.required |= reference.required;
                    }
                    if let Some(absence) = absent.get(&existing) {
                        let issue = absence.issue(resolved.canonical, parent_path.clone());
                        record(&mut graph, issue);
                    }
                    continue;
                }

                let (size, absence) = match fs::metadata(&resolved.native) {
                    Ok(meta) if meta.is_file() => (meta.len(), None),
                    Ok(_) => (0, Some(Absence::NotAFile)),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => (0, Some(Absence::NotFound)),
                    Err(e) => (0, Some(Absence::Unreadable(e.to_string()))),
                };
                let exists = absence.is_none();

                let child_id = graph.add_node(FileNode {
                    id: NodeId::default(),
                    path: resolved.canonical.clone(),
                    native_path: resolved.native.clone(),
                    role: reference.role,
                    exists,
                    required: reference.required,
                    size,
                    content_id: None,
                });
                graph.add_edge(parent_id, child_id, reference.required);
                progress.nodes_discovered += 1;

                match absence {
                    Some(absence) => {
                        let issue = absence.issue(resolved.canonical, parent_path.clone());
                        record(&mut graph, issue);
                        absent.insert(child_id, absence);
                    }
                    None => {
                        let child = DocumentHandle::new(resolved.native.to_string_lossy());
                        queue.push_back((child_id, child));
                    }
                }
            }

            progress.nodes_visited += 1;
            progress.issues_found = graph.issues().len() as u64;
            progress.current_path = Some(parent_path);
            progress.elapsed = started.elapsed();
            on_progress(&progress);
        }

        info!(
            "Scan complete: {} files, {} references, {} issues in {:?}",
            graph.node_count(),
            graph.edge_count(),
            graph.issues().len(),
            started.elapsed()
        );
        Ok(graph)
    }
}

impl Default for DependencyGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a referenced file did not become a readable node.
#[derive(Debug)]
enum Absence {
    NotFound,
    NotAFile,
    Unreadable(String),
}

impl Absence {
    fn issue(&self, path: CanonicalPath, parent: CanonicalPath) -> ScanIssue {
        match self {
            Absence::NotFound => ScanIssue::missing_reference(path, parent),
            Absence::NotAFile => ScanIssue::not_a_file(path, parent),
            Absence::Unreadable(detail) => ScanIssue::unreadable(path, Some(parent), detail),
        }
    }
}

fn record(graph: &mut DependencyGraph, issue: ScanIssue) {
    warn!("{}", issue);
    graph.push_issue(issue);
}
