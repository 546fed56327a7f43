//! Content identities for change detection.
//!
//! Per-file identity is the BLAKE3 digest of the file's bytes. The aggregate
//! identity hashes the ordered manifest as length-prefixed
//! `(path, role, content id)` records, so adding, removing, reordering or
//! modifying any entry yields a different aggregate.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use blake3::Hasher;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::IdentityError;
use crate::graph::DependencyGraph;
use crate::model::{ContentId, ManifestEntry, NodeId, ScanIssue};

/// Aggregate identity of a whole manifest.
pub type AggregateId = ContentId;

const AGGREGATE_DOMAIN: &[u8] = b"freezefork.manifest.v1";

/// Default number of hashing threads.
pub const DEFAULT_HASH_WORKERS: usize = 4;

/// Computes per-file and per-manifest identities.
#[derive(Debug, Clone)]
pub struct IdentityComputer {
    workers: usize,
}

impl IdentityComputer {
    pub fn new() -> Self {
        Self {
            workers: DEFAULT_HASH_WORKERS,
        }
    }

    /// Bound the hashing pool (minimum one thread).
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// BLAKE3 digest of the file's bytes.
    pub fn compute_file_identity(&self, path: &Path) -> Result<ContentId, IdentityError> {
        let unreadable = |source| IdentityError::Unreadable {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(unreadable)?;
        let mut hasher = Hasher::new();
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let bytes_read = file.read(&mut buffer).map_err(unreadable)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(ContentId::new(*hasher.finalize().as_bytes()))
    }

    /// Order-sensitive digest over the manifest's `(path, role, content id)` tuples.
    pub fn compute_aggregate_identity(manifest: &[ManifestEntry]) -> AggregateId {
        let mut hasher = Hasher::new();
        hasher.update(AGGREGATE_DOMAIN);
        hasher.update(&(manifest.len() as u64).to_le_bytes());
        for entry in manifest {
            update_field(&mut hasher, entry.path.as_str().as_bytes());
            update_field(&mut hasher, entry.role.as_str().as_bytes());
            match &entry.content_id {
                Some(id) => {
                    hasher.update(&[1]);
                    hasher.update(&id.0);
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
        ContentId::new(*hasher.finalize().as_bytes())
    }

    /// Hash every existing file of `graph` and return the identified graph.
    ///
    /// Files are hashed in parallel on a bounded pool; results are applied in
    /// manifest order. Files that cannot be read keep a `None` content id and
    /// add an `UnreadableFile` issue.
    pub fn identify(&self, mut graph: DependencyGraph) -> DependencyGraph {
        let started = Instant::now();
        let targets: Vec<(NodeId, std::path::PathBuf)> = graph
            .nodes()
            .filter(|n| n.exists)
            .map(|n| (n.id, n.native_path.clone()))
            .collect();

        let hash_all = |targets: &[(NodeId, std::path::PathBuf)]| -> Vec<(NodeId, Result<ContentId, IdentityError>)> {
            targets
                .par_iter()
                .map(|(id, path)| (*id, self.compute_file_identity(path)))
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
        {
            Ok(pool) => pool.install(|| hash_all(&targets)),
            Err(e) => {
                warn!("Cannot start hashing pool ({}), hashing sequentially", e);
                targets
                    .iter()
                    .map(|(id, path)| (*id, self.compute_file_identity(path)))
                    .collect()
            }
        };

        let mut hashed = 0usize;
        for (id, result) in results {
            match result {
                Ok(content_id) => {
                    if let Some(node) = graph.node_mut(id) {
                        debug!("{} {}", content_id, node.path);
                        node.content_id = Some(content_id);
                        hashed += 1;
                    }
                }
                Err(e) => {
                    let Some(node) = graph.node(id) else { continue };
                    let parent = graph
                        .edges_to(id)
                        .next()
                        .and_then(|edge| graph.node(edge.source))
                        .map(|p| p.path.clone());
                    let issue = ScanIssue::unreadable(node.path.clone(), parent, e);
                    warn!("{}", issue);
                    graph.push_issue(issue);
                }
            }
        }
        graph.mark_identified();

        info!(
            "Hashed {} of {} files in {:?}",
            hashed,
            targets.len(),
            started.elapsed()
        );
        graph
    }
}

impl Default for IdentityComputer {
    fn default() -> Self {
        Self::new()
    }
}

fn update_field(hasher: &mut Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
