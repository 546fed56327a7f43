//! Package assembly: the immutable unit handed to the sync gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PackageError;
use crate::graph::DependencyGraph;
use crate::identity::{AggregateId, IdentityComputer};
use crate::model::ManifestEntry;

/// Caller-supplied commit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    pub message: String,
    pub author: String,
    pub project_ref: String,
}

impl PackageMetadata {
    pub fn new(
        message: impl Into<String>,
        author: impl Into<String>,
        project_ref: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            author: author.into(),
            project_ref: project_ref.into(),
        }
    }

    fn validate(&self) -> Result<(), PackageError> {
        if self.message.trim().is_empty() {
            return Err(PackageError::EmptyMessage);
        }
        if self.author.trim().is_empty() {
            return Err(PackageError::EmptyAuthor);
        }
        if self.project_ref.trim().is_empty() {
            return Err(PackageError::EmptyProjectRef);
        }
        Ok(())
    }
}

/// Manifest plus metadata for one upload attempt.
///
/// Fields are only readable; a package never changes after assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    manifest: Vec<ManifestEntry>,
    aggregate_id: AggregateId,
    message: String,
    author: String,
    project_ref: String,
    created_at: DateTime<Utc>,
    has_unresolved_references: bool,
}

impl Package {
    /// Files in deterministic traversal order, root first.
    pub fn manifest(&self) -> &[ManifestEntry] {
        &self.manifest
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn project_ref(&self) -> &str {
        &self.project_ref
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// A required file was missing when scanned; warn before submitting.
    pub fn has_unresolved_references(&self) -> bool {
        self.has_unresolved_references
    }

    /// Total size of all files present on disk.
    pub fn total_size(&self) -> u64 {
        self.manifest.iter().map(|e| e.size).sum()
    }

    /// Key identifying a submission of this exact package to its project.
    ///
    /// Derived from the aggregate id and the metadata (not `created_at`), so
    /// resubmitting the same package after a timeout reuses the key.
    pub fn idempotency_key(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for field in [
            self.aggregate_id.to_hex().as_str(),
            self.project_ref.as_str(),
            self.message.as_str(),
            self.author.as_str(),
        ] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Builds packages from identified graphs.
#[derive(Debug, Clone, Default)]
pub struct PackageAssembler;

impl PackageAssembler {
    pub fn new() -> Self {
        PackageAssembler
    }

    /// Validate inputs and build a package stamped with the current time.
    pub fn assemble(
        &self,
        graph: &DependencyGraph,
        metadata: &PackageMetadata,
    ) -> Result<Package, PackageError> {
        self.assemble_at(graph, metadata, Utc::now())
    }

    /// Same as [`assemble`](Self::assemble) with an explicit timestamp.
    pub fn assemble_at(
        &self,
        graph: &DependencyGraph,
        metadata: &PackageMetadata,
        created_at: DateTime<Utc>,
    ) -> Result<Package, PackageError> {
        metadata.validate()?;
        if graph.root().is_none() {
            return Err(PackageError::EmptyGraph);
        }
        if !graph.is_identified() {
            return Err(PackageError::NotIdentified);
        }

        let manifest: Vec<ManifestEntry> = graph.nodes().map(ManifestEntry::from).collect();
        let aggregate_id = IdentityComputer::compute_aggregate_identity(&manifest);
        let has_unresolved_references = graph.has_unresolved_references();
        if has_unresolved_references {
            warn!("Package has unresolved references; required files are missing");
        }
        info!(
            "Assembled package {} with {} files",
            aggregate_id,
            manifest.len()
        );

        Ok(Package {
            manifest,
            aggregate_id,
            message: metadata.message.trim().to_string(),
            author: metadata.author.trim().to_string(),
            project_ref: metadata.project_ref.trim().to_string(),
            created_at,
            has_unresolved_references,
        })
    }
}
