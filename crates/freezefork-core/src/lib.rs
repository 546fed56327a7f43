//! Freezefork Core: assembly dependency resolution and packaging

pub mod path;
pub mod model;
pub mod graph;
pub mod cad;
pub mod builder;
pub mod progress;
pub mod identity;
pub mod package;
pub mod session;
pub mod error;


#[cfg(test)]
pub mod test_utils;

pub use path::{CanonicalPath, PathResolver, ResolvedPath};
pub use model::{NodeId, FileRole, ContentId, FileNode, DependencyEdge, ManifestEntry, IssueKind, ScanIssue};
pub use graph::DependencyGraph;
pub use cad::{CadModel, CadReference, DocumentHandle, InMemoryModel, MapError};
pub use builder::DependencyGraphBuilder;
pub use progress::ScanProgress;
pub use identity::{AggregateId, IdentityComputer, DEFAULT_HASH_WORKERS};
pub use package::{Package, PackageAssembler, PackageMetadata};
pub use session::CadSession;
pub use error::{CadError, GraphBuildError, IdentityError, PackageError, PathResolutionError};
