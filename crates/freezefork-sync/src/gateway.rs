//! Backend boundary

use freezefork_core::Package;

use crate::error::SyncError;
use crate::wire::{CommitResult, CommitSummary, ProjectRef};

/// Remote repository of projects and commits.
///
/// Every call is a fresh request with no state kept between calls, and
/// failures are returned rather than retried.
#[async_trait::async_trait]
pub trait SyncGateway: Send + Sync {
    /// Whether the backend reports itself healthy.
    async fn health_check(&self) -> Result<bool, SyncError>;

    async fn list_projects(&self) -> Result<Vec<ProjectRef>, SyncError>;

    async fn create_project(&self, name: &str) -> Result<ProjectRef, SyncError> {
        self.create_project_with_description(name, None).await
    }

    async fn create_project_with_description(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<ProjectRef, SyncError>;

    /// Upload `package` as a new commit of `project`.
    ///
    /// The package is only read; after a failure the same package can be
    /// submitted again.
    async fn submit(&self, package: &Package, project: &ProjectRef)
    -> Result<CommitResult, SyncError>;

    async fn list_commits(&self, project_id: &str) -> Result<Vec<CommitSummary>, SyncError>;
}
