//! Request and response bodies of the backend API.
//!
//! The backend speaks snake_case JSON. Commits are uploaded as multipart
//! forms: `message`, `author`, `branch`, `aggregate_id` and `manifest` text
//! fields followed by one `files` part per packaged file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freezefork_core::{ManifestEntry, Package};

/// Branch every commit is recorded on.
pub const DEFAULT_BRANCH: &str = "main";

/// A project on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateProjectRequest<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthResponse {
    #[serde(default)]
    pub status: String,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.to_ascii_lowercase().as_str(), "ok" | "healthy")
    }
}

/// Manifest sent alongside the uploaded files.
#[derive(Debug, Serialize)]
pub(crate) struct CommitManifest<'a> {
    pub aggregate_id: String,
    pub created_at: DateTime<Utc>,
    pub has_unresolved_references: bool,
    pub files: Vec<CommitManifestFile<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommitManifestFile<'a> {
    pub path: &'a str,
    pub role: &'static str,
    pub content_id: Option<String>,
    pub size: u64,
    pub exists: bool,
}

impl<'a> CommitManifest<'a> {
    pub fn from_package(package: &'a Package) -> Self {
        Self {
            aggregate_id: package.aggregate_id().to_hex(),
            created_at: package.created_at(),
            has_unresolved_references: package.has_unresolved_references(),
            files: package.manifest().iter().map(CommitManifestFile::from).collect(),
        }
    }
}

impl<'a> From<&'a ManifestEntry> for CommitManifestFile<'a> {
    fn from(entry: &'a ManifestEntry) -> Self {
        Self {
            path: entry.path.as_str(),
            role: entry.role.as_str(),
            content_id: entry.content_id.as_ref().map(|id| id.to_hex()),
            size: entry.size,
            exists: entry.exists,
        }
    }
}

/// Commit acknowledgement. Older backends nest the commit record; newer ones
/// answer with a flat `commitId`/`acceptedAt` body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SubmitResponse {
    Nested {
        commit: CommitRecord,
        #[serde(default, alias = "filesUploaded")]
        files_uploaded: usize,
    },
    Flat {
        #[serde(alias = "commitId")]
        commit_id: String,
        #[serde(default, alias = "acceptedAt")]
        accepted_at: Option<DateTime<Utc>>,
        #[serde(default, alias = "filesUploaded")]
        files_uploaded: Option<usize>,
    },
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitRecord {
    pub id: String,
    #[serde(default, alias = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub commit_id: String,
    pub files_uploaded: usize,
    /// Server-side acceptance time, when the backend reports one.
    pub accepted_at: Option<DateTime<Utc>>,
}

impl SubmitResponse {
    /// `sent` is the number of file parts uploaded, used when the backend
    /// does not report a count.
    pub fn into_result(self, sent: usize) -> CommitResult {
        match self {
            SubmitResponse::Nested {
                commit,
                files_uploaded,
            } => CommitResult {
                commit_id: commit.id,
                files_uploaded,
                accepted_at: commit.created_at,
            },
            SubmitResponse::Flat {
                commit_id,
                accepted_at,
                files_uploaded,
            } => CommitResult {
                commit_id,
                files_uploaded: files_uploaded.unwrap_or(sent),
                accepted_at,
            },
        }
    }
}

/// A commit in a project's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, alias = "created_at")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFile {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Error body; `detail` is a string or a list of validation errors.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ErrorBody {
    pub fn into_reason(self) -> Option<String> {
        if let Some(reason) = self.reason {
            return Some(reason);
        }
        match self.detail? {
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}
