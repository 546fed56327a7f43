//! Gateway error types

use std::path::PathBuf;
use std::time::Duration;

/// Coarse classification of a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    Network,
    Auth,
    ServerRejected,
    Timeout,
    /// A packaged file could not be read back for upload.
    LocalFile,
}

/// Errors from a [`SyncGateway`](crate::SyncGateway) call.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("request to {endpoint} failed: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("not authorized ({status}): {reason}")]
    Auth { status: u16, reason: String },

    #[error("backend rejected the request ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("unexpected response from {endpoint}: {source}")]
    InvalidResponse {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("cannot read {path} for upload: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} changed since it was packaged")]
    ContentChanged { path: PathBuf },
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::Network { .. } | SyncError::InvalidResponse { .. } | SyncError::Client(_) => {
                SyncErrorKind::Network
            }
            SyncError::Timeout { .. } => SyncErrorKind::Timeout,
            SyncError::Auth { .. } => SyncErrorKind::Auth,
            SyncError::Rejected { .. } => SyncErrorKind::ServerRejected,
            SyncError::ReadFile { .. } | SyncError::ContentChanged { .. } => {
                SyncErrorKind::LocalFile
            }
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Network { .. } | SyncError::Timeout { .. } => true,
            SyncError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
