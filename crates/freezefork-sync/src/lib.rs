//! Freezefork Sync: backend gateway
//!
//! Maps packages to the backend's commit uploads and interprets its
//! responses. Retry policy is left to callers.

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod wire;

#[cfg(test)]
pub mod tests;

pub use config::GatewayConfig;
pub use error::{SyncError, SyncErrorKind};
pub use gateway::SyncGateway;
pub use http::HttpGateway;
pub use wire::{CommitFile, CommitResult, CommitSummary, ProjectRef};
