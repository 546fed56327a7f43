//! Scan progress reporting.

use std::time::Duration;

use crate::path::CanonicalPath;

/// Progress information during a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    /// Documents expanded so far.
    pub nodes_visited: u64,
    /// Files discovered so far (expanded or not).
    pub nodes_discovered: u64,
    /// Issues recorded so far.
    pub issues_found: u64,
    /// Document just expanded.
    pub current_path: Option<CanonicalPath>,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate expansion rate in documents per second.
    pub fn nodes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.nodes_visited as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}
