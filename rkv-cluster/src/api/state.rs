//! Shared application state for API handlers.

use crate::raft::ClusterNode;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state passed to all handlers.
pub struct AppState {
    /// The node this control plane fronts.
    pub node: Arc<ClusterNode>,
    /// Server start time.
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state.
    pub fn new(node: Arc<ClusterNode>) -> Self {
        Self {
            node,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
