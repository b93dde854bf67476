//! Types for key-value state management.

use crate::types::ClusterSnapshotMeta;
use serde::{Deserialize, Serialize};

/// Response from applying a command to the state machine.
///
/// `Set` reports the value it replaced, `Delete` the value it removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvResponse {
    /// Value held by the key before the command, if any.
    pub previous: Option<String>,
}

impl KvResponse {
    /// Response for entries that carry no command (blank, membership).
    pub fn none() -> Self {
        Self { previous: None }
    }

    /// Response carrying the value a command displaced.
    pub fn previous(previous: Option<String>) -> Self {
        Self { previous }
    }
}

/// Stored snapshot data.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    /// Snapshot metadata.
    pub meta: ClusterSnapshotMeta,
    /// Serialized state data.
    pub data: Vec<u8>,
}
