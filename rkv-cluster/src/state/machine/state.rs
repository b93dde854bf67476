//! The replicated key-value state.

use crate::types::{ClusterLogId, ClusterStoredMembership};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The key-value state that gets replicated.
///
/// Serialized as-is into snapshots, so a restored state carries the log id
/// and membership it was taken at.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct KvState {
    /// The key-value map.
    pub data: BTreeMap<String, String>,
    /// Last applied log ID.
    pub last_applied_log: Option<ClusterLogId>,
    /// Last membership configuration.
    pub last_membership: ClusterStoredMembership,
}

impl KvState {
    /// Index of the last applied entry, 0 when nothing has been applied.
    pub fn applied_index(&self) -> u64 {
        self.last_applied_log.map(|log_id| log_id.index).unwrap_or(0)
    }
}
