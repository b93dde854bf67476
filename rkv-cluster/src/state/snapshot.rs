//! Point-in-time snapshot handle.

use crate::error::{ClusterError, ClusterResult};
use crate::state::KvState;
use crate::types::{ClusterLogId, ClusterStoredMembership};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// An immutable copy of the state machine at one applied log id.
///
/// Produced by [`KvStateMachine::snapshot`](crate::state::KvStateMachine::snapshot).
/// The copy is owned, so persisting it never blocks the state machine.
#[derive(Debug, Clone)]
pub struct KvSnapshot {
    state: KvState,
}

impl KvSnapshot {
    pub(crate) fn new(state: KvState) -> Self {
        Self { state }
    }

    /// Log id of the last entry reflected in this snapshot.
    pub fn last_applied_log(&self) -> Option<ClusterLogId> {
        self.state.last_applied_log
    }

    /// Membership in effect at the snapshot point.
    pub fn last_membership(&self) -> &ClusterStoredMembership {
        &self.state.last_membership
    }

    /// The key-value contents.
    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.state.data
    }

    /// Write the serialized state to `sink`.
    pub fn persist<W: Write>(&self, mut sink: W) -> ClusterResult<()> {
        serde_json::to_writer(&mut sink, &self.state)?;
        sink.flush()?;
        Ok(())
    }

    /// Serialize the state into a buffer.
    pub fn to_bytes(&self) -> ClusterResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.persist(&mut buf)?;
        Ok(buf)
    }

    /// Free the copy.
    pub fn release(self) {
        drop(self);
    }
}

/// Decode a serialized state produced by [`KvSnapshot::persist`].
///
/// A payload that does not decode is reported as state corruption.
pub fn decode_state<R: Read>(source: R) -> ClusterResult<KvState> {
    serde_json::from_reader(source)
        .map_err(|e| ClusterError::StateCorruption(format!("undecodable snapshot: {}", e)))
}
