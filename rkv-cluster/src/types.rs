//! Type definitions for OpenRaft integration.
//!
//! OpenRaft requires a type configuration that specifies all the concrete types
//! used in the Raft implementation. This module defines the key-value cluster's
//! type configuration, plus the identity types that map operator-facing string
//! node ids onto OpenRaft's integer node ids.

use crate::command::KvCommand;
use crate::state::KvResponse;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Cursor;

/// Raft node ID type for the cluster.
///
/// Derived from the string node id with [`raft_node_id`].
pub type ClusterNodeId = u64;

/// Membership payload carried with every node in the Raft configuration.
///
/// OpenRaft only knows integer ids; the operator-facing string id and the
/// consensus transport address travel alongside them here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberNode {
    /// String node id, as given on the command line.
    pub name: String,
    /// Consensus transport address (host:port).
    pub addr: String,
}

impl MemberNode {
    /// Create a membership payload.
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
        }
    }
}

impl fmt::Display for MemberNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.addr)
    }
}

/// Immutable identity of a node: its string id and consensus bind address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Cluster-unique node id.
    pub id: String,
    /// Consensus transport address.
    pub bind_address: String,
}

impl NodeIdentity {
    /// The Raft node id derived from the string id.
    pub fn raft_id(&self) -> ClusterNodeId {
        raft_node_id(&self.id)
    }

    /// The membership payload advertised for this node.
    pub fn member_node(&self) -> MemberNode {
        MemberNode::new(&self.id, &self.bind_address)
    }
}

/// One entry in the cluster's membership configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    /// String node id.
    pub id: String,
    /// Consensus transport address.
    pub address: String,
    /// Whether the member votes in elections and counts toward quorum.
    pub is_voter: bool,
}

/// Map a string node id onto a Raft node id.
///
/// The mapping is the first 8 bytes of the SHA-256 digest, big endian, and
/// is stable across processes and releases. Zero is reserved.
pub fn raft_node_id(name: &str) -> ClusterNodeId {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes).max(1)
}

// Use the declare_raft_types! macro to define the type configuration.
openraft::declare_raft_types!(
    /// OpenRaft type configuration for the key-value cluster.
    pub TypeConfig:
        D = KvCommand,
        R = KvResponse,
        Node = MemberNode,
);

/// Type alias for Raft instance.
pub type ClusterRaft = openraft::Raft<TypeConfig>;

/// Type alias for log entry.
pub type ClusterEntry = openraft::Entry<TypeConfig>;

/// Type alias for vote.
pub type ClusterVote = openraft::Vote<ClusterNodeId>;

/// Type alias for log ID.
pub type ClusterLogId = openraft::LogId<ClusterNodeId>;

/// Type alias for stored membership.
pub type ClusterStoredMembership = openraft::StoredMembership<ClusterNodeId, MemberNode>;

/// Type alias for snapshot metadata.
pub type ClusterSnapshotMeta = openraft::SnapshotMeta<ClusterNodeId, MemberNode>;

/// Type alias for snapshot.
pub type ClusterSnapshot = openraft::storage::Snapshot<TypeConfig>;

/// Type alias for storage error.
pub type ClusterStorageError = openraft::StorageError<ClusterNodeId>;

/// Type alias for Raft metrics.
pub type ClusterMetrics = openraft::RaftMetrics<ClusterNodeId, MemberNode>;

/// Type alias for client write error.
pub type ClusterClientWriteError = openraft::error::ClientWriteError<ClusterNodeId, MemberNode>;

/// Type alias for raft error with client write error.
pub type ClusterRaftWriteError = openraft::error::RaftError<ClusterNodeId, ClusterClientWriteError>;

/// Information about the leader to forward requests to.
#[derive(Debug, Clone)]
pub struct LeaderInfo {
    /// The leader's Raft node ID.
    pub leader_id: ClusterNodeId,
    /// The leader's string id and address, if known.
    pub leader_node: Option<MemberNode>,
}

impl LeaderInfo {
    /// Human-readable leader description for error messages.
    pub fn describe(&self) -> String {
        match &self.leader_node {
            Some(node) => node.to_string(),
            None => self.leader_id.to_string(),
        }
    }
}

/// Extract forward-to-leader info from a client write error.
///
/// Returns `Some(LeaderInfo)` if the error is a ForwardToLeader error with
/// a known leader ID, `None` otherwise.
pub fn extract_forward_to_leader(error: &ClusterRaftWriteError) -> Option<LeaderInfo> {
    use openraft::error::RaftError;

    match error {
        RaftError::APIError(ClusterClientWriteError::ForwardToLeader(forward)) => {
            forward.leader_id.map(|leader_id| LeaderInfo {
                leader_id,
                leader_node: forward.leader_node.clone(),
            })
        }
        _ => None,
    }
}

/// Whether a client write error means this node is not (or no longer) the leader.
pub fn is_forward_to_leader(error: &ClusterRaftWriteError) -> bool {
    matches!(
        error,
        openraft::error::RaftError::APIError(ClusterClientWriteError::ForwardToLeader(_))
    )
}
