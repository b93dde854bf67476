//! Error types for cluster operations.

use crate::types::{ClusterNodeId, MemberNode};
use std::time::Duration;
use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Type alias for OpenRaft Raft errors.
pub type RaftError<E = openraft::error::Infallible> = openraft::error::RaftError<ClusterNodeId, E>;

/// Type alias for OpenRaft RPC errors.
pub type RPCError<E = openraft::error::Infallible> =
    openraft::error::RPCError<ClusterNodeId, MemberNode, RaftError<E>>;

/// Errors that can occur in cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Missing or invalid node identity or address.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A durable store or network listener could not be opened or bound.
    #[error("Failed to acquire {resource}: {cause}")]
    Resource {
        /// What was being acquired (e.g. "log store at ./n1-db.log").
        resource: String,
        /// Reason for the failure.
        cause: String,
    },

    /// A join or membership change failed.
    #[error("Membership error: {0}")]
    Membership(#[from] MembershipError),

    /// Durable state on disk or a replicated command failed to decode.
    #[error("State corruption: {0}")]
    StateCorruption(String),

    /// The control plane did not drain within the grace period.
    #[error("Graceful shutdown did not complete within {grace:?}")]
    ShutdownTimeout {
        /// The grace period that elapsed.
        grace: Duration,
    },

    /// Raft consensus error.
    #[error("Raft error: {0}")]
    Raft(Box<RaftError>),

    /// Not the leader - includes leader hint if known.
    #[error("Not the leader, leader is {leader:?}")]
    NotLeader {
        /// The current leader if known, as `name@addr`.
        leader: Option<String>,
    },

    /// Lifecycle transition that is not allowed from the current state.
    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: &'static str,
        /// Requested state.
        to: &'static str,
    },

    /// Network/RPC error.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClusterError {
    /// Build a resource acquisition error.
    pub fn resource(resource: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Resource {
            resource: resource.into(),
            cause: cause.to_string(),
        }
    }

    /// Classify a failure to open a durable store.
    ///
    /// Undecodable content (`InvalidData`) is corruption; anything else is a
    /// resource that could not be acquired.
    pub fn open_store(store: impl Into<String>, e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::InvalidData {
            Self::StateCorruption(format!("{}: {}", store.into(), e))
        } else {
            Self::resource(store, e)
        }
    }

    /// Whether this error must stop the node rather than be reported and survived.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Resource { .. } | Self::StateCorruption(_)
        )
    }
}

/// Errors from admitting a member into the cluster.
#[derive(Debug, Error)]
pub enum MembershipError {
    /// Membership changes are only accepted by the leader.
    #[error("this node is not the leader (leader: {})", leader.as_deref().unwrap_or("unknown"))]
    NotLeader {
        /// The current leader if known, as `name@addr`.
        leader: Option<String>,
    },

    /// The node id is already a voting member.
    #[error("node {node_id} is already a voting member")]
    AlreadyMember {
        /// The duplicate node id.
        node_id: String,
    },

    /// Another member already uses the address.
    #[error("address {address} is already used by member {member}")]
    AddressInUse {
        /// The conflicting address.
        address: String,
        /// The member that owns it.
        member: String,
    },

    /// The join request is missing a node id or address.
    #[error("invalid join request: {0}")]
    InvalidRequest(String),

    /// The change did not commit within the allowed time.
    #[error("membership change for {node_id} did not complete within {timeout:?}")]
    Timeout {
        /// The node being admitted.
        node_id: String,
        /// How long we waited.
        timeout: Duration,
    },

    /// OpenRaft refused or failed the change.
    #[error("membership change rejected: {0}")]
    Rejected(String),
}

impl From<RaftError> for ClusterError {
    fn from(e: RaftError) -> Self {
        ClusterError::Raft(Box::new(e))
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        ClusterError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds() {
        assert!(ClusterError::Config("id".into()).is_fatal());
        assert!(ClusterError::resource("log store", "denied").is_fatal());
        assert!(ClusterError::StateCorruption("bad snapshot".into()).is_fatal());
        assert!(
            !ClusterError::Membership(MembershipError::AlreadyMember {
                node_id: "n2".into()
            })
            .is_fatal()
        );
        assert!(
            !ClusterError::ShutdownTimeout {
                grace: Duration::from_secs(30)
            }
            .is_fatal()
        );
    }

    #[test]
    fn membership_messages() {
        let err = MembershipError::NotLeader { leader: None };
        assert_eq!(err.to_string(), "this node is not the leader (leader: unknown)");

        let err = MembershipError::NotLeader {
            leader: Some("n1@127.0.0.1:7000".into()),
        };
        assert!(err.to_string().contains("n1@127.0.0.1:7000"));
    }

    #[test]
    fn undecodable_store_content_is_corruption() {
        let bad = std::io::Error::new(std::io::ErrorKind::InvalidData, "line 3: unknown variant");
        assert!(matches!(
            ClusterError::open_store("log store at ./n1-db.log", bad),
            ClusterError::StateCorruption(msg) if msg.contains("n1-db.log") && msg.contains("line 3")
        ));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(
            ClusterError::open_store("log store at ./n1-db.log", denied),
            ClusterError::Resource { .. }
        ));
    }
}
