//! Raft integration module.
//!
//! This module provides the ClusterNode which ties together:
//! - Log storage (RaftLogStorage)
//! - State machine (KvStateMachine)
//! - Network (RaftNetwork over HTTP)
//! - The Raft instance itself
//! - The node lifecycle

mod lifecycle;
mod node;
mod storage;

pub use lifecycle::{Lifecycle, NodeState};
pub use node::ClusterNode;
pub use storage::LogStore;
