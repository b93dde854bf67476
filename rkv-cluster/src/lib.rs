//! Raft-replicated key-value store node.
//!
//! Each node holds a string-to-string map replicated through the Raft
//! consensus algorithm via OpenRaft, a durable log and snapshot store, and an
//! HTTP control plane through which new nodes ask to be admitted.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      NodeRuntime                            │
//! │                                                             │
//! │  ┌──────────────────┐          ┌─────────────────────────┐  │
//! │  │  ApiServer       │  join,   │  ClusterNode            │  │
//! │  │  POST /join      │──kv ────►│  ┌─────────┐            │  │
//! │  │  /kv, /status    │          │  │  Raft   │◄── /raft/* ─┼──┼── peers
//! │  └──────────────────┘          │  └────┬────┘            │  │
//! │                                │  ┌────▼────┐ ┌────────┐ │  │
//! │                                │  │KvState  │ │LogStore│ │  │
//! │                                │  │Machine  │ │        │ │  │
//! │                                │  └────┬────┘ └────────┘ │  │
//! │                                │  ┌────▼─────────┐       │  │
//! │                                │  │SnapshotStore │       │  │
//! │                                │  └──────────────┘       │  │
//! │                                └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rkv_cluster::{KvCommand, NodeConfig, NodeRuntime};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = NodeConfig::builder()
//!     .node_id("n1")
//!     .raft_addr("127.0.0.1:7000")
//!     .http_addr("127.0.0.1:8080")
//!     .data_dir("./data")
//!     .build()?;
//!
//! let runtime = NodeRuntime::launch(config).await?;
//! runtime.node().write(KvCommand::set("color", "red")).await?;
//!
//! let token = CancellationToken::new();
//! runtime.run(token).await?;
//! ```

pub mod api;
pub mod command;
pub mod config;
pub mod error;
pub mod network;
pub mod observability;
pub mod raft;
pub mod runtime;
pub mod state;
pub mod types;

// Re-export main types
pub use command::KvCommand;
pub use config::{NodeConfig, NodeConfigBuilder};
pub use error::{ClusterError, ClusterResult, MembershipError};
pub use raft::{ClusterNode, NodeState};
pub use runtime::NodeRuntime;
pub use state::{KvResponse, KvStateMachine};
pub use types::{ClusterMember, ClusterNodeId, MemberNode, NodeIdentity, TypeConfig};
