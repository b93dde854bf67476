//! Network layer for Raft RPC communication.
//!
//! Consensus messages travel as JSON over HTTP/1.1: the sender POSTs the
//! serialized openraft request and the receiver answers with the serialized
//! `Result` openraft produced.
//!
//! | Path              | Message          |
//! |-------------------|------------------|
//! | `/raft/append`    | AppendEntries    |
//! | `/raft/vote`      | Vote             |
//! | `/raft/snapshot`  | InstallSnapshot  |

mod client;
mod server;

pub use client::{RaftNetworkClient, RaftPeerConnection};
pub use server::RaftRpcServer;

/// Path of the AppendEntries RPC.
pub const APPEND_PATH: &str = "/raft/append";
/// Path of the Vote RPC.
pub const VOTE_PATH: &str = "/raft/vote";
/// Path of the InstallSnapshot RPC.
pub const SNAPSHOT_PATH: &str = "/raft/snapshot";
