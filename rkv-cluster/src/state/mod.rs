//! Raft state machine implementation.
//!
//! The state machine receives committed log entries (KvCommands) and
//! applies them to produce the replicated key-value map. All nodes apply the
//! same commands in the same order, ensuring consistent state.

mod machine;
mod snapshot;
mod store;

pub use machine::{KvResponse, KvState, KvStateMachine, StoredSnapshot};
pub use snapshot::{KvSnapshot, decode_state};
pub use store::SnapshotStore;
