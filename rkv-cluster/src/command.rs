//! Key-value commands - the operations that go through Raft consensus.
//!
//! Every mutation of the replicated map is one of these commands. Commands are
//! serialized into the Raft log and applied to every node's state machine in
//! commit order.

use serde::{Deserialize, Serialize};

/// Commands that are replicated through Raft consensus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum KvCommand {
    /// Insert or overwrite a key.
    Set {
        /// Key to write.
        key: String,
        /// New value.
        value: String,
    },

    /// Remove a key. Removing a missing key is not an error.
    Delete {
        /// Key to remove.
        key: String,
    },
}

impl KvCommand {
    /// Build a `Set` command.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Build a `Delete` command.
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// Get a human-readable name for this command type.
    pub fn name(&self) -> &'static str {
        match self {
            KvCommand::Set { .. } => "Set",
            KvCommand::Delete { .. } => "Delete",
        }
    }

    /// The key this command touches.
    pub fn key(&self) -> &str {
        match self {
            KvCommand::Set { key, .. } | KvCommand::Delete { key } => key,
        }
    }
}
