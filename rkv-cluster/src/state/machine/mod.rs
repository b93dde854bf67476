//! Raft state machine for the replicated key-value map.
//!
//! The state machine is the core of the node's replicated state. It:
//! - Receives committed log entries (commands)
//! - Applies them deterministically to produce consistent state
//! - Supports snapshots for log compaction and state transfer
//!
//! ## Module Structure
//!
//! - `types`: Response and stored snapshot types
//! - `state`: The replicated KvState
//! - `apply`: Command application logic
//! - `traits`: OpenRaft trait implementations

mod apply;
mod state;
mod traits;
mod types;

pub use state::KvState;
pub use types::{KvResponse, StoredSnapshot};

use crate::error::{ClusterError, ClusterResult};
use crate::state::{KvSnapshot, SnapshotStore, decode_state};
use crate::types::{ClusterEntry, ClusterLogId};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::atomic::AtomicU64;
use tokio::sync::RwLock;

/// The Raft state machine.
///
/// This struct holds the replicated key-value state and provides
/// thread-safe access for reads and applies.
#[derive(Debug, Default)]
pub struct KvStateMachine {
    /// The replicated state.
    state: RwLock<KvState>,
    /// Snapshot index counter.
    snapshot_idx: AtomicU64,
    /// Current snapshot.
    current_snapshot: RwLock<Option<StoredSnapshot>>,
    /// Durable snapshot store, absent for purely in-memory machines.
    store: Option<SnapshotStore>,
}

impl KvStateMachine {
    /// Create an empty in-memory state machine.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(KvState::default()),
            snapshot_idx: AtomicU64::new(0),
            current_snapshot: RwLock::new(None),
            store: None,
        }
    }

    /// Create a state machine backed by a durable snapshot store.
    ///
    /// The newest stored snapshot, if any, is restored so that the
    /// consensus engine only replays entries after it.
    pub fn open(store: SnapshotStore) -> ClusterResult<Self> {
        let latest = store
            .load_latest()
            .map_err(|e| {
                ClusterError::open_store(format!("snapshot store at {}", store.dir().display()), e)
            })?;

        let mut state = KvState::default();
        if let Some(snapshot) = &latest {
            state = decode_state(snapshot.data.as_slice())?;
            state.last_applied_log = snapshot.meta.last_log_id;
            state.last_membership = snapshot.meta.last_membership.clone();

            tracing::info!(
                applied_index = state.applied_index(),
                keys = state.data.len(),
                "restored state machine from snapshot"
            );
        }

        Ok(Self {
            state: RwLock::new(state),
            snapshot_idx: AtomicU64::new(0),
            current_snapshot: RwLock::new(latest),
            store: Some(store),
        })
    }

    /// Apply committed entries in order, one response per entry.
    ///
    /// Only the consensus engine calls this.
    pub(crate) async fn apply_entries<I>(&self, entries: I) -> Vec<KvResponse>
    where
        I: IntoIterator<Item = ClusterEntry>,
    {
        let mut state = self.state.write().await;
        entries
            .into_iter()
            .map(|entry| apply::apply_entry(&mut state, entry))
            .collect()
    }

    /// Capture an immutable copy of the current state.
    ///
    /// The read lock is held only while copying.
    pub async fn snapshot(&self) -> KvSnapshot {
        let state = self.state.read().await;
        KvSnapshot::new(state.clone())
    }

    /// Replace the entire state with a serialized snapshot.
    ///
    /// On a decode failure the current state is left untouched and
    /// [`ClusterError::StateCorruption`] is returned.
    pub async fn restore<R: Read>(&self, source: R) -> ClusterResult<()> {
        let new_state = decode_state(source)?;
        let mut state = self.state.write().await;
        *state = new_state;
        Ok(())
    }

    /// Look up a key in the local replica.
    ///
    /// Reads are served from local state and may lag the leader.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.state.read().await.data.get(key).cloned()
    }

    /// Copy of every key-value pair in the local replica.
    pub async fn entries(&self) -> BTreeMap<String, String> {
        self.state.read().await.data.clone()
    }

    /// Number of keys in the local replica.
    pub async fn len(&self) -> usize {
        self.state.read().await.data.len()
    }

    /// Whether the local replica holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.data.is_empty()
    }

    /// Log id of the last applied entry.
    pub async fn last_applied(&self) -> Option<ClusterLogId> {
        self.state.read().await.last_applied_log
    }

    #[cfg(test)]
    pub(crate) async fn apply_commands(
        &self,
        commands: Vec<crate::command::KvCommand>,
    ) -> Vec<KvResponse> {
        use openraft::{CommittedLeaderId, EntryPayload, LogId};

        let start = self.state.read().await.applied_index() + 1;
        let entries = commands.into_iter().enumerate().map(|(i, cmd)| ClusterEntry {
            log_id: LogId::new(CommittedLeaderId::new(1, 1), start + i as u64),
            payload: EntryPayload::Normal(cmd),
        });
        self.apply_entries(entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::KvCommand;
    use tempfile::TempDir;

    fn workload(n: usize) -> Vec<KvCommand> {
        (0..n)
            .map(|i| match i % 3 {
                0 | 1 => KvCommand::set(format!("k{}", i % 7), format!("v{}", i)),
                _ => KvCommand::delete(format!("k{}", (i + 3) % 7)),
            })
            .collect()
    }

    #[tokio::test]
    async fn snapshot_then_replay_matches_full_apply() {
        let commands = workload(40);

        for split in 0..=commands.len() {
            let full = KvStateMachine::new();
            full.apply_commands(commands.clone()).await;

            let prefix = KvStateMachine::new();
            prefix.apply_commands(commands[..split].to_vec()).await;
            let bytes = prefix.snapshot().await.to_bytes().expect("serialize");

            let restored = KvStateMachine::new();
            restored.restore(bytes.as_slice()).await.expect("restore");
            restored.apply_commands(commands[split..].to_vec()).await;

            assert_eq!(
                restored.entries().await,
                full.entries().await,
                "diverged after restoring at {}",
                split
            );
        }
    }

    #[tokio::test]
    async fn restore_replaces_rather_than_merges() {
        let source = KvStateMachine::new();
        source.apply_commands(vec![KvCommand::set("a", "1")]).await;
        let bytes = source.snapshot().await.to_bytes().expect("serialize");

        let target = KvStateMachine::new();
        target
            .apply_commands(vec![KvCommand::set("b", "2"), KvCommand::set("c", "3")])
            .await;
        target.restore(bytes.as_slice()).await.expect("restore");

        let entries = target.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get("a").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn corrupt_restore_keeps_previous_state() {
        let machine = KvStateMachine::new();
        machine.apply_commands(vec![KvCommand::set("k", "v")]).await;

        let err = machine.restore(&b"{broken"[..]).await.unwrap_err();
        assert!(matches!(err, ClusterError::StateCorruption(_)));
        assert_eq!(machine.get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn snapshot_is_isolated_from_later_applies() {
        let machine = KvStateMachine::new();
        machine.apply_commands(vec![KvCommand::set("k", "v1")]).await;

        let snapshot = machine.snapshot().await;
        machine.apply_commands(vec![KvCommand::set("k", "v2")]).await;

        assert_eq!(snapshot.data().get("k").map(String::as_str), Some("v1"));
        assert_eq!(machine.get("k").await.as_deref(), Some("v2"));
        snapshot.release();
    }

    #[tokio::test]
    async fn apply_advances_last_applied() {
        let machine = KvStateMachine::new();
        assert!(machine.last_applied().await.is_none());

        let responses = machine
            .apply_commands(vec![KvCommand::set("k", "v"), KvCommand::delete("k")])
            .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1].previous.as_deref(), Some("v"));
        assert_eq!(machine.last_applied().await.map(|l| l.index), Some(2));
        assert!(machine.is_empty().await);
    }

    #[tokio::test]
    async fn open_restores_latest_stored_snapshot() {
        let dir = TempDir::new().unwrap();

        let source = KvStateMachine::new();
        source
            .apply_commands(vec![KvCommand::set("x", "1"), KvCommand::set("y", "2")])
            .await;
        let snapshot = source.snapshot().await;

        let store = SnapshotStore::open(dir.path(), 3).unwrap();
        store
            .save(&StoredSnapshot {
                meta: crate::types::ClusterSnapshotMeta {
                    last_log_id: snapshot.last_applied_log(),
                    last_membership: snapshot.last_membership().clone(),
                    snapshot_id: "test".to_string(),
                },
                data: snapshot.to_bytes().unwrap(),
            })
            .unwrap();

        let reopened =
            KvStateMachine::open(SnapshotStore::open(dir.path(), 3).unwrap()).expect("open");
        assert_eq!(reopened.len().await, 2);
        assert_eq!(reopened.last_applied().await.map(|l| l.index), Some(2));
    }

    #[tokio::test]
    async fn unreadable_snapshot_meta_is_corruption() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path(), 3).unwrap();
        let saved = store
            .save(&StoredSnapshot {
                meta: crate::types::ClusterSnapshotMeta {
                    last_log_id: None,
                    last_membership: Default::default(),
                    snapshot_id: "torn".to_string(),
                },
                data: KvStateMachine::new().snapshot().await.to_bytes().unwrap(),
            })
            .unwrap();
        std::fs::write(saved.join("meta.json"), b"{\"last_log_id\":").unwrap();

        let err = KvStateMachine::open(SnapshotStore::open(dir.path(), 3).unwrap()).unwrap_err();
        assert!(matches!(err, ClusterError::StateCorruption(_)), "{err}");
        assert!(err.is_fatal());
    }
}
