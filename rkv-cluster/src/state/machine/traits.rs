//! Trait implementations for OpenRaft integration.

use crate::types::{
    ClusterEntry, ClusterLogId, ClusterSnapshot, ClusterSnapshotMeta, ClusterStorageError,
    ClusterStoredMembership, TypeConfig,
};
use openraft::storage::RaftStateMachine;
use openraft::{RaftSnapshotBuilder, RaftTypeConfig, StorageIOError};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::KvStateMachine;
use super::state::KvState;
use super::types::{KvResponse, StoredSnapshot};

impl KvStateMachine {
    /// Write a snapshot to the durable store, when there is one.
    fn persist_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), ClusterStorageError> {
        if let Some(store) = &self.store {
            store
                .save(snapshot)
                .map_err(|e| StorageIOError::write_snapshot(Some(snapshot.meta.signature()), &e))?;
        }
        Ok(())
    }
}

/// Implementation of OpenRaft's snapshot builder interface.
///
/// Builds a consistent snapshot of the current key-value state for
/// log compaction and state transfer to new nodes.
impl RaftSnapshotBuilder<TypeConfig> for Arc<KvStateMachine> {
    async fn build_snapshot(&mut self) -> Result<ClusterSnapshot, ClusterStorageError> {
        let snapshot = self.snapshot().await;

        let data = snapshot
            .to_bytes()
            .map_err(|e| StorageIOError::read_state_machine(&e))?;

        let last_applied_log = snapshot.last_applied_log();
        let last_membership = snapshot.last_membership().clone();
        snapshot.release();

        let mut current_snapshot = self.current_snapshot.write().await;

        let snapshot_idx = self.snapshot_idx.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot_id = if let Some(last) = last_applied_log {
            format!("{}-{}-{}", last.leader_id, last.index, snapshot_idx)
        } else {
            format!("--{}", snapshot_idx)
        };

        let meta = ClusterSnapshotMeta {
            last_log_id: last_applied_log,
            last_membership,
            snapshot_id,
        };

        let stored = StoredSnapshot {
            meta: meta.clone(),
            data: data.clone(),
        };
        self.persist_snapshot(&stored)?;

        tracing::info!(
            snapshot_id = %meta.snapshot_id,
            size = data.len(),
            "built snapshot"
        );

        *current_snapshot = Some(stored);

        Ok(ClusterSnapshot {
            meta,
            snapshot: Box::new(Cursor::new(data)),
        })
    }
}

/// Implementation of OpenRaft's state machine interface.
///
/// Applies committed log entries to the key-value state deterministically.
/// All nodes apply the same sequence of commands, ensuring consistent
/// state across the cluster.
impl RaftStateMachine<TypeConfig> for Arc<KvStateMachine> {
    type SnapshotBuilder = Self;

    async fn applied_state(
        &mut self,
    ) -> Result<(Option<ClusterLogId>, ClusterStoredMembership), ClusterStorageError> {
        let state = self.state.read().await;
        Ok((state.last_applied_log, state.last_membership.clone()))
    }

    async fn apply<I>(&mut self, entries: I) -> Result<Vec<KvResponse>, ClusterStorageError>
    where
        I: IntoIterator<Item = ClusterEntry> + Send,
    {
        Ok(self.apply_entries(entries).await)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        Arc::clone(self)
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Box<<TypeConfig as RaftTypeConfig>::SnapshotData>, ClusterStorageError> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &ClusterSnapshotMeta,
        snapshot: Box<<TypeConfig as RaftTypeConfig>::SnapshotData>,
    ) -> Result<(), ClusterStorageError> {
        tracing::info!(
            snapshot_id = %meta.snapshot_id,
            snapshot_size = snapshot.get_ref().len(),
            "installing snapshot"
        );

        let new_snapshot = StoredSnapshot {
            meta: meta.clone(),
            data: snapshot.into_inner(),
        };

        let new_state: KvState = serde_json::from_slice(&new_snapshot.data)
            .map_err(|e| StorageIOError::read_snapshot(Some(new_snapshot.meta.signature()), &e))?;

        self.persist_snapshot(&new_snapshot)?;

        let mut state = self.state.write().await;
        *state = new_state;
        state.last_applied_log = meta.last_log_id;
        state.last_membership = meta.last_membership.clone();

        // Lock snapshot before releasing state lock
        let mut current_snapshot = self.current_snapshot.write().await;
        drop(state);

        *current_snapshot = Some(new_snapshot);
        Ok(())
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> Result<Option<ClusterSnapshot>, ClusterStorageError> {
        match &*self.current_snapshot.read().await {
            Some(snapshot) => {
                let data = snapshot.data.clone();
                Ok(Some(ClusterSnapshot {
                    meta: snapshot.meta.clone(),
                    snapshot: Box::new(Cursor::new(data)),
                }))
            }
            None => Ok(None),
        }
    }
}
