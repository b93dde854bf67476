//! The node's Raft log: `<data_dir>/<id>-db.log/`.
//!
//! ```text
//! <id>-db.log/
//! ├── vote.json                 current term, voted-for node, committed flag
//! ├── meta.json                 purge point and last committed log id
//! └── segments/
//!     ├── seg_000000000000.log  indexes 0..=999
//!     └── seg_000000001000.log  indexes 1000..=1999
//! ```
//!
//! Segments are append-only NDJSON, one `ClusterEntry` per line. An entry
//! always lands in the segment its index maps to, so a purge deletes whole
//! files and a truncate rewrites at most one. The full log is mirrored in
//! memory; disk is only read on open.
//!
//! Opening tolerates exactly one kind of damage: a torn last line in the
//! newest segment, left by a crash mid-append. Anything else that fails to
//! parse is returned as [`std::io::ErrorKind::InvalidData`].

mod entries;
mod inner;
mod persistence;
mod segment;

use crate::types::{ClusterEntry, ClusterLogId, ClusterStorageError, ClusterVote, TypeConfig};
use entries::EntryOps;
use inner::LogStoreInner;
use openraft::storage::{LogFlushed, RaftLogStorage};
use openraft::{LogState, RaftLogReader, StorageIOError};
use persistence::PersistenceOps;
use std::fmt::Debug;
use std::fs;
use std::ops::RangeBounds;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Durable storage for Raft log entries, vote and commit state.
///
/// Every append is flushed and fsynced before openraft is told the entries
/// are durable. The handle is cheap to clone; clones share one store.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<RwLock<LogStoreInner>>,
}

impl LogStore {
    /// Create or open the log under `dir`.
    ///
    /// Fails with `InvalidData` when a segment or state file is corrupt.
    pub fn open(dir: PathBuf) -> Result<Self, std::io::Error> {
        fs::create_dir_all(&dir)?;

        let segments_dir = dir.join("segments");
        fs::create_dir_all(&segments_dir)?;

        let mut inner = LogStoreInner::new(dir, segments_dir);
        inner.initialize()?;

        tracing::info!(
            dir = %inner.dir.display(),
            entries = inner.logs.len(),
            "opened log store"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
        })
    }

    /// Entry at `index`, if it is still in the log.
    pub async fn get_entry(&self, index: u64) -> Option<ClusterEntry> {
        self.inner.read().await.logs.get(&index).cloned()
    }

    /// Index of the oldest retained entry, 0 for an empty log.
    pub async fn first_index(&self) -> u64 {
        let inner = self.inner.read().await;
        inner.logs.keys().next().copied().unwrap_or(0)
    }

    /// Index of the newest entry, 0 for an empty log.
    ///
    /// A fully purged log reports the purge point.
    pub async fn last_index(&self) -> u64 {
        let inner = self.inner.read().await;
        inner
            .logs
            .keys()
            .next_back()
            .copied()
            .or(inner.last_purged_log_id.map(|log_id| log_id.index))
            .unwrap_or(0)
    }
}

impl Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore").finish_non_exhaustive()
    }
}

/// Implementation of OpenRaft's log reader interface.
impl RaftLogReader<TypeConfig> for LogStore {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug>(
        &mut self,
        range: RB,
    ) -> Result<Vec<ClusterEntry>, ClusterStorageError> {
        let inner = self.inner.read().await;
        let entries: Vec<ClusterEntry> = inner.logs.range(range).map(|(_, e)| e.clone()).collect();
        Ok(entries)
    }
}

/// Implementation of OpenRaft's log storage interface.
impl RaftLogStorage<TypeConfig> for LogStore {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, ClusterStorageError> {
        let inner = self.inner.read().await;

        let last_log_id = inner.logs.values().last().map(|e| e.log_id);
        let last_purged_log_id = inner.last_purged_log_id;

        // If no logs but we have a purged log id, use that
        let last_log_id = last_log_id.or(last_purged_log_id);

        Ok(LogState {
            last_purged_log_id,
            last_log_id,
        })
    }

    async fn save_committed(
        &mut self,
        committed: Option<ClusterLogId>,
    ) -> Result<(), ClusterStorageError> {
        let mut inner = self.inner.write().await;
        inner.committed = committed;
        inner
            .save_meta()
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<ClusterLogId>, ClusterStorageError> {
        let inner = self.inner.read().await;
        Ok(inner.committed)
    }

    async fn save_vote(&mut self, vote: &ClusterVote) -> Result<(), ClusterStorageError> {
        let mut inner = self.inner.write().await;
        inner
            .save_vote_to_disk(vote)
            .map_err(|e| StorageIOError::write_vote(&e))?;
        inner.vote = Some(*vote);
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<ClusterVote>, ClusterStorageError> {
        let inner = self.inner.read().await;
        Ok(inner.vote)
    }

    async fn append<I>(
        &mut self,
        entries: I,
        callback: LogFlushed<TypeConfig>,
    ) -> Result<(), ClusterStorageError>
    where
        I: IntoIterator<Item = ClusterEntry>,
    {
        let mut inner = self.inner.write().await;

        let entries: Vec<ClusterEntry> = entries.into_iter().collect();
        if let Err(e) = inner.append_entries(entries) {
            callback.log_io_completed(Err(std::io::Error::new(e.kind(), e.to_string())));
            return Err(StorageIOError::write_logs(&e).into());
        }

        callback.log_io_completed(Ok(()));
        Ok(())
    }

    async fn truncate(&mut self, log_id: ClusterLogId) -> Result<(), ClusterStorageError> {
        tracing::debug!(%log_id, "truncating log");
        let mut inner = self.inner.write().await;
        inner
            .truncate_entries(log_id)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn purge(&mut self, log_id: ClusterLogId) -> Result<(), ClusterStorageError> {
        tracing::debug!(%log_id, "purging log");
        let mut inner = self.inner.write().await;
        inner
            .purge_entries(log_id)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }
}
