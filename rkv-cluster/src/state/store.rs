//! Durable snapshot store.
//!
//! Each snapshot lives in its own directory under the store root:
//!
//! ```text
//! <root>/snap-<index:020>-<unix millis:013>/
//!     meta.json    snapshot metadata (last log id, membership, id)
//!     state.json   serialized key-value state
//! ```
//!
//! Snapshots are written into a `.tmp` directory, fsynced, then renamed into
//! place, so a crash never leaves a half-written snapshot visible. Only the
//! newest `retain` snapshots are kept.

use crate::state::StoredSnapshot;
use crate::types::ClusterSnapshotMeta;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const SNAPSHOT_PREFIX: &str = "snap-";
const TMP_SUFFIX: &str = ".tmp";

/// Directory-backed snapshot store with bounded retention.
#[derive(Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    retain: usize,
}

impl SnapshotStore {
    /// Open (or create) a snapshot store rooted at `dir`.
    ///
    /// Leftover `.tmp` directories from an interrupted save are removed.
    pub fn open(dir: impl AsRef<Path>, retain: usize) -> Result<Self, std::io::Error> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(TMP_SUFFIX) {
                tracing::warn!(path = %entry.path().display(), "removing incomplete snapshot");
                fs::remove_dir_all(entry.path())?;
            }
        }

        Ok(Self {
            dir,
            retain: retain.max(1),
        })
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Durably write a snapshot and prune old ones.
    pub fn save(&self, snapshot: &StoredSnapshot) -> Result<PathBuf, std::io::Error> {
        let index = snapshot
            .meta
            .last_log_id
            .map(|log_id| log_id.index)
            .unwrap_or(0);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);

        let name = format!("{}{:020}-{:013}", SNAPSHOT_PREFIX, index, millis);
        let final_path = self.dir.join(&name);
        let temp_path = self.dir.join(format!("{}{}", name, TMP_SUFFIX));

        fs::create_dir_all(&temp_path)?;
        write_synced(&temp_path.join("state.json"), |w| w.write_all(&snapshot.data))?;
        write_synced(&temp_path.join("meta.json"), |w| {
            serde_json::to_writer(w, &snapshot.meta)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        if final_path.exists() {
            fs::remove_dir_all(&final_path)?;
        }
        fs::rename(&temp_path, &final_path)?;
        sync_dir(&self.dir)?;

        tracing::info!(
            index,
            path = %final_path.display(),
            "saved snapshot"
        );

        self.prune()?;
        Ok(final_path)
    }

    /// Load the newest snapshot, if any.
    pub fn load_latest(&self) -> Result<Option<StoredSnapshot>, std::io::Error> {
        let Some(path) = self.list()?.pop() else {
            return Ok(None);
        };

        let meta_file = File::open(path.join("meta.json"))?;
        let meta: ClusterSnapshotMeta = serde_json::from_reader(BufReader::new(meta_file))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut data = Vec::new();
        File::open(path.join("state.json"))?.read_to_end(&mut data)?;

        tracing::info!(
            path = %path.display(),
            snapshot_id = %meta.snapshot_id,
            "loaded snapshot"
        );

        Ok(Some(StoredSnapshot { meta, data }))
    }

    /// Completed snapshot directories, oldest first.
    pub fn list(&self) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(SNAPSHOT_PREFIX)
                && !name.ends_with(TMP_SUFFIX)
                && entry.file_type()?.is_dir()
            {
                snapshots.push(entry.path());
            }
        }
        // Zero-padded names sort by index, then by time.
        snapshots.sort();
        Ok(snapshots)
    }

    fn prune(&self) -> Result<(), std::io::Error> {
        let snapshots = self.list()?;
        if snapshots.len() <= self.retain {
            return Ok(());
        }

        let excess = snapshots.len() - self.retain;
        for path in &snapshots[..excess] {
            tracing::debug!(path = %path.display(), "pruning snapshot");
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }
}

fn write_synced<F>(path: &Path, write: F) -> Result<(), std::io::Error>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), std::io::Error>,
{
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn sync_dir(dir: &Path) -> Result<(), std::io::Error> {
    // Directory fsync is unsupported on some platforms; the rename is still atomic.
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClusterStoredMembership;
    use openraft::{CommittedLeaderId, LogId};
    use tempfile::TempDir;

    fn snapshot_at(index: u64) -> StoredSnapshot {
        StoredSnapshot {
            meta: ClusterSnapshotMeta {
                last_log_id: Some(LogId::new(CommittedLeaderId::new(1, 1), index)),
                last_membership: ClusterStoredMembership::default(),
                snapshot_id: format!("snap-{}", index),
            },
            data: format!("{{\"index\":{}}}", index).into_bytes(),
        }
    }

    #[test]
    fn empty_store_has_no_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path(), 3).unwrap();
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn latest_snapshot_wins() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path(), 3).unwrap();

        store.save(&snapshot_at(5)).unwrap();
        store.save(&snapshot_at(12)).unwrap();

        let latest = store.load_latest().unwrap().unwrap();
        assert_eq!(latest.meta.snapshot_id, "snap-12");
        assert_eq!(latest.data, b"{\"index\":12}".to_vec());
    }

    #[test]
    fn retention_prunes_oldest() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path(), 2).unwrap();

        for index in [1, 2, 3, 4] {
            store.save(&snapshot_at(index)).unwrap();
        }

        let remaining = store.list().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(
            store.load_latest().unwrap().unwrap().meta.snapshot_id,
            "snap-4"
        );
    }

    #[test]
    fn incomplete_snapshots_are_discarded_on_open() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("snap-00000000000000000009-0000000000001.tmp");
        fs::create_dir_all(&stale).unwrap();

        let store = SnapshotStore::open(dir.path(), 3).unwrap();
        assert!(!stale.exists());
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = SnapshotStore::open(dir.path(), 3).unwrap();
            store.save(&snapshot_at(7)).unwrap();
        }

        let store = SnapshotStore::open(dir.path(), 3).unwrap();
        let latest = store.load_latest().unwrap().unwrap();
        assert_eq!(latest.meta.last_log_id.map(|l| l.index), Some(7));
    }
}
