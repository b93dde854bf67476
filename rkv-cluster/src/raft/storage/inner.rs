//! In-memory mirror of the log directory and the open append handle.

use crate::types::{ClusterEntry, ClusterLogId, ClusterVote};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write as IoWrite};
use std::path::PathBuf;

use super::persistence::PersistenceOps;
use super::segment::SegmentFiles;

/// Index span covered by one segment file.
pub const SEGMENT_MAX_ENTRIES: u64 = 1000;

/// First index of the segment that holds `index`.
pub fn segment_start(index: u64) -> u64 {
    (index / SEGMENT_MAX_ENTRIES) * SEGMENT_MAX_ENTRIES
}

/// Everything the log store knows, guarded by the store's lock.
pub struct LogStoreInner {
    /// `<id>-db.log`
    pub dir: PathBuf,
    /// `<id>-db.log/segments`
    pub segments_dir: PathBuf,
    /// Every retained entry, keyed by index.
    pub logs: BTreeMap<u64, ClusterEntry>,
    pub last_purged_log_id: Option<ClusterLogId>,
    pub committed: Option<ClusterLogId>,
    pub vote: Option<ClusterVote>,
    /// Append handle, opened lazily by the first append after open.
    pub active_segment: Option<ActiveSegment>,
}

/// Buffered append handle on the segment receiving new entries.
pub struct ActiveSegment {
    pub first_index: u64,
    pub writer: BufWriter<File>,
}

impl LogStoreInner {
    /// Empty state; call [`initialize`](Self::initialize) to read the directory.
    pub fn new(dir: PathBuf, segments_dir: PathBuf) -> Self {
        Self {
            dir,
            segments_dir,
            logs: BTreeMap::new(),
            last_purged_log_id: None,
            committed: None,
            vote: None,
            active_segment: None,
        }
    }

    /// Load vote, metadata and segments from disk.
    pub fn initialize(&mut self) -> Result<(), std::io::Error> {
        self.discard_partial_rewrites()?;
        self.load_vote()?;
        self.load_meta()?;
        self.replay_segments()?;

        // A partially purged segment still holds entries at or below the purge point.
        if let Some(purged) = self.last_purged_log_id {
            self.logs.retain(|index, _| *index > purged.index);
        }
        Ok(())
    }

    /// Open (or create) the segment covering `index` for appending.
    pub fn open_segment_for(&mut self, index: u64) -> Result<&mut ActiveSegment, std::io::Error> {
        let first_index = segment_start(index);

        let reuse = self
            .active_segment
            .as_ref()
            .is_some_and(|s| s.first_index == first_index);

        if !reuse {
            if let Some(previous) = self.active_segment.as_mut() {
                previous.writer.flush()?;
                previous.writer.get_ref().sync_all()?;
            }

            let path = self.segment_path(first_index);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            self.active_segment = Some(ActiveSegment {
                first_index,
                writer: BufWriter::new(file),
            });
        }

        self.active_segment
            .as_mut()
            .ok_or_else(|| std::io::Error::other("active segment missing after open"))
    }

    /// Whether the append handle points at the segment starting at `first_index`.
    pub fn is_active_segment(&self, first_index: u64) -> bool {
        self.active_segment
            .as_ref()
            .map(|s| s.first_index == first_index)
            .unwrap_or(false)
    }
}
