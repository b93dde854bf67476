//! Mutations of the entry log: append, purge from the front, truncate the back.

use crate::types::{ClusterEntry, ClusterLogId};
use std::fs;
use std::io::Write as IoWrite;

use super::inner::{LogStoreInner, SEGMENT_MAX_ENTRIES, segment_start};
use super::persistence::PersistenceOps;
use super::segment::SegmentFiles;

/// Entry log mutations. Each returns only once the change is on disk.
pub trait EntryOps {
    /// Append entries to the segments covering their indexes, then fsync.
    fn append_entries(&mut self, entries: Vec<ClusterEntry>) -> Result<(), std::io::Error>;

    /// Drop entries up to and including `log_id`.
    ///
    /// Segments lying entirely at or below the purge point are deleted; a
    /// segment straddling it keeps its file and is filtered on replay.
    fn purge_entries(&mut self, log_id: ClusterLogId) -> Result<(), std::io::Error>;

    /// Drop entries at and after `log_id`.
    fn truncate_entries(&mut self, log_id: ClusterLogId) -> Result<(), std::io::Error>;
}

impl EntryOps for LogStoreInner {
    fn append_entries(&mut self, entries: Vec<ClusterEntry>) -> Result<(), std::io::Error> {
        if entries.is_empty() {
            return Ok(());
        }

        for entry in entries {
            let active = self.open_segment_for(entry.log_id.index)?;
            serde_json::to_writer(&mut active.writer, &entry)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            active.writer.write_all(b"\n")?;

            self.logs.insert(entry.log_id.index, entry);
        }

        if let Some(active) = &mut self.active_segment {
            active.writer.flush()?;
            active.writer.get_ref().sync_all()?;
        }

        Ok(())
    }

    fn purge_entries(&mut self, log_id: ClusterLogId) -> Result<(), std::io::Error> {
        let purge_index = log_id.index;

        self.last_purged_log_id = Some(log_id);
        self.logs.retain(|index, _| *index > purge_index);

        // The purge point has to be durable before any segment goes away.
        self.save_meta()?;

        for segment in self.segments()? {
            if segment.first_index + SEGMENT_MAX_ENTRIES - 1 > purge_index {
                continue;
            }

            if self.is_active_segment(segment.first_index) {
                self.active_segment = None;
            }
            fs::remove_file(&segment.path)?;
        }

        Ok(())
    }

    fn truncate_entries(&mut self, log_id: ClusterLogId) -> Result<(), std::io::Error> {
        let truncate_index = log_id.index;
        self.logs.retain(|index, _| *index < truncate_index);

        let boundary = segment_start(truncate_index);

        for segment in self.segments()? {
            if segment.first_index < boundary {
                continue;
            }

            // Reopened lazily by the next append.
            if self.is_active_segment(segment.first_index) {
                self.active_segment = None;
            }

            if segment.first_index > boundary {
                fs::remove_file(&segment.path)?;
                continue;
            }

            let kept: Vec<ClusterEntry> = self
                .logs
                .range(segment.first_index..truncate_index)
                .map(|(_, entry)| entry.clone())
                .collect();

            if kept.is_empty() {
                fs::remove_file(&segment.path)?;
            } else {
                self.rewrite_segment(segment.first_index, &kept)?;
            }
        }

        Ok(())
    }
}
