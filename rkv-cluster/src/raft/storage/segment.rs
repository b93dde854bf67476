//! Segment files under `<id>-db.log/segments/`.
//!
//! `seg_<N>.log` holds the entries whose index falls in `[N, N + 1000)`,
//! one serialized `ClusterEntry` per newline-terminated line. Appends only
//! ever touch the segment with the highest `N`, so after a crash the only
//! line that can be incomplete is the last line of that segment. Replay
//! cuts such a line off; a bad line anywhere else is reported as
//! `InvalidData` and the store refuses to open.

use crate::types::ClusterEntry;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write as IoWrite};
use std::path::{Path, PathBuf};

use super::inner::{LogStoreInner, SEGMENT_MAX_ENTRIES};

const SEGMENT_PREFIX: &str = "seg_";
const SEGMENT_SUFFIX: &str = ".log";
const REWRITE_SUFFIX: &str = ".tmp";

/// A segment file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    /// Lowest index the segment may hold.
    pub first_index: u64,
    pub path: PathBuf,
}

/// File name of the segment starting at `first_index`.
pub fn segment_name(first_index: u64) -> String {
    format!("{}{:012}{}", SEGMENT_PREFIX, first_index, SEGMENT_SUFFIX)
}

/// First index encoded in a segment file name, `None` for anything else.
pub fn segment_first_index(name: &str) -> Option<u64> {
    name.strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?
        .parse()
        .ok()
}

/// Segment directory access for the log store.
pub trait SegmentFiles {
    /// Path of the segment starting at `first_index`.
    fn segment_path(&self, first_index: u64) -> PathBuf;

    /// Segments on disk, lowest first index first.
    fn segments(&self) -> Result<Vec<SegmentFile>, std::io::Error>;

    /// Delete `.tmp` files left behind by an interrupted rewrite.
    fn discard_partial_rewrites(&self) -> Result<(), std::io::Error>;

    /// Read every segment back into the in-memory log.
    fn replay_segments(&mut self) -> Result<(), std::io::Error>;

    /// Read one segment. Only the newest segment may have a torn tail.
    fn replay_segment(&mut self, segment: &SegmentFile, newest: bool)
        -> Result<(), std::io::Error>;

    /// Replace the segment starting at `first_index` with `entries`.
    fn rewrite_segment(
        &self,
        first_index: u64,
        entries: &[ClusterEntry],
    ) -> Result<(), std::io::Error>;
}

impl SegmentFiles for LogStoreInner {
    fn segment_path(&self, first_index: u64) -> PathBuf {
        self.segments_dir.join(segment_name(first_index))
    }

    fn segments(&self) -> Result<Vec<SegmentFile>, std::io::Error> {
        if !self.segments_dir.exists() {
            return Ok(Vec::new());
        }

        let mut found: Vec<SegmentFile> = fs::read_dir(&self.segments_dir)?
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                let first_index = segment_first_index(path.file_name()?.to_str()?)?;
                Some(SegmentFile { first_index, path })
            })
            .collect();

        found.sort_by_key(|segment| segment.first_index);
        Ok(found)
    }

    fn discard_partial_rewrites(&self) -> Result<(), std::io::Error> {
        if !self.segments_dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(&self.segments_dir)? {
            let path = entry?.path();
            let partial = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(REWRITE_SUFFIX));
            if partial {
                tracing::warn!(path = %path.display(), "removing incomplete segment rewrite");
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn replay_segments(&mut self) -> Result<(), std::io::Error> {
        let segments = self.segments()?;
        let newest = segments.last().map(|segment| segment.first_index);

        for segment in &segments {
            self.replay_segment(segment, Some(segment.first_index) == newest)?;
        }

        tracing::debug!(
            segments = segments.len(),
            entries = self.logs.len(),
            "replayed log segments"
        );
        Ok(())
    }

    fn replay_segment(
        &mut self,
        segment: &SegmentFile,
        newest: bool,
    ) -> Result<(), std::io::Error> {
        let bytes = fs::read(&segment.path)?;
        let mut offset = 0;
        let mut line_no = 0;

        while offset < bytes.len() {
            line_no += 1;
            let rest = &bytes[offset..];
            let (line, next, terminated) = match rest.iter().position(|b| *b == b'\n') {
                Some(end) => (&rest[..end], offset + end + 1, true),
                None => (rest, bytes.len(), false),
            };

            if line.iter().all(u8::is_ascii_whitespace) {
                offset = next;
                continue;
            }

            let parsed = serde_json::from_slice::<ClusterEntry>(line);
            let last_line = next == bytes.len();

            // A line without its newline was never acknowledged, even if it parses.
            let torn = match &parsed {
                Ok(_) => !terminated,
                Err(e) => !terminated || e.is_eof(),
            };
            if newest && last_line && torn {
                cut_torn_tail(&segment.path, offset, bytes.len())?;
                return Ok(());
            }

            let entry = parsed.map_err(|e| {
                std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!("{} line {}: {}", segment.path.display(), line_no, e),
                )
            })?;

            if entry.log_id.index / SEGMENT_MAX_ENTRIES != segment.first_index / SEGMENT_MAX_ENTRIES
            {
                return Err(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!(
                        "{} line {}: index {} outside segment",
                        segment.path.display(),
                        line_no,
                        entry.log_id.index
                    ),
                ));
            }

            self.logs.insert(entry.log_id.index, entry);
            offset = next;
        }

        Ok(())
    }

    fn rewrite_segment(
        &self,
        first_index: u64,
        entries: &[ClusterEntry],
    ) -> Result<(), std::io::Error> {
        debug_assert!(entries.len() as u64 <= SEGMENT_MAX_ENTRIES);

        let path = self.segment_path(first_index);
        let mut staged = path.clone().into_os_string();
        staged.push(REWRITE_SUFFIX);
        let staged = PathBuf::from(staged);

        let mut writer = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&staged)?,
        );
        for entry in entries {
            serde_json::to_writer(&mut writer, entry)
                .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;

        fs::rename(&staged, &path)
    }
}

/// Shrink `path` back to `len` bytes, dropping a partially written last line.
fn cut_torn_tail(path: &Path, len: usize, file_len: usize) -> Result<(), std::io::Error> {
    tracing::warn!(
        path = %path.display(),
        dropped_bytes = file_len - len,
        "truncating torn record at end of log segment"
    );

    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len as u64)?;
    file.sync_all()
}
