//! `vote.json` and `meta.json`, the two small state files beside the segments.
//!
//! Both are replaced whole on every save: the new content goes to
//! `<name>.tmp`, is fsynced, then renamed over the old file.

use crate::types::{ClusterLogId, ClusterVote};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write as IoWrite};
use std::path::Path;

use super::inner::LogStoreInner;

const VOTE_FILE: &str = "vote.json";
const META_FILE: &str = "meta.json";

/// Contents of `meta.json`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct LogMeta {
    pub last_purged_log_id: Option<ClusterLogId>,
    pub committed: Option<ClusterLogId>,
}

/// Loading and saving of the vote and log metadata.
pub trait PersistenceOps {
    fn load_vote(&mut self) -> Result<(), std::io::Error>;

    fn save_vote_to_disk(&self, vote: &ClusterVote) -> Result<(), std::io::Error>;

    fn load_meta(&mut self) -> Result<(), std::io::Error>;

    /// Persist the purge point and commit index.
    fn save_meta(&self) -> Result<(), std::io::Error>;
}

impl PersistenceOps for LogStoreInner {
    fn load_vote(&mut self) -> Result<(), std::io::Error> {
        // openraft's Vote carries its own serde impl, committed flag included.
        self.vote = read_state::<ClusterVote>(&self.dir.join(VOTE_FILE))?;
        Ok(())
    }

    fn save_vote_to_disk(&self, vote: &ClusterVote) -> Result<(), std::io::Error> {
        replace_state(&self.dir, VOTE_FILE, vote)
    }

    fn load_meta(&mut self) -> Result<(), std::io::Error> {
        if let Some(meta) = read_state::<LogMeta>(&self.dir.join(META_FILE))? {
            self.last_purged_log_id = meta.last_purged_log_id;
            self.committed = meta.committed;
        }
        Ok(())
    }

    fn save_meta(&self) -> Result<(), std::io::Error> {
        let meta = LogMeta {
            last_purged_log_id: self.last_purged_log_id,
            committed: self.committed,
        };
        replace_state(&self.dir, META_FILE, &meta)
    }
}

/// `Ok(None)` when the file does not exist yet; `InvalidData` when it does not parse.
fn read_state<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, std::io::Error> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, format!("{}: {}", path.display(), e)))
}

fn replace_state<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<(), std::io::Error> {
    let staged = dir.join(format!("{}.tmp", name));

    let mut writer = BufWriter::new(
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&staged)?,
    );
    serde_json::to_writer(&mut writer, value)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    fs::rename(&staged, dir.join(name))
}
