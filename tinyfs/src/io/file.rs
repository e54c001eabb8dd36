use crate::io::SnapshotStore;
use std::fs::{self, File};
use std::io::prelude::*;
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

/// Keeps the snapshot in a text file on the host filesystem.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Write to a sibling temporary file and rename it over the snapshot
    /// instead of truncating the snapshot in place.
    atomic: bool,
}

impl FileStore {
    fn write_in_place(&self, snapshot: &str) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(&self.path)?);
        out.write_all(snapshot.as_bytes())?;
        out.flush()
    }

    fn write_atomic(&self, snapshot: &str) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(snapshot.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn load_snapshot(&mut self) -> std::io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store_snapshot(&mut self, snapshot: &str) -> std::io::Result<()> {
        debug!(
            "writing {} byte snapshot to {:?} (atomic: {})",
            snapshot.len(),
            self.path,
            self.atomic
        );
        if self.atomic {
            self.write_atomic(snapshot)
        } else {
            self.write_in_place(snapshot)
        }
    }
}

pub struct FileStoreBuilder {
    path: PathBuf,
    atomic: bool,
}

impl FileStoreBuilder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileStoreBuilder {
            path: path.as_ref().to_path_buf(),
            atomic: false,
        }
    }

    /// Replace the snapshot through a temporary file and rename so a crash
    /// mid-write leaves the previous snapshot intact. Off by default.
    pub fn atomic_writes(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// Nothing is touched on disk until the first snapshot is written.
    pub fn build(self) -> FileStore {
        FileStore {
            path: self.path,
            atomic: self.atomic,
        }
    }
}
