//! Persisted session state
//!
//! The session treats the store as a write-through sink: it reads a snapshot
//! once at construction and afterwards only writes partial updates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{Snapshot, SnapshotPatch};

/// Key-value capability holding the player snapshot
pub trait StateStore: Send + Sync {
    /// Read the stored snapshot, `None` if nothing was stored yet
    fn load(&self) -> Result<Option<Snapshot>>;

    /// Merge `patch` into the stored snapshot
    fn save(&self, patch: SnapshotPatch) -> Result<()>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// Current stored snapshot (defaults if nothing was written)
    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Snapshot>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.lock().clone())
    }

    fn save(&self, patch: SnapshotPatch) -> Result<()> {
        self.lock().get_or_insert_with(Snapshot::default).apply(patch);
        Ok(())
    }
}

/// Single JSON document on disk
///
/// Every save re-reads the document, merges the patch and replaces the file
/// through a temporary sibling, so a crash mid-write leaves the previous
/// document intact. A document that does not parse reads as empty.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<Snapshot>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "player snapshot unreadable, starting from defaults"
                );
                Ok(None)
            }
        }
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        self.read()
    }

    fn save(&self, patch: SnapshotPatch) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut snapshot = self.read()?.unwrap_or_default();
        snapshot.apply(patch);

        let dir = self.dir();
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, &snapshot)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        debug!(path = %self.path.display(), "player snapshot written");
        Ok(())
    }
}
