use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FaceError, Result};
use crate::identity::Identity;

/// On-disk form of a learned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub uuid: Uuid,
    pub name: String,
    pub embedding: Vec<f32>,
    pub samples: u32,
}

impl From<&Identity> for FaceRecord {
    fn from(identity: &Identity) -> Self {
        Self {
            uuid: identity.uuid,
            name: identity.name.clone(),
            embedding: identity.embedding.to_vec(),
            samples: identity.sample_count,
        }
    }
}

impl From<FaceRecord> for Identity {
    fn from(record: FaceRecord) -> Self {
        Self {
            uuid: record.uuid,
            name: record.name,
            embedding: record.embedding.into(),
            sample_count: record.samples,
        }
    }
}

/// Medium holding the learned identity set as one opaque blob.
pub trait ModelStorage: Send {
    /// Returns `Ok(None)` when nothing has been persisted yet.
    fn load_records(&self) -> Result<Option<Vec<FaceRecord>>>;

    /// Replaces the persisted set wholesale.
    fn save_records(&self, records: &[FaceRecord]) -> Result<()>;

    /// Removes the persisted set.
    fn purge(&self) -> Result<()>;

    /// Where the blob lives, for messages.
    fn location(&self) -> PathBuf;

    /// Sets an unreadable blob aside so the next save cannot destroy it.
    /// Returns where it went, or `None` when the medium keeps nothing aside.
    fn quarantine(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// `path` with `suffix` appended to its file name (`faces.bin` -> `faces.bin.tmp`).
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Postcard-encoded model file, replaced atomically through a `.tmp` sibling.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First free `<path>.corrupt`, `<path>.corrupt.1`, ... name.
    fn quarantine_target(&self) -> PathBuf {
        let base = with_suffix(&self.path, "corrupt");
        let mut target = base.clone();
        let mut n = 1;
        while target.exists() {
            target = with_suffix(&base, &n.to_string());
            n += 1;
        }
        target
    }
}

impl ModelStorage for FileStorage {
    fn load_records(&self) -> Result<Option<Vec<FaceRecord>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = std::fs::read(&self.path).map_err(|e| FaceError::persistence(&self.path, e))?;
        let records =
            postcard::from_bytes(&data).map_err(|e| FaceError::persistence(&self.path, e))?;
        Ok(Some(records))
    }

    fn save_records(&self, records: &[FaceRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| FaceError::persistence(parent, e))?;
            }
        }

        let data =
            postcard::to_allocvec(records).map_err(|e| FaceError::persistence(&self.path, e))?;
        let tmp = with_suffix(&self.path, "tmp");
        std::fs::write(&tmp, data).map_err(|e| FaceError::persistence(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| FaceError::persistence(&self.path, e))?;
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| FaceError::persistence(&self.path, e))?;
        }
        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }

    fn quarantine(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let target = self.quarantine_target();
        std::fs::rename(&self.path, &target).map_err(|e| FaceError::persistence(&self.path, e))?;
        Ok(Some(target))
    }
}

const MEMORY_LOCATION: &str = "<memory>";

/// In-memory medium. Clones share the same blob, so a test can keep a
/// handle and reload from it after the engine is gone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blob: Arc<Mutex<Option<Vec<u8>>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following save fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }

    /// Number of bytes currently persisted, if any.
    pub fn persisted_len(&self) -> Option<usize> {
        self.blob.lock().ok()?.as_ref().map(Vec::len)
    }

    fn memory_error(reason: impl ToString) -> FaceError {
        FaceError::persistence(MEMORY_LOCATION, reason)
    }
}

impl ModelStorage for MemoryStorage {
    fn load_records(&self) -> Result<Option<Vec<FaceRecord>>> {
        let blob = self.blob.lock().map_err(Self::memory_error)?;
        match blob.as_deref() {
            None => Ok(None),
            Some(data) => postcard::from_bytes(data)
                .map(Some)
                .map_err(Self::memory_error),
        }
    }

    fn save_records(&self, records: &[FaceRecord]) -> Result<()> {
        if *self.fail_writes.lock().map_err(Self::memory_error)? {
            return Err(Self::memory_error("write refused"));
        }
        let data = postcard::to_allocvec(records).map_err(Self::memory_error)?;
        *self.blob.lock().map_err(Self::memory_error)? = Some(data);
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        *self.blob.lock().map_err(Self::memory_error)? = None;
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from(MEMORY_LOCATION)
    }
}
