//! Storage trait and implementations

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::{CheckpointError, Result};

/// Default bucket names
pub const BLOCKS_BUCKET: &str = "blocks";
pub const CHECKPOINTS_BUCKET: &str = "checkpoints";

pub trait Storage: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&self, key: &[u8]) -> Result<()>;
}

/// In-memory storage (for testing and demos)
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    data: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }
}

/// bucket -> hex key -> hex value
type Buckets = BTreeMap<String, BTreeMap<String, String>>;

/// Bucket maps of every database file open in this process, by absolute path.
fn open_files() -> &'static Mutex<HashMap<PathBuf, Weak<RwLock<Buckets>>>> {
    static OPEN_FILES: OnceLock<Mutex<HashMap<PathBuf, Weak<RwLock<Buckets>>>>> = OnceLock::new();
    OPEN_FILES.get_or_init(Default::default)
}

/// JSON-file storage scoped to one bucket.
///
/// The file is loaded once per process and rewritten (temp file + rename) on
/// every mutation. Handles opened on the same path share one in-memory copy,
/// so writes through different buckets never overwrite each other.
#[derive(Clone, Debug)]
pub struct FileBackedStorage {
    path: PathBuf,
    bucket: String,
    data: Arc<RwLock<Buckets>>,
}

impl FileBackedStorage {
    /// Open (or create) `path` and make sure `bucket` exists.
    pub fn open(path: impl AsRef<Path>, bucket: &str) -> Result<Self> {
        let path = absolute(path.as_ref())?;

        let data = {
            let mut files = open_files().lock();
            files.retain(|_, shared| shared.strong_count() > 0);
            match files.get(&path).and_then(Weak::upgrade) {
                Some(shared) => shared,
                None => {
                    let shared = Arc::new(RwLock::new(load(&path)?));
                    files.insert(path.clone(), Arc::downgrade(&shared));
                    shared
                }
            }
        };

        let storage = Self {
            path,
            bucket: bucket.to_string(),
            data,
        };

        let mut buckets = storage.data.write();
        if !buckets.contains_key(bucket) {
            buckets.insert(bucket.to_string(), BTreeMap::new());
            storage.flush(&buckets)?;
            debug!(path = %storage.path.display(), bucket, "bucket created");
        }
        drop(buckets);

        Ok(storage)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn flush(&self, buckets: &Buckets) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(buckets)
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| CheckpointError::Storage(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| CheckpointError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| CheckpointError::Storage(e.to_string()))?;
    Ok(cwd.join(path))
}

fn load(path: &Path) -> Result<Buckets> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(Buckets::new()),
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| CheckpointError::Storage(format!("failed to open database: {e}"))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Buckets::new()),
        Err(e) => Err(CheckpointError::Storage(format!("failed to open database: {e}"))),
    }
}

impl Storage for FileBackedStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let buckets = self.data.read();
        let bucket = buckets
            .get(&self.bucket)
            .ok_or_else(|| CheckpointError::Storage(format!("bucket {} not found", self.bucket)))?;

        bucket
            .get(&hex::encode(key))
            .map(|v| hex::decode(v).map_err(|e| CheckpointError::Storage(e.to_string())))
            .transpose()
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut buckets = self.data.write();
        buckets
            .entry(self.bucket.clone())
            .or_default()
            .insert(hex::encode(key), hex::encode(value));
        self.flush(&buckets)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let mut buckets = self.data.write();
        if let Some(bucket) = buckets.get_mut(&self.bucket) {
            bucket.remove(&hex::encode(key));
        }
        self.flush(&buckets)
    }
}
