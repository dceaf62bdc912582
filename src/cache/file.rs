//! Filesystem cache backend.
//!
//! # Responsibilities
//! - One file per key under a configured directory
//! - Atomic add via exclusive file creation; atomic set via rename
//!
//! # Design Decisions
//! - Key hashed (xxhash64) to a fixed-width filename; the original key is
//!   stored in the envelope and verified on read, so a hash collision reads
//!   as absent instead of returning the wrong value
//! - Envelope encoded with bincode: { key, expires_at (unix secs), value }
//! - `add` is atomic across processes (O_CREAT|O_EXCL); increment/decrement
//!   are serialized per process only — use the memcached backend when
//!   cross-process counter atomicity matters

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::{counter_from_bytes, Cache, CacheError};
use crate::observability::metrics;

const FILE_SUFFIX: &str = ".cache";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    key: String,
    expires_at: Option<u64>,
    value: Vec<u8>,
}

impl Envelope {
    fn new(key: &str, value: &[u8], ttl: Option<Duration>) -> Self {
        Self {
            key: key.to_string(),
            expires_at: ttl.map(|ttl| {
                (SystemTime::now() + ttl)
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs()
            }),
            value: value.to_vec(),
        }
    }

    fn expired(&self) -> bool {
        let Some(at) = self.expires_at else {
            return false;
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now >= at
    }
}

/// Cache persisted as one file per key.
#[derive(Debug)]
pub struct FileCache {
    dir: PathBuf,
    // Serializes read-modify-write counter updates within this process.
    counter_lock: tokio::sync::Mutex<()>,
}

impl FileCache {
    /// Open (creating if needed) the cache directory. Fails at construction
    /// if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            counter_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let hash = twox_hash::XxHash64::oneshot(0, key.as_bytes());
        self.dir.join(format!("{hash:016x}{FILE_SUFFIX}"))
    }

    /// Read and decode the entry at `path`, treating expired or mismatched
    /// entries as absent (and removing expired ones).
    fn read_entry(&self, path: &Path, key: &str) -> Result<Option<Envelope>, CacheError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let envelope: Envelope = bincode::deserialize(&bytes)?;
        if envelope.key != key {
            return Ok(None);
        }
        if envelope.expired() {
            let _ = fs::remove_file(path);
            return Ok(None);
        }
        Ok(Some(envelope))
    }

    /// Write the envelope to a temp file and rename it into place.
    fn write_entry(&self, path: &Path, envelope: &Envelope) -> Result<(), CacheError> {
        let tmp = self.dir.join(format!(".tmp-{}", Uuid::new_v4()));
        let bytes = bincode::serialize(envelope)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn try_create_exclusive(&self, path: &Path, envelope: &Envelope) -> Result<bool, CacheError> {
        let bytes = bincode::serialize(envelope)?;
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(&bytes)?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Cache for FileCache {
    async fn add(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        let envelope = Envelope::new(key, value, ttl);

        if self.try_create_exclusive(&path, &envelope)? {
            return Ok(true);
        }
        // A present-but-expired entry does not block the add. A torn read
        // means a concurrent winner is still writing; the key is taken.
        match self.read_entry(&path, key) {
            Ok(Some(_)) | Err(CacheError::Codec(_)) => return Ok(false),
            Ok(None) => {}
            Err(e) => return Err(e),
        }
        let _ = fs::remove_file(&path);
        self.try_create_exclusive(&path, &envelope)
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let path = self.path_for(key);
        self.write_entry(&path, &Envelope::new(key, value, ttl))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key);
        let value = self.read_entry(&path, key)?.map(|e| e.value);
        metrics::record_cache_get("file", value.is_some());
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn increment(&self, key: &str, step: u64) -> Result<u64, CacheError> {
        let _guard = self.counter_lock.lock().await;
        let path = self.path_for(key);
        let current = match self.read_entry(&path, key)? {
            Some(envelope) => counter_from_bytes(key, &envelope.value)?,
            None => 0,
        };
        let next = current.saturating_add(step);
        self.write_entry(&path, &Envelope::new(key, next.to_string().as_bytes(), None))?;
        Ok(next)
    }

    async fn decrement(&self, key: &str, step: u64) -> Result<u64, CacheError> {
        let _guard = self.counter_lock.lock().await;
        let path = self.path_for(key);
        let current = match self.read_entry(&path, key)? {
            Some(envelope) => counter_from_bytes(key, &envelope.value)?,
            None => 0,
        };
        let next = current.saturating_sub(step);
        self.write_entry(&path, &Envelope::new(key, next.to_string().as_bytes(), None))?;
        Ok(next)
    }

    async fn flush(&self) -> Result<(), CacheError> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(FILE_SUFFIX) {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}
