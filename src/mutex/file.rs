//! Filesystem lock backend.
//!
//! # Responsibilities
//! - One lock file per name under a configured directory
//! - Acquisition via a non-blocking exclusive advisory lock (flock)
//!
//! # Design Decisions
//! - Lock names hashed (xxhash64) to fixed-width filenames, so arbitrary
//!   names never escape the lock directory
//! - The open file handle IS the lock; it lives in process-local state and
//!   the OS releases it if the process dies, which makes crashed holders
//!   harmless on this backend
//! - Lock files are never deleted: unlinking a locked file would let a
//!   second process lock a fresh inode under the same name

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

use async_trait::async_trait;
use fs4::fs_std::FileExt;
use parking_lot::Mutex as PlMutex;

use crate::mutex::{LockBackend, LockError};

/// Lock backend built on filesystem advisory locks.
#[derive(Debug)]
pub struct FileLock {
    dir: PathBuf,
    handles: PlMutex<HashMap<String, File>>,
}

impl FileLock {
    /// Open (creating if needed) the lock directory. Fails at construction
    /// if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LockError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            handles: PlMutex::new(HashMap::new()),
        })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        let hash = twox_hash::XxHash64::oneshot(0, name.as_bytes());
        self.dir.join(format!("{hash:016x}.lock"))
    }
}

#[async_trait]
impl LockBackend for FileLock {
    async fn try_lock(&self, name: &str) -> Result<bool, LockError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.path_for(name))?;

        if !file.try_lock_exclusive()? {
            return Ok(false);
        }

        self.handles.lock().insert(name.to_string(), file);
        Ok(true)
    }

    async fn unlock(&self, name: &str) -> Result<bool, LockError> {
        match self.handles.lock().remove(name) {
            Some(file) => {
                FileExt::unlock(&file)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_unlock_cycle() {
        let dir = TempDir::new().unwrap();
        let backend = FileLock::open(dir.path()).unwrap();

        assert!(backend.try_lock("job").await.unwrap());
        assert!(backend.unlock("job").await.unwrap());
        assert!(backend.try_lock("job").await.unwrap());
        assert!(backend.unlock("job").await.unwrap());
    }

    #[tokio::test]
    async fn test_contention_between_instances() {
        let dir = TempDir::new().unwrap();
        let a = FileLock::open(dir.path()).unwrap();
        let b = FileLock::open(dir.path()).unwrap();

        assert!(a.try_lock("job").await.unwrap());
        assert!(!b.try_lock("job").await.unwrap());

        assert!(a.unlock("job").await.unwrap());
        assert!(b.try_lock("job").await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_without_lock_reports_failure() {
        let dir = TempDir::new().unwrap();
        let backend = FileLock::open(dir.path()).unwrap();
        assert!(!backend.unlock("never-held").await.unwrap());
    }

    #[tokio::test]
    async fn test_distinct_names_do_not_contend() {
        let dir = TempDir::new().unwrap();
        let backend = FileLock::open(dir.path()).unwrap();

        assert!(backend.try_lock("a").await.unwrap());
        assert!(backend.try_lock("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_dropping_backend_releases_locks() {
        let dir = TempDir::new().unwrap();
        {
            let backend = FileLock::open(dir.path()).unwrap();
            assert!(backend.try_lock("job").await.unwrap());
            // Dropped without unlock; the OS releases the flock.
        }
        let backend = FileLock::open(dir.path()).unwrap();
        assert!(backend.try_lock("job").await.unwrap());
    }
}
