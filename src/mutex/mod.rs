//! Named cross-process mutex locks.
//!
//! # Data Flow
//! ```text
//! MutexConfig (backend name + parameters)
//!     → build_mutex (single startup site, closed backend set)
//!     → Mutex over a LockBackend (file | cache | database advisory)
//!
//! lock(name, timeout):
//!     try_lock → held? record in local held set
//!              → contended? sleep poll interval, retry until deadline
//!              → deadline passed? LockError::Timeout
//! ```
//!
//! # Design Decisions
//! - All real mutual exclusion lives in the backend (flock, cache add,
//!   database advisory lock); this layer only polls and bookkeeps
//! - Non-reentrant: a second `lock` for a held name waits like any other
//!   contender (except the documented database same-session caveat)
//! - `release_all` is the best-effort exit hook replacement; explicit
//!   `unlock` remains the contract
//! - Poll interval is configurable but never zero; locks fail after the
//!   timeout, not before

pub mod advisory;
pub mod cache;
pub mod file;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex as PlMutex;
use thiserror::Error;
use tokio::time::Instant;

use crate::cache::{Cache, CacheError};
use crate::config::schema::{MutexBackend, MutexConfig};
use crate::observability::metrics;

pub use advisory::{AdvisoryLock, AdvisorySession};
pub use cache::CacheLock;
pub use file::FileLock;

/// Default retry interval while waiting for a contended lock.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Locking failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock stayed contended for the whole timeout window.
    #[error("timed out acquiring lock {name:?} after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("lock I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("lock backend error: {0}")]
    Backend(String),
}

/// Atomicity source underlying named locks.
///
/// `try_lock` must be a single atomic acquisition attempt; the polling loop
/// lives in [`Mutex`], never in a backend.
#[async_trait]
pub trait LockBackend: Send + Sync {
    async fn try_lock(&self, name: &str) -> Result<bool, LockError>;

    /// Release a lock. Returns false when the backend does not consider the
    /// lock held by this process.
    async fn unlock(&self, name: &str) -> Result<bool, LockError>;
}

/// Named, timeout-bounded mutual exclusion over a pluggable backend.
pub struct Mutex {
    backend: Arc<dyn LockBackend>,
    held: PlMutex<HashSet<String>>,
    poll_interval: Duration,
}

impl std::fmt::Debug for Mutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutex")
            .field("held", &self.held.lock().len())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl Mutex {
    pub fn new(backend: Arc<dyn LockBackend>, poll_interval: Duration) -> Self {
        Self {
            backend,
            held: PlMutex::new(HashSet::new()),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Acquire `name`, retrying until `timeout` elapses.
    ///
    /// A zero timeout means a single immediate attempt. The final attempt
    /// happens at the deadline, so the call fails after the timeout, not
    /// before it.
    pub async fn lock(&self, name: &str, timeout: Duration) -> Result<(), LockError> {
        let start = Instant::now();
        loop {
            if self.backend.try_lock(name).await? {
                self.held.lock().insert(name.to_string());
                metrics::record_lock_acquired(start.elapsed());
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                metrics::record_lock_timeout();
                return Err(LockError::Timeout {
                    name: name.to_string(),
                    timeout,
                });
            }
            // Sleep one poll interval, clamped to the deadline.
            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// Release `name`. Returns false when the backend reports the lock was
    /// not held; the local held set is only updated on success.
    pub async fn unlock(&self, name: &str) -> Result<bool, LockError> {
        let released = self.backend.unlock(name).await?;
        if released {
            self.held.lock().remove(name);
        }
        Ok(released)
    }

    /// Best-effort release of every lock this process still holds. Wired to
    /// process shutdown; never a substitute for explicit `unlock`.
    pub async fn release_all(&self) {
        let names: Vec<String> = self.held.lock().drain().collect();
        for name in names {
            if let Err(e) = self.backend.unlock(&name).await {
                tracing::warn!(lock = %name, error = %e, "auto-release failed");
            }
        }
    }

    /// Names this process currently believes it holds.
    pub fn held(&self) -> Vec<String> {
        self.held.lock().iter().cloned().collect()
    }
}

/// Backend factory: the single startup site where a configured backend name
/// becomes a concrete mutex.
///
/// The database advisory backend has no configuration entry here because it
/// needs an application-supplied [`AdvisorySession`]; construct it directly
/// with [`Mutex::new`] and [`AdvisoryLock`].
pub fn build_mutex(
    config: &MutexConfig,
    cache: Option<Arc<dyn Cache>>,
) -> Result<Mutex, LockError> {
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let backend: Arc<dyn LockBackend> = match config.backend {
        MutexBackend::File => {
            let dir = config.dir.as_deref().ok_or_else(|| {
                LockError::Backend("file mutex requires mutex.dir".into())
            })?;
            Arc::new(FileLock::open(dir)?)
        }
        MutexBackend::Cache => {
            let cache = cache.ok_or_else(|| {
                LockError::Backend("cache mutex requires a configured cache".into())
            })?;
            let lock_ttl = config.lock_ttl_secs.map(Duration::from_secs);
            Arc::new(CacheLock::new(cache, lock_ttl))
        }
    };

    tracing::info!(backend = ?config.backend, poll_interval_ms = config.poll_interval_ms, "mutex ready");
    Ok(Mutex::new(backend, poll_interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn cache_mutex() -> (Mutex, Mutex) {
        let cache = Arc::new(MemoryCache::new());
        let a = Mutex::new(
            Arc::new(CacheLock::new(cache.clone(), None)),
            Duration::from_millis(20),
        );
        let b = Mutex::new(
            Arc::new(CacheLock::new(cache, None)),
            Duration::from_millis(20),
        );
        (a, b)
    }

    #[tokio::test]
    async fn test_sequential_cycles_always_succeed() {
        let (mutex, _) = cache_mutex();
        for _ in 0..2 {
            mutex.lock("foo", Duration::ZERO).await.unwrap();
            assert!(mutex.unlock("foo").await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_contended_lock_times_out_near_deadline() {
        let (a, b) = cache_mutex();
        a.lock("foo", Duration::ZERO).await.unwrap();

        let start = std::time::Instant::now();
        let err = b.lock("foo", Duration::from_millis(200)).await.unwrap_err();
        let waited = start.elapsed();

        assert!(matches!(err, LockError::Timeout { .. }));
        // Not immediately, not significantly longer.
        assert!(waited >= Duration::from_millis(200), "failed early: {waited:?}");
        assert!(waited < Duration::from_millis(600), "failed late: {waited:?}");
    }

    #[tokio::test]
    async fn test_lock_succeeds_once_holder_releases() {
        let (a, b) = cache_mutex();
        a.lock("foo", Duration::ZERO).await.unwrap();

        let waiter = tokio::spawn(async move {
            b.lock("foo", Duration::from_secs(5)).await.unwrap();
            b
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        a.unlock("foo").await.unwrap();

        let b = waiter.await.unwrap();
        assert_eq!(b.held(), vec!["foo".to_string()]);
    }

    #[tokio::test]
    async fn test_zero_timeout_is_single_attempt() {
        let (a, b) = cache_mutex();
        a.lock("foo", Duration::ZERO).await.unwrap();

        let start = std::time::Instant::now();
        assert!(b.lock("foo", Duration::ZERO).await.is_err());
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_release_all_frees_everything() {
        let (a, b) = cache_mutex();
        a.lock("one", Duration::ZERO).await.unwrap();
        a.lock("two", Duration::ZERO).await.unwrap();
        assert_eq!(a.held().len(), 2);

        a.release_all().await;
        assert!(a.held().is_empty());
        b.lock("one", Duration::ZERO).await.unwrap();
        b.lock("two", Duration::ZERO).await.unwrap();
    }

    #[tokio::test]
    async fn test_unlock_not_held_returns_false() {
        let (a, _) = cache_mutex();
        assert!(!a.unlock("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_factory_requires_cache_for_cache_backend() {
        let config = MutexConfig {
            backend: MutexBackend::Cache,
            ..MutexConfig::default()
        };
        assert!(build_mutex(&config, None).is_err());
    }
}
