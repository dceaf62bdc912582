//! Cache subsystem.
//!
//! # Data Flow
//! ```text
//! CacheConfig (backend name + parameters)
//!     → build_cache (single startup site, closed backend set)
//!     → Arc<dyn Cache>  (memory | file | memcached | sharded)
//!     → optional PrefixedCache namespace wrapper
//!     → shared with consumers (mutex cache backend, app code)
//! ```
//!
//! # Design Decisions
//! - One trait, implemented directly by every backend; no method-existence
//!   proxying
//! - `get` returns `Option` so an absent key is never conflated with a
//!   stored falsy value
//! - `add` is a single atomic operation on every backend; the cache-backed
//!   mutex depends on that
//! - `ttl: None` means no expiry
//! - Backend construction failures are fatal; there is no silent fallback

pub mod file;
pub mod memcached;
pub mod memory;
pub mod prefixed;
pub mod sharded;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::schema::{CacheBackend, CacheConfig};

pub use file::FileCache;
pub use memcached::MemcachedCache;
pub use memory::MemoryCache;
pub use prefixed::PrefixedCache;
pub use sharded::ShardedCache;

/// Cache failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("cache protocol error: {0}")]
    Protocol(String),

    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("value for key {key:?} is not an ASCII decimal counter")]
    NotNumeric { key: String },
}

/// Uniform contract shared by every cache backend.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Store only if `key` is absent. Returns true when the value was
    /// stored. Atomic on every backend.
    async fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>)
        -> Result<bool, CacheError>;

    /// Unconditional upsert.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>)
        -> Result<(), CacheError>;

    /// Fetch a value; `None` means absent (or expired).
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Remove a key. Returns true if something was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Add `step` to an ASCII-decimal counter, treating an absent key as 0.
    /// Returns the new value.
    async fn increment(&self, key: &str, step: u64) -> Result<u64, CacheError>;

    /// Subtract `step` from a counter, flooring at 0. Returns the new value.
    async fn decrement(&self, key: &str, step: u64) -> Result<u64, CacheError>;

    /// Clear the backend's whole store. Blast radius is backend-wide: on a
    /// shared server this clears keys owned by other applications too.
    async fn flush(&self) -> Result<(), CacheError>;
}

/// Parse a stored counter value.
pub(crate) fn counter_from_bytes(key: &str, bytes: &[u8]) -> Result<u64, CacheError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| CacheError::NotNumeric {
            key: key.to_string(),
        })
}

/// Backend factory: the single startup site where a configured backend name
/// becomes a concrete cache.
pub async fn build_cache(config: &CacheConfig) -> Result<Arc<dyn Cache>, CacheError> {
    let cache: Arc<dyn Cache> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::File => {
            let dir = config.file.dir.as_deref().ok_or_else(|| {
                CacheError::Backend("file cache requires cache.file.dir".into())
            })?;
            Arc::new(FileCache::open(dir)?)
        }
        CacheBackend::Memcached => {
            let addr = config.memcached.addr.as_deref().ok_or_else(|| {
                CacheError::Backend("memcached cache requires cache.memcached.addr".into())
            })?;
            Arc::new(MemcachedCache::connect(addr).await?)
        }
        CacheBackend::Sharded => {
            let mut shards: Vec<(String, Arc<dyn Cache>)> = Vec::new();
            for addr in &config.sharded.nodes {
                let shard = MemcachedCache::connect(addr).await?;
                shards.push((addr.clone(), Arc::new(shard)));
            }
            Arc::new(ShardedCache::new(shards)?)
        }
    };

    tracing::info!(backend = ?config.backend, prefix = %config.prefix, "cache ready");

    if config.prefix.is_empty() {
        Ok(cache)
    } else {
        Ok(Arc::new(PrefixedCache::new(cache, config.prefix.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_parsing() {
        assert_eq!(counter_from_bytes("k", b"42").unwrap(), 42);
        assert!(counter_from_bytes("k", b"nope").is_err());
        assert!(counter_from_bytes("k", b"").is_err());
    }

    #[tokio::test]
    async fn test_build_memory_backend() {
        let config = CacheConfig::default();
        let cache = build_cache(&config).await.unwrap();
        cache.set("k", b"v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_build_applies_prefix() {
        let config = CacheConfig {
            prefix: "app:".to_string(),
            ..CacheConfig::default()
        };
        let cache = build_cache(&config).await.unwrap();
        cache.set("k", b"v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_file_backend_requires_dir() {
        let config = CacheConfig {
            backend: CacheBackend::File,
            ..CacheConfig::default()
        };
        assert!(build_cache(&config).await.is_err());
    }
}
