//! Key-namespace wrapper.
//!
//! # Responsibilities
//! - Prepend a fixed prefix to every key before hitting the inner backend
//!
//! # Design Decisions
//! - `flush` delegates to the inner backend and clears EVERYTHING it holds,
//!   not just this namespace; on a shared memcached server that is the whole
//!   server. Callers needing namespace-scoped clearing must delete keys
//!   individually.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{Cache, CacheError};

/// Cache view that namespaces all keys with a prefix.
pub struct PrefixedCache {
    inner: Arc<dyn Cache>,
    prefix: String,
}

impl std::fmt::Debug for PrefixedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixedCache")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl PrefixedCache {
    pub fn new(inner: Arc<dyn Cache>, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

#[async_trait]
impl Cache for PrefixedCache {
    async fn add(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        self.inner.add(&self.full_key(key), value, ttl).await
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.inner.set(&self.full_key(key), value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.inner.get(&self.full_key(key)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.inner.delete(&self.full_key(key)).await
    }

    async fn increment(&self, key: &str, step: u64) -> Result<u64, CacheError> {
        self.inner.increment(&self.full_key(key), step).await
    }

    async fn decrement(&self, key: &str, step: u64) -> Result<u64, CacheError> {
        self.inner.decrement(&self.full_key(key), step).await
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.inner.flush().await
    }
}
