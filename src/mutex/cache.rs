//! Cache-backed lock backend.
//!
//! # Responsibilities
//! - Map lock acquisition onto the cache's atomic add-if-absent
//!
//! # Design Decisions
//! - This is the ONLY backend with automatic, backend-enforced expiry:
//!   `lock_ttl` bounds how long a crashed holder can block others, at the
//!   cost that a live holder's lock can be stolen once the TTL passes.
//!   That trade-off is the point of this backend, not a bug
//! - Each backend instance writes its own holder token so `unlock` only
//!   deletes keys this instance created

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::cache::Cache;
use crate::mutex::{LockBackend, LockError};

const KEY_PREFIX: &str = "mutex:";

/// Lock backend built on a cache's atomic `add`.
pub struct CacheLock {
    cache: Arc<dyn Cache>,
    /// Token identifying this instance as the holder.
    holder: String,
    /// Backend-enforced expiry for held locks; None disables stealing.
    lock_ttl: Option<Duration>,
}

impl std::fmt::Debug for CacheLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLock")
            .field("holder", &self.holder)
            .field("lock_ttl", &self.lock_ttl)
            .finish()
    }
}

impl CacheLock {
    pub fn new(cache: Arc<dyn Cache>, lock_ttl: Option<Duration>) -> Self {
        Self {
            cache,
            holder: Uuid::new_v4().to_string(),
            lock_ttl,
        }
    }

    fn key_for(name: &str) -> String {
        format!("{KEY_PREFIX}{name}")
    }
}

#[async_trait]
impl LockBackend for CacheLock {
    async fn try_lock(&self, name: &str) -> Result<bool, LockError> {
        let stored = self
            .cache
            .add(&Self::key_for(name), self.holder.as_bytes(), self.lock_ttl)
            .await?;
        Ok(stored)
    }

    async fn unlock(&self, name: &str) -> Result<bool, LockError> {
        let key = Self::key_for(name);
        // Only delete our own token; after a TTL steal the key belongs to
        // someone else.
        match self.cache.get(&key).await? {
            Some(token) if token == self.holder.as_bytes() => {
                Ok(self.cache.delete(&key).await?)
            }
            _ => Ok(false),
        }
    }
}
