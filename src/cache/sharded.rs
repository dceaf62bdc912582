//! Consistent-hash cache client.
//!
//! # Responsibilities
//! - Spread keys across multiple child caches on a hash ring
//! - Keep key placement stable when the node set barely changes
//!
//! # Design Decisions
//! - 40 virtual nodes per shard smooth out the distribution
//! - xxhash64 for both ring points and key placement
//! - Every single-key operation goes to exactly one shard; `flush` fans out
//!   to all of them

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{Cache, CacheError};

const VIRTUAL_NODES: u32 = 40;

/// Cache distributing keys over N children via consistent hashing.
pub struct ShardedCache {
    shards: Vec<Arc<dyn Cache>>,
    ring: BTreeMap<u64, usize>,
}

impl std::fmt::Debug for ShardedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedCache")
            .field("shards", &self.shards.len())
            .field("ring_points", &self.ring.len())
            .finish()
    }
}

impl ShardedCache {
    /// Build a ring from labelled shards. Labels must be unique and stable
    /// across restarts (they define key placement).
    pub fn new(shards: Vec<(String, Arc<dyn Cache>)>) -> Result<Self, CacheError> {
        if shards.is_empty() {
            return Err(CacheError::Backend(
                "sharded cache needs at least one shard".into(),
            ));
        }

        let mut ring = BTreeMap::new();
        let mut caches = Vec::with_capacity(shards.len());
        for (index, (label, cache)) in shards.into_iter().enumerate() {
            for vnode in 0..VIRTUAL_NODES {
                let point = hash(format!("{label}#{vnode}").as_bytes());
                ring.insert(point, index);
            }
            caches.push(cache);
        }

        Ok(Self {
            shards: caches,
            ring,
        })
    }

    /// The shard owning `key`: first ring point at or after the key's hash,
    /// wrapping around to the start.
    fn shard_for(&self, key: &str) -> &Arc<dyn Cache> {
        let point = hash(key.as_bytes());
        let index = self
            .ring
            .range(point..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, &i)| i)
            .unwrap_or(0);
        &self.shards[index]
    }
}

fn hash(bytes: &[u8]) -> u64 {
    twox_hash::XxHash64::oneshot(0, bytes)
}

#[async_trait]
impl Cache for ShardedCache {
    async fn add(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        self.shard_for(key).add(key, value, ttl).await
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.shard_for(key).set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.shard_for(key).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.shard_for(key).delete(key).await
    }

    async fn increment(&self, key: &str, step: u64) -> Result<u64, CacheError> {
        self.shard_for(key).increment(key, step).await
    }

    async fn decrement(&self, key: &str, step: u64) -> Result<u64, CacheError> {
        self.shard_for(key).decrement(key, step).await
    }

    async fn flush(&self) -> Result<(), CacheError> {
        for shard in &self.shards {
            shard.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;

    fn sharded(n: usize) -> ShardedCache {
        let shards = (0..n)
            .map(|i| {
                (
                    format!("node-{i}"),
                    Arc::new(MemoryCache::new()) as Arc<dyn Cache>,
                )
            })
            .collect();
        ShardedCache::new(shards).unwrap()
    }

    #[test]
    fn test_empty_shard_set_rejected() {
        assert!(ShardedCache::new(Vec::new()).is_err());
    }

    #[test]
    fn test_placement_is_stable() {
        let a = sharded(3);
        let b = sharded(3);
        for key in ["alpha", "beta", "gamma", "delta"] {
            let pa = a.shards.iter().position(|s| Arc::ptr_eq(s, a.shard_for(key)));
            let pb = b.shards.iter().position(|s| Arc::ptr_eq(s, b.shard_for(key)));
            assert_eq!(pa, pb, "placement differs for {key}");
        }
    }

    #[tokio::test]
    async fn test_round_trip_through_owning_shard() {
        let cache = sharded(4);
        for i in 0..50 {
            let key = format!("key-{i}");
            cache.set(&key, key.as_bytes(), None).await.unwrap();
        }
        for i in 0..50 {
            let key = format!("key-{i}");
            assert_eq!(cache.get(&key).await.unwrap(), Some(key.clone().into_bytes()));
        }
    }

    #[tokio::test]
    async fn test_keys_spread_across_shards() {
        let cache = sharded(4);
        let mut used = std::collections::HashSet::new();
        for i in 0..200 {
            let key = format!("spread-{i}");
            let shard = cache.shard_for(&key);
            used.insert(
                cache
                    .shards
                    .iter()
                    .position(|s| Arc::ptr_eq(s, shard))
                    .unwrap(),
            );
        }
        assert!(used.len() > 1, "all keys landed on one shard");
    }

    #[tokio::test]
    async fn test_flush_fans_out() {
        let cache = sharded(3);
        for i in 0..20 {
            cache.set(&format!("k{i}"), b"v", None).await.unwrap();
        }
        cache.flush().await.unwrap();
        for i in 0..20 {
            assert_eq!(cache.get(&format!("k{i}")).await.unwrap(), None);
        }
    }
}
