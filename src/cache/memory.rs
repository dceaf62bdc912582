//! In-process cache backend.
//!
//! # Responsibilities
//! - Concurrent key-value storage with optional TTL
//! - Atomic add-if-absent through the map's entry API
//!
//! # Design Decisions
//! - DashMap shards internally; no global lock
//! - Expiry is lazy: an expired entry is treated as absent and removed on
//!   the next access
//! - Counters are stored as ASCII decimal so every backend agrees on the
//!   wire representation

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::cache::{counter_from_bytes, Cache, CacheError};
use crate::observability::metrics;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: &[u8], ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_vec(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Cache held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_counter(
        &self,
        key: &str,
        apply: impl Fn(u64) -> u64,
    ) -> Result<u64, CacheError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if !occupied.get().expired() => {
                let current = counter_from_bytes(key, &occupied.get().value)?;
                let next = apply(current);
                occupied.get_mut().value = next.to_string().into_bytes();
                Ok(next)
            }
            Entry::Occupied(mut occupied) => {
                // Expired: restart from zero.
                let next = apply(0);
                *occupied.get_mut() = CacheEntry::new(next.to_string().as_bytes(), None);
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                let next = apply(0);
                vacant.insert(CacheEntry::new(next.to_string().as_bytes(), None));
                Ok(next)
            }
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn add(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expired() {
                    *occupied.get_mut() = CacheEntry::new(value, ttl);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let value = match self.entries.get(key) {
            Some(entry) if !entry.expired() => Some(entry.value.clone()),
            Some(entry) => {
                drop(entry);
                self.entries.remove_if(key, |_, e| e.expired());
                None
            }
            None => None,
        };
        metrics::record_cache_get("memory", value.is_some());
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn increment(&self, key: &str, step: u64) -> Result<u64, CacheError> {
        self.update_counter(key, |v| v.saturating_add(step))
    }

    async fn decrement(&self, key: &str, step: u64) -> Result<u64, CacheError> {
        self.update_counter(key, |v| v.saturating_sub(step))
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}
