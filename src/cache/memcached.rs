//! Memcached cache backend.
//!
//! # Responsibilities
//! - Speak the memcached text protocol over a TCP connection
//! - Map the uniform cache contract onto server-side primitives
//!
//! # Design Decisions
//! - One connection, guarded by an async mutex; commands are small and
//!   pipelining is not worth the complexity here
//! - Construction pings the server (`version`); an unreachable server is
//!   fatal at startup, never a silent no-op fallback
//! - `add`/`incr`/`decr` use the server's own atomic commands, so they are
//!   atomic across processes and hosts
//! - `flush` issues `flush_all` and therefore clears the ENTIRE server,
//!   not just this application's keys

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

use crate::cache::{Cache, CacheError};
use crate::observability::metrics;

const MAX_KEY_LEN: usize = 250;

/// Client for a single memcached server.
pub struct MemcachedCache {
    conn: tokio::sync::Mutex<BufStream<TcpStream>>,
    addr: String,
}

impl std::fmt::Debug for MemcachedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcachedCache")
            .field("addr", &self.addr)
            .finish()
    }
}

impl MemcachedCache {
    /// Connect and ping the server. Errors here are construction-fatal.
    pub async fn connect(addr: &str) -> Result<Self, CacheError> {
        let stream = TcpStream::connect(addr).await?;
        let cache = Self {
            conn: tokio::sync::Mutex::new(BufStream::new(stream)),
            addr: addr.to_string(),
        };

        let banner = {
            let mut conn = cache.conn.lock().await;
            conn.write_all(b"version\r\n").await?;
            conn.flush().await?;
            read_line(&mut conn).await?
        };
        if !banner.starts_with("VERSION") {
            return Err(CacheError::Protocol(format!(
                "unexpected handshake reply from {}: {banner:?}",
                cache.addr
            )));
        }
        tracing::debug!(addr = %cache.addr, banner = %banner, "memcached connected");
        Ok(cache)
    }

    /// Issue a storage command (`set` / `add`) and report whether the server
    /// stored the value.
    async fn store(
        &self,
        verb: &str,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        validate_key(key)?;
        let exptime = ttl.map(|t| t.as_secs()).unwrap_or(0);
        let header = format!("{verb} {key} 0 {exptime} {}\r\n", value.len());

        let mut conn = self.conn.lock().await;
        conn.write_all(header.as_bytes()).await?;
        conn.write_all(value).await?;
        conn.write_all(b"\r\n").await?;
        conn.flush().await?;

        match read_line(&mut conn).await?.as_str() {
            "STORED" => Ok(true),
            "NOT_STORED" => Ok(false),
            other => Err(CacheError::Protocol(format!(
                "unexpected reply to {verb}: {other:?}"
            ))),
        }
    }

    /// Issue `incr`/`decr`, returning None on NOT_FOUND.
    async fn arith(&self, verb: &str, key: &str, step: u64) -> Result<Option<u64>, CacheError> {
        validate_key(key)?;
        let mut conn = self.conn.lock().await;
        conn.write_all(format!("{verb} {key} {step}\r\n").as_bytes())
            .await?;
        conn.flush().await?;

        let line = read_line(&mut conn).await?;
        if line == "NOT_FOUND" {
            return Ok(None);
        }
        line.parse::<u64>().map(Some).map_err(|_| {
            CacheError::Protocol(format!("unexpected reply to {verb}: {line:?}"))
        })
    }

    /// Arithmetic with initialize-on-absent: an absent key counts from zero.
    async fn arith_or_init(
        &self,
        verb: &str,
        key: &str,
        step: u64,
        initial: u64,
    ) -> Result<u64, CacheError> {
        if let Some(value) = self.arith(verb, key, step).await? {
            return Ok(value);
        }
        // Key absent: seed it atomically. A concurrent seeder may win, in
        // which case the retried arithmetic applies on top of theirs.
        if self.store("add", key, initial.to_string().as_bytes(), None).await? {
            return Ok(initial);
        }
        self.arith(verb, key, step).await?.ok_or_else(|| {
            CacheError::Backend(format!("counter {key:?} vanished during initialization"))
        })
    }
}

#[async_trait]
impl Cache for MemcachedCache {
    async fn add(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        self.store("add", key, value, ttl).await
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        if !self.store("set", key, value, ttl).await? {
            return Err(CacheError::Backend(format!(
                "server refused to store {key:?}"
            )));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        validate_key(key)?;
        let mut conn = self.conn.lock().await;
        conn.write_all(format!("get {key}\r\n").as_bytes()).await?;
        conn.flush().await?;

        let line = read_line(&mut conn).await?;
        if line == "END" {
            drop(conn);
            metrics::record_cache_get("memcached", false);
            return Ok(None);
        }

        // VALUE <key> <flags> <bytes>
        let len: usize = line
            .strip_prefix("VALUE ")
            .and_then(|rest| rest.split_whitespace().nth(2))
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| CacheError::Protocol(format!("unexpected reply to get: {line:?}")))?;

        let mut value = vec![0u8; len + 2];
        conn.read_exact(&mut value).await?;
        value.truncate(len);

        let end = read_line(&mut conn).await?;
        if end != "END" {
            return Err(CacheError::Protocol(format!(
                "missing END after value block, got {end:?}"
            )));
        }
        drop(conn);
        metrics::record_cache_get("memcached", true);
        Ok(Some(value))
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        let mut conn = self.conn.lock().await;
        conn.write_all(format!("delete {key}\r\n").as_bytes())
            .await?;
        conn.flush().await?;

        match read_line(&mut conn).await?.as_str() {
            "DELETED" => Ok(true),
            "NOT_FOUND" => Ok(false),
            other => Err(CacheError::Protocol(format!(
                "unexpected reply to delete: {other:?}"
            ))),
        }
    }

    async fn increment(&self, key: &str, step: u64) -> Result<u64, CacheError> {
        self.arith_or_init("incr", key, step, step).await
    }

    async fn decrement(&self, key: &str, step: u64) -> Result<u64, CacheError> {
        // memcached decr already floors at zero.
        self.arith_or_init("decr", key, step, 0).await
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.lock().await;
        conn.write_all(b"flush_all\r\n").await?;
        conn.flush().await?;

        match read_line(&mut conn).await?.as_str() {
            "OK" => Ok(()),
            other => Err(CacheError::Protocol(format!(
                "unexpected reply to flush_all: {other:?}"
            ))),
        }
    }
}

fn validate_key(key: &str) -> Result<(), CacheError> {
    let ok = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.bytes().all(|b| b.is_ascii_graphic());
    if ok {
        Ok(())
    } else {
        Err(CacheError::Backend(format!(
            "invalid memcached key {key:?} (1..={MAX_KEY_LEN} printable non-space bytes)"
        )))
    }
}

async fn read_line(conn: &mut BufStream<TcpStream>) -> Result<String, CacheError> {
    let mut line = String::new();
    let n = conn.read_line(&mut line).await?;
    if n == 0 {
        return Err(CacheError::Protocol("connection closed by server".into()));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    if line.starts_with("ERROR")
        || line.starts_with("CLIENT_ERROR")
        || line.starts_with("SERVER_ERROR")
    {
        return Err(CacheError::Protocol(line));
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(validate_key("session:abc123").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("has space").is_err());
        assert!(validate_key(&"x".repeat(251)).is_err());
    }
}
