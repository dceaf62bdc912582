//! Shared utilities for integration testing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

type Store = Arc<Mutex<HashMap<String, Entry>>>;

/// Start an in-process memcached look-alike speaking the subset of the text
/// protocol the cache backend uses. Returns the address it listens on.
pub async fn start_fake_memcached() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let store: Store = Arc::new(Mutex::new(HashMap::new()));

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let store = store.clone();
                    tokio::spawn(async move {
                        let _ = serve_connection(socket, store).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn serve_connection(socket: TcpStream, store: Store) -> std::io::Result<()> {
    let mut stream = BufStream::new(socket);

    loop {
        let mut line = String::new();
        if stream.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let line = line.trim_end();
        let parts: Vec<&str> = line.split_whitespace().collect();

        let reply = match parts.as_slice() {
            ["version"] => "VERSION 1.6.0-fake\r\n".to_string(),
            [verb @ ("set" | "add"), key, _flags, exptime, len] => {
                let len: usize = len.parse().unwrap_or(0);
                let mut value = vec![0u8; len + 2];
                stream.read_exact(&mut value).await?;
                value.truncate(len);

                let expires_at = match exptime.parse::<u64>().unwrap_or(0) {
                    0 => None,
                    secs => Some(Instant::now() + Duration::from_secs(secs)),
                };
                let entry = Entry { value, expires_at };

                let mut map = store.lock();
                let present = map.get(*key).map(|e| !e.expired()).unwrap_or(false);
                if *verb == "add" && present {
                    "NOT_STORED\r\n".to_string()
                } else {
                    map.insert((*key).to_string(), entry);
                    "STORED\r\n".to_string()
                }
            }
            ["get", key] => {
                let map = store.lock();
                match map.get(*key).filter(|e| !e.expired()) {
                    Some(entry) => {
                        let mut out = format!("VALUE {key} 0 {}\r\n", entry.value.len());
                        out.push_str(&String::from_utf8_lossy(&entry.value));
                        out.push_str("\r\nEND\r\n");
                        out
                    }
                    None => "END\r\n".to_string(),
                }
            }
            ["delete", key] => {
                if store.lock().remove(*key).is_some() {
                    "DELETED\r\n".to_string()
                } else {
                    "NOT_FOUND\r\n".to_string()
                }
            }
            [verb @ ("incr" | "decr"), key, step] => {
                let step: u64 = step.parse().unwrap_or(0);
                let mut map = store.lock();
                match map.get_mut(*key).filter(|e| !e.expired()) {
                    Some(entry) => {
                        let current: u64 = std::str::from_utf8(&entry.value)
                            .ok()
                            .and_then(|s| s.parse().ok())
                            .unwrap_or(0);
                        let next = if *verb == "incr" {
                            current.saturating_add(step)
                        } else {
                            current.saturating_sub(step)
                        };
                        entry.value = next.to_string().into_bytes();
                        format!("{next}\r\n")
                    }
                    None => "NOT_FOUND\r\n".to_string(),
                }
            }
            ["flush_all"] => {
                store.lock().clear();
                "OK\r\n".to_string()
            }
            _ => "ERROR\r\n".to_string(),
        };

        stream.write_all(reply.as_bytes()).await?;
        stream.flush().await?;
    }
}
