//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! framework core. All types derive Serde traits for deserialization from
//! config files.

use std::collections::BTreeMap;

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::routing::{MethodFilter, RouteDef, RouterStrategy};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Example-app HTTP server settings.
    pub server: ServerConfig,

    /// Routing strategy and route table.
    pub router: RouterConfig,

    /// Cache backend selection and parameters.
    pub cache: CacheConfig,

    /// Mutex backend selection and parameters.
    pub mutex: MutexConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Example-app server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Strategy: rewrite | simple | console.
    pub strategy: RouterStrategy,

    /// Target used when nothing matches (catch-all).
    pub default_route: Option<String>,

    /// Query parameter carrying the target in simple mode.
    pub route_param: String,

    /// Top-level route definitions, in match order.
    pub routes: Vec<RouteEntry>,

    /// Route groups sharing a path prefix, appended after `routes`.
    pub groups: Vec<RouteGroup>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategy: RouterStrategy::Rewrite,
            default_route: None,
            route_param: crate::routing::DEFAULT_ROUTE_PARAM.to_string(),
            routes: Vec::new(),
            groups: Vec::new(),
        }
    }
}

impl RouterConfig {
    /// Assemble the configured router. Definition errors (bad patterns,
    /// bad method names) are fatal here, before any request is served.
    pub fn build(&self) -> Result<crate::routing::AnyRouter, crate::routing::RouteError> {
        let to_defs = |entries: &[RouteEntry]| -> Result<Vec<RouteDef>, crate::routing::RouteError> {
            entries
                .iter()
                .map(|entry| {
                    entry.to_def().map_err(|reason| {
                        crate::routing::RouteError::InvalidPattern {
                            pattern: entry.pattern.clone(),
                            reason,
                        }
                    })
                })
                .collect()
        };

        let defs = to_defs(&self.routes)?;
        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            groups.push((group.prefix.clone(), to_defs(&group.routes)?));
        }

        crate::routing::build_router(
            self.strategy,
            self.default_route.clone(),
            &self.route_param,
            crate::routing::TypeRegistry::new(),
            defs,
            groups,
        )
    }
}

/// One route definition as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteEntry {
    /// Path template (`/user/{id:int}`, `/post/:slug`, ...).
    pub pattern: String,

    /// Target identifier, conventionally `controller/action`.
    pub target: String,

    /// Allowed methods; empty means any.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Default parameters merged into the resolution.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl RouteEntry {
    /// Convert to a [`RouteDef`], parsing method names.
    pub fn to_def(&self) -> Result<RouteDef, String> {
        let methods = if self.methods.is_empty() {
            MethodFilter::Any
        } else {
            let mut parsed = Vec::with_capacity(self.methods.len());
            for name in &self.methods {
                let method = Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                    .map_err(|_| format!("invalid HTTP method {name:?}"))?;
                parsed.push(method);
            }
            MethodFilter::Only(parsed)
        };

        Ok(RouteDef {
            pattern: self.pattern.clone(),
            target: self.target.clone(),
            methods,
            defaults: self.defaults.clone(),
        })
    }
}

/// Routes sharing a path prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteGroup {
    pub prefix: String,
    pub routes: Vec<RouteEntry>,
}

/// Cache backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    File,
    Memcached,
    Sharded,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend: memory | file | memcached | sharded.
    pub backend: CacheBackend,

    /// Key prefix for namespace isolation; empty disables wrapping.
    pub prefix: String,

    pub file: FileCacheSection,
    pub memcached: MemcachedSection,
    pub sharded: ShardedSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FileCacheSection {
    /// Directory holding one file per cached key.
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MemcachedSection {
    /// Server address (e.g., "127.0.0.1:11211").
    pub addr: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ShardedSection {
    /// Memcached server addresses forming the hash ring.
    pub nodes: Vec<String>,
}

/// Mutex backend selector.
///
/// The database advisory backend is constructed programmatically (it needs
/// an application-supplied session) and has no config entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutexBackend {
    File,
    #[default]
    Cache,
}

/// Mutex configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MutexConfig {
    /// Backend: file | cache.
    pub backend: MutexBackend,

    /// Lock-file directory (file backend).
    pub dir: Option<String>,

    /// Retry interval while waiting for a contended lock.
    pub poll_interval_ms: u64,

    /// Backend-enforced lock expiry in seconds (cache backend only).
    pub lock_ttl_secs: Option<u64>,
}

impl Default for MutexConfig {
    fn default() -> Self {
        Self {
            backend: MutexBackend::Cache,
            dir: None,
            poll_interval_ms: crate::mutex::DEFAULT_POLL_INTERVAL.as_millis() as u64,
            lock_ttl_secs: None,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.router.route_param, "r");
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.mutex.backend, MutexBackend::Cache);
        assert_eq!(config.mutex.poll_interval_ms, 1_000);
    }

    #[test]
    fn test_route_entry_method_parsing() {
        let entry = RouteEntry {
            pattern: "/register".into(),
            target: "user/register".into(),
            methods: vec!["post".into()],
            defaults: BTreeMap::new(),
        };
        let def = entry.to_def().unwrap();
        assert_eq!(def.methods, MethodFilter::Only(vec![Method::POST]));
    }

    #[test]
    fn test_route_entry_bad_method() {
        let entry = RouteEntry {
            pattern: "/x".into(),
            target: "t".into(),
            methods: vec!["not a method".into()],
            defaults: BTreeMap::new(),
        };
        assert!(entry.to_def().is_err());
    }

    #[test]
    fn test_minimal_toml_round_trip() {
        let toml_src = r#"
            [router]
            strategy = "rewrite"
            default_route = "home/index"

            [[router.routes]]
            pattern = "/user/{id:int}"
            target = "user/info"
            methods = ["get"]

            [[router.groups]]
            prefix = "/api"

            [[router.groups.routes]]
            pattern = "/status"
            target = "api/status"

            [cache]
            backend = "memory"
            prefix = "app:"

            [mutex]
            backend = "cache"
            poll_interval_ms = 250
        "#;

        let config: AppConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.router.routes.len(), 1);
        assert_eq!(config.router.groups[0].prefix, "/api");
        assert_eq!(config.cache.prefix, "app:");
        assert_eq!(config.mutex.poll_interval_ms, 250);
    }
}
