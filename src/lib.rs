//! junction: a lightweight web framework core.
//!
//! The hard pieces of an MVC framework — URL routing with reverse
//! generation, a uniform cache abstraction over pluggable backends, and
//! named cross-process mutex locks — without the framework around them.
//!
//! # Architecture Overview
//!
//! ```text
//!   HTTP request ──▶ http::Request ──▶ routing (rewrite|simple) ──▶ Resolved ──▶ dispatch (yours)
//!   argv         ──▶ http::CliArgs ──▶ routing (console)        ──▶ Resolved ──▶ dispatch (yours)
//!
//!   cache:  memory | file | memcached | sharded   (one trait, atomic add)
//!   mutex:  file flock | cache add | db advisory  (poll + timeout on top)
//!
//!   Cross-cutting: config (TOML, validated at startup), observability
//!   (tracing + metrics), lifecycle (shutdown broadcast).
//! ```
//!
//! Everything is wired at a composition root: the binaries build a router,
//! a cache and a mutex from [`config::AppConfig`] and pass them to
//! consumers explicitly. There are no ambient singletons.

// Core subsystems
pub mod cache;
pub mod config;
pub mod http;
pub mod mutex;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use cache::{build_cache, Cache, CacheError};
pub use config::AppConfig;
pub use http::{CliArgs, Request, Response};
pub use lifecycle::Shutdown;
pub use mutex::{build_mutex, LockError, Mutex};
pub use routing::{AnyRouter, Resolved, RouteDef, RouteError};
