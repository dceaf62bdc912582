//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing / cache / mutex produce:
//!     → structured log events (tracing, emitted by callers)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout logs (tracing-subscriber, env-filter)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Core components record metrics but never log-and-swallow errors;
//!   failures propagate to callers, who decide what to log
//! - Metrics are cheap facade calls; exposition is opt-in per binary

pub mod metrics;
