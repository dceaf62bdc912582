//! Startup/shutdown lifecycle.
//!
//! # Design Decisions
//! - One broadcast channel fans the shutdown signal out to every task
//! - Cleanup that must run on exit (mutex auto-release) happens at the
//!   composition root after the signal fires, not in ad-hoc exit hooks

pub mod shutdown;

pub use shutdown::Shutdown;
