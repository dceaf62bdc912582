//! Request/response value objects.
//!
//! # Data Flow
//! ```text
//! HTTP layer (axum)
//!     → request.rs (method, path, query, headers + request ID)
//!     → routing (resolve to target + params)
//!     → dispatch (external)
//!     → response.rs (status, headers, body)
//!     → HTTP layer
//!
//! Console entry point
//!     → args.rs (argv → target + named/positional params)
//!     → routing (console strategy)
//! ```
//!
//! # Design Decisions
//! - Carriers are immutable after construction; routing only reads them
//! - Query string parsed once, at the edge

pub mod args;
pub mod request;
pub mod response;

pub use args::CliArgs;
pub use request::Request;
pub use response::Response;
