//! Argv routing strategy.
//!
//! # Responsibilities
//! - Resolve a route from process arguments instead of an HTTP request
//!
//! # Design Decisions
//! - First positional token is the target; `key=value` tokens become named
//!   params; remaining positionals are exposed as `arg0..argN`
//! - No method concept: `Resolved.method` is None

use crate::http::CliArgs;
use crate::routing::{Resolved, RouteError};

/// Router driven by the process argument vector.
#[derive(Debug, Clone)]
pub struct ConsoleRouter {
    default_route: Option<String>,
}

impl ConsoleRouter {
    pub fn new(default_route: Option<String>) -> Self {
        Self { default_route }
    }

    pub fn resolve(&self, args: &CliArgs) -> Result<Resolved, RouteError> {
        let target = args
            .target()
            .map(str::to_string)
            .or_else(|| self.default_route.clone())
            .ok_or_else(|| RouteError::NotFound {
                path: String::new(),
            })?;

        let mut params = args.named().clone();
        for (i, value) in args.positional().iter().enumerate() {
            params.insert(format!("arg{i}"), value.clone());
        }

        Ok(Resolved {
            target,
            params,
            method: None,
        })
    }
}
