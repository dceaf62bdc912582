//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     RouteDef[] (+ prefix groups)
//!     → pattern.rs (compile to token lists, fail fast on bad patterns)
//!     → Freeze as immutable router, shared via Arc
//!
//! Per request:
//!     Request (method, path) or CliArgs
//!     → strategy (rewrite | simple | console)
//!     → Resolved { target, params, method } or RouteError
//!     → dispatch (external)
//! ```
//!
//! # Design Decisions
//! - Strategy selected once at startup through a closed enum factory; no
//!   name-to-type reflection
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always resolves the same route
//! - First match wins (registration order)
//! - Routers never log or swallow errors; failures propagate to the caller

pub mod console;
pub mod pattern;
pub mod rewrite;
pub mod simple;

use std::collections::BTreeMap;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{CliArgs, Request};
use crate::observability::metrics;

pub use console::ConsoleRouter;
pub use pattern::{CompiledRoute, ParamType, Token, TypeRegistry};
pub use rewrite::{RewriteRouter, FALLBACK_PATH_PARAM};
pub use simple::{SimpleRouter, DEFAULT_ROUTE_PARAM};

/// Routing failures surfaced to the dispatch layer.
#[derive(Debug, Error)]
pub enum RouteError {
    /// No route matched and no default route is configured. Maps to 404.
    #[error("no route matched path {path:?}")]
    NotFound { path: String },

    /// A route matched structurally but excluded the method. Maps to 405.
    #[error("method {method} not allowed for path {path:?}")]
    MethodNotAllowed { method: Method, path: String },

    /// Malformed pattern, detected at registration. Fatal at startup.
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Reverse generation found no registered route for the target.
    #[error("no route registered for target {target:?} with the supplied parameters")]
    NoRouteForTarget { target: String },
}

/// Allowed HTTP methods for a route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MethodFilter {
    /// No constraint.
    #[default]
    Any,
    /// Only the listed methods.
    Only(Vec<Method>),
}

impl MethodFilter {
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(methods) => methods.contains(method),
        }
    }
}

/// A route definition as registered at startup.
#[derive(Debug, Clone)]
pub struct RouteDef {
    pub pattern: String,
    pub target: String,
    pub methods: MethodFilter,
    pub defaults: BTreeMap<String, String>,
}

impl RouteDef {
    pub fn new(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target: target.into(),
            methods: MethodFilter::Any,
            defaults: BTreeMap::new(),
        }
    }

    /// Constrain the route to the given methods.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = MethodFilter::Only(methods.into_iter().collect());
        self
    }

    /// Add a default parameter. A value of `$name` derives from the capture
    /// of that name at resolution time.
    pub fn default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }
}

/// Outcome of a successful resolution, handed to the dispatch layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Opaque target identifier, conventionally `controller/action`.
    pub target: String,
    /// Extracted captures merged with route defaults.
    pub params: BTreeMap<String, String>,
    /// Method the route matched under; None for console resolution.
    pub method: Option<Method>,
}

/// Routing strategy selector, chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterStrategy {
    #[default]
    Rewrite,
    Simple,
    Console,
}

/// Input to [`AnyRouter::resolve`]: an HTTP request or process arguments.
#[derive(Debug)]
pub enum RouteInput<'a> {
    Http(&'a Request),
    Cli(&'a CliArgs),
}

/// The closed set of routing strategies, built by [`build_router`].
#[derive(Debug, Clone)]
pub enum AnyRouter {
    Rewrite(RewriteRouter),
    Simple(SimpleRouter),
    Console(ConsoleRouter),
}

impl AnyRouter {
    /// Resolve an input against the configured strategy.
    ///
    /// Handing CLI input to an HTTP strategy (or vice versa) resolves to
    /// nothing, mirroring an unmatched request.
    pub fn resolve(&self, input: &RouteInput<'_>) -> Result<Resolved, RouteError> {
        let result = match (self, input) {
            (AnyRouter::Rewrite(r), RouteInput::Http(req)) => {
                r.resolve(req.method(), req.path())
            }
            (AnyRouter::Simple(r), RouteInput::Http(req)) => r.resolve(req),
            (AnyRouter::Console(r), RouteInput::Cli(args)) => r.resolve(args),
            _ => Err(RouteError::NotFound {
                path: String::new(),
            }),
        };
        metrics::record_route_resolution(&result);
        result
    }

    /// Reverse-generate a URL for `target`.
    ///
    /// Console routing has no URL space, so reverse generation fails there.
    pub fn make_url(
        &self,
        target: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, RouteError> {
        match self {
            AnyRouter::Rewrite(r) => r.make_url(target, params),
            AnyRouter::Simple(r) => Ok(r.make_url(target, params)),
            AnyRouter::Console(_) => Err(RouteError::NoRouteForTarget {
                target: target.to_string(),
            }),
        }
    }
}

/// Strategy factory: the single startup site where a strategy name becomes
/// a concrete router.
pub fn build_router(
    strategy: RouterStrategy,
    default_route: Option<String>,
    route_param: &str,
    types: TypeRegistry,
    defs: Vec<RouteDef>,
    groups: Vec<(String, Vec<RouteDef>)>,
) -> Result<AnyRouter, RouteError> {
    match strategy {
        RouterStrategy::Rewrite => {
            let mut router = RewriteRouter::new(default_route).with_types(types);
            router.add_config(defs)?;
            for (prefix, group_defs) in groups {
                router.add_group(&prefix, group_defs)?;
            }
            Ok(AnyRouter::Rewrite(router))
        }
        RouterStrategy::Simple => Ok(AnyRouter::Simple(SimpleRouter::new(
            route_param,
            default_route,
        ))),
        RouterStrategy::Console => Ok(AnyRouter::Console(ConsoleRouter::new(default_route))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    #[test]
    fn test_factory_builds_each_strategy() {
        for strategy in [
            RouterStrategy::Rewrite,
            RouterStrategy::Simple,
            RouterStrategy::Console,
        ] {
            let router = build_router(
                strategy,
                Some("home/index".to_string()),
                DEFAULT_ROUTE_PARAM,
                TypeRegistry::new(),
                vec![RouteDef::new("/", "home/index")],
                Vec::new(),
            )
            .unwrap();
            match (strategy, router) {
                (RouterStrategy::Rewrite, AnyRouter::Rewrite(_))
                | (RouterStrategy::Simple, AnyRouter::Simple(_))
                | (RouterStrategy::Console, AnyRouter::Console(_)) => {}
                (s, r) => panic!("strategy {s:?} built {r:?}"),
            }
        }
    }

    #[test]
    fn test_factory_fails_fast_on_bad_pattern() {
        let err = build_router(
            RouterStrategy::Rewrite,
            None,
            DEFAULT_ROUTE_PARAM,
            TypeRegistry::new(),
            vec![RouteDef::new("/x/{id:nope}", "t")],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
    }

    #[test]
    fn test_mismatched_input_resolves_to_nothing() {
        let router = build_router(
            RouterStrategy::Console,
            None,
            DEFAULT_ROUTE_PARAM,
            TypeRegistry::new(),
            Vec::new(),
            Vec::new(),
        )
        .unwrap();

        let uri: Uri = "/x".parse().unwrap();
        let req = Request::new(Method::GET, &uri);
        assert!(router.resolve(&RouteInput::Http(&req)).is_err());
    }

    #[test]
    fn test_any_router_round_trip() {
        let router = build_router(
            RouterStrategy::Rewrite,
            None,
            DEFAULT_ROUTE_PARAM,
            TypeRegistry::new(),
            vec![RouteDef::new("/user/:id", "user/info")],
            Vec::new(),
        )
        .unwrap();

        let mut params = BTreeMap::new();
        params.insert("id".to_string(), "123".to_string());
        let url = router.make_url("user/info", &params).unwrap();

        let uri: Uri = url.parse().unwrap();
        let req = Request::new(Method::GET, &uri);
        let resolved = router.resolve(&RouteInput::Http(&req)).unwrap();
        assert_eq!(resolved.target, "user/info");
        assert_eq!(resolved.params.get("id").map(String::as_str), Some("123"));
    }
}
