//! Pattern-matching routing strategy.
//!
//! # Responsibilities
//! - Hold the compiled route table (built once, immutable while serving)
//! - Resolve (method, path) to a target and extracted parameters
//! - Reverse-generate URLs from a target and a parameter set
//!
//! # Design Decisions
//! - First match wins, in registration order, across config merges
//! - MethodNotAllowed only after at least one structural match exists
//! - Unmatched paths fall back to the default route (full path passed
//!   through as the `path` parameter), else RouteNotFound
//! - Reverse generation picks the first route for the target whose capture
//!   names are all supplied; leftovers become a query string in key order

use std::collections::BTreeMap;

use axum::http::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::routing::pattern::{split_segments, CompiledRoute, Token, TypeRegistry};
use crate::routing::{Resolved, RouteDef, RouteError};

/// Parameter name under which the default-route fallback receives the
/// original (canonicalized) path.
pub const FALLBACK_PATH_PARAM: &str = "path";

/// Characters percent-encoded when substituting a value into a path segment.
const SEGMENT_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'=');

/// Router backed by compiled path patterns.
#[derive(Debug, Clone, Default)]
pub struct RewriteRouter {
    routes: Vec<CompiledRoute>,
    default_route: Option<String>,
    types: TypeRegistry,
}

impl RewriteRouter {
    pub fn new(default_route: Option<String>) -> Self {
        Self {
            routes: Vec::new(),
            default_route,
            types: TypeRegistry::new(),
        }
    }

    /// Replace the capture-type registry. Must be called before routes are
    /// registered so compilation sees every custom type.
    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    /// Register route definitions, appending in order.
    ///
    /// Invalid patterns abort registration with [`RouteError::InvalidPattern`];
    /// startup should treat that as fatal.
    pub fn add_config<I>(&mut self, defs: I) -> Result<(), RouteError>
    where
        I: IntoIterator<Item = RouteDef>,
    {
        for def in defs {
            let compiled = CompiledRoute::compile(
                &def.pattern,
                &def.target,
                def.methods,
                def.defaults,
                &self.types,
            )?;
            self.routes.push(compiled);
        }
        Ok(())
    }

    /// Register route definitions under a shared path prefix.
    pub fn add_group<I>(&mut self, prefix: &str, defs: I) -> Result<(), RouteError>
    where
        I: IntoIterator<Item = RouteDef>,
    {
        let prefix = prefix.trim_end_matches('/');
        self.add_config(defs.into_iter().map(|mut def| {
            let tail = def.pattern.trim_start_matches('/');
            def.pattern = format!("{prefix}/{tail}");
            def
        }))
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve an inbound (method, path) pair.
    ///
    /// The path may still carry a query string; it is stripped before
    /// canonicalization.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<Resolved, RouteError> {
        let bare = path.split('?').next().unwrap_or(path);
        let segments: Vec<&str> = split_segments(bare).collect();

        let mut structural_hit = false;
        for route in &self.routes {
            let Some(captures) = route.try_match(&segments, &self.types) else {
                continue;
            };
            if !route.methods.allows(method) {
                structural_hit = true;
                continue;
            }

            let mut params = captures.clone();
            for (name, value) in &route.defaults {
                if params.contains_key(name) {
                    continue;
                }
                // A `$name` default derives its value from a capture.
                let derived = value
                    .strip_prefix('$')
                    .and_then(|n| captures.get(n).cloned())
                    .unwrap_or_else(|| value.clone());
                params.insert(name.clone(), derived);
            }

            return Ok(Resolved {
                target: route.target.clone(),
                params,
                method: Some(method.clone()),
            });
        }

        if structural_hit {
            return Err(RouteError::MethodNotAllowed {
                method: method.clone(),
                path: bare.to_string(),
            });
        }

        if let Some(default) = &self.default_route {
            let canonical = format!("/{}", segments.join("/"));
            let mut params = BTreeMap::new();
            params.insert(FALLBACK_PATH_PARAM.to_string(), canonical);
            return Ok(Resolved {
                target: default.clone(),
                params,
                method: Some(method.clone()),
            });
        }

        Err(RouteError::NotFound {
            path: bare.to_string(),
        })
    }

    /// Reverse-generate a URL for `target` from `params`.
    pub fn make_url(
        &self,
        target: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, RouteError> {
        for route in self.routes.iter().filter(|r| r.target == target) {
            if !route.capture_names().all(|name| params.contains_key(name)) {
                continue;
            }

            let mut consumed: Vec<&str> = Vec::new();
            let mut path = String::new();
            for token in route.tokens() {
                path.push('/');
                match token {
                    Token::Literal(lit) => path.push_str(lit),
                    Token::Capture { name, .. } => {
                        let value = &params[name];
                        path.extend(utf8_percent_encode(value, SEGMENT_ENCODE));
                        consumed.push(name);
                    }
                }
            }
            if path.is_empty() {
                path.push('/');
            }

            // Leftovers become the query string; BTreeMap iteration keeps
            // the order stable and alphabetical.
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            let mut any_left = false;
            for (key, value) in params {
                if consumed.contains(&key.as_str()) {
                    continue;
                }
                query.append_pair(key, value);
                any_left = true;
            }
            if any_left {
                path.push('?');
                path.push_str(&query.finish());
            }

            return Ok(path);
        }

        Err(RouteError::NoRouteForTarget {
            target: target.to_string(),
        })
    }
}
