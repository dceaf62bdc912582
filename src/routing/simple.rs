//! Query-parameter routing strategy.
//!
//! # Responsibilities
//! - Read the target straight from a designated query parameter
//! - Pass the remaining query parameters through as route params
//!
//! # Design Decisions
//! - No pattern matching and no captures; this strategy exists for
//!   deployments without URL rewriting
//! - Reverse generation always succeeds: it emits `?r=target&k=v`

use std::collections::BTreeMap;

use crate::http::Request;
use crate::routing::{Resolved, RouteError};

/// Default name of the query parameter carrying the route target.
pub const DEFAULT_ROUTE_PARAM: &str = "r";

/// Router that reads the target from a query parameter.
#[derive(Debug, Clone)]
pub struct SimpleRouter {
    route_param: String,
    default_route: Option<String>,
}

impl SimpleRouter {
    pub fn new(route_param: impl Into<String>, default_route: Option<String>) -> Self {
        Self {
            route_param: route_param.into(),
            default_route,
        }
    }

    pub fn resolve(&self, req: &Request) -> Result<Resolved, RouteError> {
        let target = req
            .query_param(&self.route_param)
            .map(str::to_string)
            .or_else(|| self.default_route.clone())
            .ok_or_else(|| RouteError::NotFound {
                path: req.path().to_string(),
            })?;

        let params: BTreeMap<String, String> = req
            .query_params()
            .iter()
            .filter(|(k, _)| k.as_str() != self.route_param)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Resolved {
            target,
            params,
            method: Some(req.method().clone()),
        })
    }

    /// Build a `?r=target&k=v` URL. Parameter order is stable (key order).
    pub fn make_url(&self, target: &str, params: &BTreeMap<String, String>) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair(&self.route_param, target);
        for (key, value) in params {
            query.append_pair(key, value);
        }
        format!("?{}", query.finish())
    }
}
