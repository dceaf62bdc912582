//! Inbound request carrier.
//!
//! # Responsibilities
//! - Carry method, path, query parameters and headers for routing
//! - Generate a unique request ID (UUID v4) for tracing
//! - Parse the query string once, at construction
//!
//! # Design Decisions
//! - Request ID assigned at construction so it flows through all logs
//! - Query params stored in a BTreeMap for deterministic iteration
//! - The carrier is read-only after construction; routing never mutates it

use std::collections::BTreeMap;

use axum::http::{HeaderMap, Method, Uri};
use uuid::Uuid;

/// An inbound HTTP request, reduced to the parts routing cares about.
#[derive(Debug, Clone)]
pub struct Request {
    id: Uuid,
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    headers: HeaderMap,
}

impl Request {
    /// Build a request carrier from method and URI, parsing the query string.
    pub fn new(method: Method, uri: &Uri) -> Self {
        let query = uri.query().map(parse_query).unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            method,
            path: uri.path().to_string(),
            query,
            headers: HeaderMap::new(),
        }
    }

    /// Attach headers captured from the underlying HTTP layer.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Unique ID assigned to this request.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Look up a single query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// All query parameters, in key order.
    pub fn query_params(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Look up a header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Decode an `application/x-www-form-urlencoded` query string.
///
/// Later duplicates win, matching typical query-parameter semantics.
fn parse_query(raw: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
