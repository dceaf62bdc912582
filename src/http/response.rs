//! Outbound response carrier.
//!
//! # Responsibilities
//! - Carry status, headers and body from a handler back to the HTTP layer
//! - Provide shorthand constructors for the common cases
//!
//! # Design Decisions
//! - Body is raw bytes; content negotiation belongs to the dispatch layer
//! - Conversion into the HTTP layer's response type happens at the edge

use axum::http::{HeaderMap, HeaderValue, StatusCode};

/// An outbound response, built by a handler and rendered at the HTTP edge.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// 200 OK with a plain-text body.
    pub fn text(body: impl Into<String>) -> Self {
        let mut resp = Self::new(StatusCode::OK);
        resp.headers.insert(
            "content-type",
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        resp.body = body.into().into_bytes();
        resp
    }

    /// 200 OK with a JSON body.
    pub fn json(value: &serde_json::Value) -> Self {
        let mut resp = Self::new(StatusCode::OK);
        resp.headers
            .insert("content-type", HeaderValue::from_static("application/json"));
        resp.body = value.to_string().into_bytes();
        resp
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &'static str, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl From<Response> for axum::response::Response {
    fn from(resp: Response) -> Self {
        let mut out = axum::response::Response::new(axum::body::Body::from(resp.body));
        *out.status_mut() = resp.status;
        *out.headers_mut() = resp.headers;
        out
    }
}
