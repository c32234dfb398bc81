//! Explicit per-request context carried through the middleware pipeline and
//! handed to route handlers via request extensions.

use std::time::Instant;

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use uuid::Uuid;

use super::principal::Principal;

/// Response written by a middleware handler to terminate the chain early.
#[derive(Debug, Clone)]
pub struct EarlyResponse {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id, assigned at pipeline entry and reused on the
    /// completion log line.
    pub request_id: String,
    pub started_at: Instant,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// At most one principal per request; set by the session middleware.
    pub principal: Option<Principal>,
    /// Instructs the caller to discard its stored token via the
    /// `clear-session: true` response header.
    pub clear_session: bool,
    response: Option<EarlyResponse>,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            started_at: Instant::now(),
            method,
            uri,
            headers,
            principal: None,
            clear_session: false,
            response: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First write wins; later handlers in the chain never run once a
    /// response is present.
    pub fn respond<B: Into<String>>(&mut self, status: StatusCode, body: B) {
        if self.response.is_none() {
            self.response = Some(EarlyResponse { status, body: body.into() });
        }
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    pub fn take_response(&mut self) -> Option<EarlyResponse> {
        self.response.take()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}
