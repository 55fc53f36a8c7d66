//! Request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Reconstruct the absolute external URL seen by the client
//! - Build the per-request context handed to custom handlers
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The context is a plain value, built per request and dropped afterwards

use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request-id generator used by the request-id layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Read the request ID set by the request-id layer.
pub fn request_id(parts: &Parts) -> String {
    parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// What a custom handler gets to see of the inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    absolute_url: String,
}

impl RequestContext {
    pub fn new(absolute_url: impl Into<String>) -> Self {
        Self {
            absolute_url: absolute_url.into(),
        }
    }

    /// Build the context from transport fields: `http://<host><path?query>`.
    ///
    /// `fallback_host` is used when the request carries no `Host` header.
    pub fn from_parts(parts: &Parts, fallback_host: &str) -> Self {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or(fallback_host);

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Self::new(format!("http://{}{}", host, path_and_query))
    }

    /// The full URL of the request, reserved prefix included.
    pub fn absolute_url(&self) -> &str {
        &self.absolute_url
    }

    /// Path of [`RequestContext::absolute_url`] exactly as received.
    ///
    /// Unlike [`RequestContext::url`] this keeps dot segments and does not
    /// percent-encode, so it is the same path the registry matched.
    pub fn path(&self) -> &str {
        let url = self.absolute_url.as_str();
        let rest = url.find("://").map_or(url, |i| &url[i + 3..]);
        let path = rest.find('/').map_or("/", |i| &rest[i..]);

        match path.find(|c| c == '?' || c == '#') {
            Some(end) => &path[..end],
            None => path,
        }
    }

    /// Parsed form of [`RequestContext::absolute_url`]. Dot segments are
    /// resolved and the path is percent-encoded.
    pub fn url(&self) -> Option<url::Url> {
        url::Url::parse(&self.absolute_url).ok()
    }
}
