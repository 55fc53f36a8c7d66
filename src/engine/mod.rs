//! Contract-mock engine subsystem.
//!
//! # Data Flow
//! ```text
//! DispatchGateway (FORWARD)
//!     → EngineRequest { method, path?query, headers, body } + Option<ProxyDirective>
//!     → MockEngine::request (remote.rs talks to the external engine)
//!     → EngineResponse { status, headers, body, violations } | EngineError
//!
//! Startup:
//!     openapi_url → document.rs (fetch, recognise root) → OpenApiDocument
//! ```
//!
//! # Design Decisions
//! - The engine is opaque; this crate depends only on the request/response shape
//! - A ProxyDirective tells the engine to re-enter this server's `/_` namespace
//! - Contract violations are data on a successful response, not errors

pub mod document;
pub mod remote;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub use document::{load_document, DocumentError, OpenApiDocument};
pub use remote::HttpMockEngine;

/// Errors raised while talking to the mock engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be reached or the exchange broke off.
    #[error("{0}")]
    Transport(String),

    /// No answer within the configured timeout.
    #[error("mock engine did not respond within {0} seconds")]
    Timeout(u64),

    /// The target URL could not be built.
    #[error("invalid engine URL: {0}")]
    InvalidUrl(String),

    /// The engine's response body could not be read.
    #[error("failed to read engine response: {0}")]
    Body(String),
}

/// Out-of-band instruction to route a request through the custom-handler
/// namespace at `upstream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDirective {
    pub is_proxy: bool,
    pub upstream: Url,
}

impl ProxyDirective {
    /// Directive pointing at `http://localhost:<port>/_/`.
    pub fn local(port: u16) -> Result<Self, url::ParseError> {
        Ok(Self {
            is_proxy: true,
            upstream: Url::parse(&format!("http://localhost:{}/_/", port))?,
        })
    }
}

/// Request handed to the engine.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub method: Method,
    /// Original path and query, untouched.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl EngineRequest {
    /// Lowercase HTTP verb, e.g. `get`.
    pub fn verb(&self) -> String {
        self.method.as_str().to_ascii_lowercase()
    }
}

/// Inbound and outbound contract violations reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Violations {
    pub input: Vec<serde_json::Value>,
    pub output: Vec<serde_json::Value>,
}

impl Violations {
    pub fn is_empty(&self) -> bool {
        self.input.is_empty() && self.output.is_empty()
    }
}

/// Engine result for one request.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub violations: Violations,
}

/// The contract-mock backend.
#[async_trait]
pub trait MockEngine: Send + Sync {
    /// Execute `request`. Completes exactly once, with a response or an error.
    async fn request(
        &self,
        request: EngineRequest,
        proxy: Option<ProxyDirective>,
    ) -> Result<EngineResponse, EngineError>;
}
