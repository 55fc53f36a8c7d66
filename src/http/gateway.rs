//! Two-tier request dispatch.
//!
//! # Request States
//! ```text
//! RECEIVED
//!     → path matches ^/_(/.+) and a registry is configured?
//!         yes → CUSTOM_LOOKUP on the suffix
//!               match    → invoke handler → RESPONDED (200) | FAILED (500)
//!               no match → FORWARD (path left intact)
//!         no  → FORWARD
//! FORWARD
//!     → original path claimed by a custom handler? attach ProxyDirective
//!     → MockEngine::request
//!         violations     → RESPONDED (400, violation detail)
//!         clean response → RESPONDED (engine status/headers/body)
//!         error          → FAILED (500)
//! ```
//!
//! # Design Decisions
//! - Every per-request fault ends as a response; nothing escapes the gateway
//! - The custom tier is a direct call, the forward tier a single future
//! - No retries and no timeout at this layer
//! - Unclaimed `/_` requests are forwarded instead of answered with 404

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::engine::{EngineError, EngineRequest, EngineResponse, MockEngine, ProxyDirective, Violations};
use crate::handlers::HandlerFault;
use crate::http::request::RequestContext;
use crate::http::response::ResponseValue;
use crate::routing::HandlerRegistry;

/// Prefix of the custom-handler namespace.
pub const RESERVED_PREFIX: &str = "/_";

pub const CUSTOM_HANDLER_FAILED: &str = "Custom handler failed";
pub const MOCK_FAILED: &str = "Mock failed";

/// Return the handler path inside the reserved namespace, if `path` is in it.
///
/// `/_/api/users` yields `/api/users`; `/_/` and `/_x` yield nothing.
pub fn reserved_suffix(path: &str) -> Option<&str> {
    path.strip_prefix(RESERVED_PREFIX)
        .filter(|suffix| suffix.starts_with('/') && suffix.len() > 1)
}

/// Terminal state of one dispatched request.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A custom handler answered.
    Custom(ResponseValue),
    /// A custom handler failed.
    HandlerFailed(HandlerFault),
    /// The engine reported contract violations.
    Violations(Violations),
    /// The engine answered cleanly.
    Mocked(EngineResponse),
    /// The engine request failed.
    EngineFailed(EngineError),
}

impl DispatchOutcome {
    /// Which tier produced this outcome, for logs and metrics.
    pub fn tier(&self) -> &'static str {
        match self {
            DispatchOutcome::Custom(_) | DispatchOutcome::HandlerFailed(_) => "custom",
            _ => "engine",
        }
    }

    /// True for the FAILED terminal state.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::HandlerFailed(_) | DispatchOutcome::EngineFailed(_)
        )
    }

    /// Status the client will see.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchOutcome::Custom(_) => StatusCode::OK,
            DispatchOutcome::Violations(_) => StatusCode::BAD_REQUEST,
            DispatchOutcome::Mocked(response) => response.status,
            DispatchOutcome::HandlerFailed(_) | DispatchOutcome::EngineFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn failure(label: &str, detail: String) -> Response<Body> {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": label, "detail": detail })),
    )
        .into_response()
}

impl IntoResponse for DispatchOutcome {
    fn into_response(self) -> Response<Body> {
        match self {
            DispatchOutcome::Custom(value) => match value.into_http() {
                Ok(response) => response,
                Err(e) => failure(CUSTOM_HANDLER_FAILED, e.to_string()),
            },
            DispatchOutcome::HandlerFailed(fault) => {
                failure(CUSTOM_HANDLER_FAILED, fault.to_string())
            }
            DispatchOutcome::Violations(violations) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "violations": violations })),
            )
                .into_response(),
            DispatchOutcome::Mocked(engine) => {
                let mut response = Response::new(Body::from(engine.body));
                *response.status_mut() = engine.status;
                *response.headers_mut() = engine.headers;
                response
            }
            DispatchOutcome::EngineFailed(e) => failure(MOCK_FAILED, e.to_string()),
        }
    }
}

/// Front controller choosing between the custom tier and the engine.
pub struct DispatchGateway {
    registry: Option<Arc<HandlerRegistry>>,
    engine: Arc<dyn MockEngine>,
    proxy: ProxyDirective,
    fallback_host: String,
}

impl DispatchGateway {
    /// Create a gateway. `registry: None` disables the custom tier entirely;
    /// `port` is the port this server listens on.
    pub fn new(
        registry: Option<Arc<HandlerRegistry>>,
        engine: Arc<dyn MockEngine>,
        port: u16,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            registry,
            engine,
            proxy: ProxyDirective::local(port)?,
            fallback_host: format!("localhost:{}", port),
        })
    }

    /// Dispatch one request to its terminal state.
    pub async fn dispatch(&self, parts: Parts, body: Bytes) -> DispatchOutcome {
        if let Some(outcome) = self.try_custom(&parts) {
            return outcome;
        }
        self.forward(parts, body).await
    }

    /// Custom tier. `None` means the request was not claimed and must be
    /// forwarded.
    pub fn try_custom(&self, parts: &Parts) -> Option<DispatchOutcome> {
        let registry = self.registry.as_ref()?;
        let path = parts.uri.path();
        let suffix = reserved_suffix(path)?;

        let Some(entry) = registry.find(suffix) else {
            tracing::debug!(path = %path, "No custom handler for reserved path, forwarding");
            return None;
        };

        let ctx = RequestContext::from_parts(parts, &self.fallback_host);
        let outcome = match entry.invoke(ctx) {
            Ok(value) => DispatchOutcome::Custom(value),
            Err(fault) => {
                tracing::error!(
                    path = %path,
                    pattern = %entry.pattern(),
                    error = %fault,
                    "Custom handler failed"
                );
                DispatchOutcome::HandlerFailed(fault)
            }
        };
        Some(outcome)
    }

    /// Directive for a forwarded request whose original path a custom
    /// handler claims.
    pub fn proxy_directive(&self, path: &str) -> Option<ProxyDirective> {
        let registry = self.registry.as_ref()?;
        registry.find(path).map(|_| self.proxy.clone())
    }

    /// Forward tier.
    pub async fn forward(&self, parts: Parts, body: Bytes) -> DispatchOutcome {
        let directive = self.proxy_directive(parts.uri.path());
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        let request = EngineRequest {
            method: parts.method,
            path,
            headers: parts.headers,
            body,
        };

        match self.engine.request(request, directive).await {
            Ok(response) if !response.violations.is_empty() => {
                tracing::warn!(
                    input = response.violations.input.len(),
                    output = response.violations.output.len(),
                    "Mock engine reported contract violations"
                );
                DispatchOutcome::Violations(response.violations)
            }
            Ok(response) => DispatchOutcome::Mocked(response),
            Err(e) => {
                tracing::error!(error = %e, "Mock engine request failed");
                DispatchOutcome::EngineFailed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::get;
    use async_trait::async_trait;
    use axum::http::{HeaderMap, Method, Request};
    use std::sync::Mutex;

    /// Records every call and replies with a canned result.
    struct FakeEngine {
        calls: Mutex<Vec<(String, String, Option<ProxyDirective>)>>,
        reply: fn() -> Result<EngineResponse, EngineError>,
    }

    impl FakeEngine {
        fn new(reply: fn() -> Result<EngineResponse, EngineError>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply,
            })
        }

        fn calls(&self) -> Vec<(String, String, Option<ProxyDirective>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MockEngine for FakeEngine {
        async fn request(
            &self,
            request: EngineRequest,
            proxy: Option<ProxyDirective>,
        ) -> Result<EngineResponse, EngineError> {
            self.calls
                .lock()
                .unwrap()
                .push((request.verb(), request.path, proxy));
            (self.reply)()
        }
    }

    fn ok_reply() -> Result<EngineResponse, EngineError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        Ok(EngineResponse {
            status: StatusCode::CREATED,
            headers,
            body: Bytes::from_static(br#"{"message":"success"}"#),
            violations: Violations::default(),
        })
    }

    fn violation_reply() -> Result<EngineResponse, EngineError> {
        Ok(EngineResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"ignored"),
            violations: Violations {
                input: vec![json!({ "message": "bad" })],
                output: vec![],
            },
        })
    }

    fn error_reply() -> Result<EngineResponse, EngineError> {
        Err(EngineError::Transport("Prism error".into()))
    }

    fn parts(method: Method, uri: &str) -> Parts {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Host", "localhost:6677")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn registry(entries: Vec<crate::handlers::HandlerEntry>) -> Option<Arc<HandlerRegistry>> {
        Some(Arc::new(HandlerRegistry::new(entries)))
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn echo_registry() -> Option<Arc<HandlerRegistry>> {
        registry(vec![get("/api/users/:id", |req| {
            let url = req.url().ok_or_else(|| HandlerFault::message("bad url"))?;
            let id = url.path().rsplit('/').next().unwrap_or_default().to_string();
            Ok(ResponseValue::json(&json!({ "echo": id }))?)
        })])
    }

    #[test]
    fn test_reserved_suffix() {
        assert_eq!(reserved_suffix("/_/api/test"), Some("/api/test"));
        assert_eq!(reserved_suffix("/_/x"), Some("/x"));
        assert_eq!(reserved_suffix("/_/"), None);
        assert_eq!(reserved_suffix("/_"), None);
        assert_eq!(reserved_suffix("/_x/y"), None);
        assert_eq!(reserved_suffix("/api/test"), None);
    }

    #[tokio::test]
    async fn test_custom_handler_answers() {
        let engine = FakeEngine::new(ok_reply);
        let gateway = DispatchGateway::new(echo_registry(), engine.clone(), 6677).unwrap();

        let outcome = gateway
            .dispatch(parts(Method::GET, "/_/api/users/42"), Bytes::new())
            .await;
        assert_eq!(outcome.status(), StatusCode::OK);
        assert_eq!(outcome.tier(), "custom");

        let response = outcome.into_response();
        assert_eq!(response.headers()["content-type"], "application/json");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"echo":"42"}"#);
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_handler_sees_absolute_url() {
        let engine = FakeEngine::new(ok_reply);
        let reg = registry(vec![get("/api/test", |req| {
            Ok(ResponseValue::json(&json!({ "message": "test", "url": req.absolute_url() }))?)
        })]);
        let gateway = DispatchGateway::new(reg, engine, 6677).unwrap();

        let outcome = gateway
            .dispatch(parts(Method::GET, "/_/api/test"), Bytes::new())
            .await;
        assert_eq!(
            body_json(outcome.into_response()).await,
            json!({ "message": "test", "url": "http://localhost:6677/_/api/test" })
        );
    }

    #[tokio::test]
    async fn test_unclaimed_reserved_path_is_forwarded_intact() {
        let engine = FakeEngine::new(ok_reply);
        let reg = registry(vec![get("/api/test", |_| Ok(ResponseValue::of("t")))]);
        let gateway = DispatchGateway::new(reg, engine.clone(), 6677).unwrap();

        let outcome = gateway
            .dispatch(parts(Method::GET, "/_/api/other"), Bytes::new())
            .await;

        assert_eq!(outcome.tier(), "engine");
        assert_eq!(engine.calls(), vec![("get".to_string(), "/_/api/other".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_without_registry_reserved_path_is_forwarded() {
        let engine = FakeEngine::new(ok_reply);
        let gateway = DispatchGateway::new(None, engine.clone(), 6677).unwrap();

        gateway
            .dispatch(parts(Method::GET, "/_/api/test"), Bytes::new())
            .await;

        assert_eq!(engine.calls(), vec![("get".to_string(), "/_/api/test".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_handler_fault_is_500() {
        let engine = FakeEngine::new(ok_reply);
        let reg = registry(vec![get("/x", |_| Err(HandlerFault::message("boom")))]);
        let gateway = DispatchGateway::new(reg, engine.clone(), 6677).unwrap();

        let outcome = gateway.dispatch(parts(Method::GET, "/_/x"), Bytes::new()).await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = outcome.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Custom handler failed", "detail": "boom" })
        );
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_handler_panic_without_message_is_unknown_error() {
        let engine = FakeEngine::new(ok_reply);
        let reg = registry(vec![get("/api/error", |_| std::panic::panic_any(7_i32))]);
        let gateway = DispatchGateway::new(reg, engine, 6677).unwrap();

        let outcome = gateway
            .dispatch(parts(Method::GET, "/_/api/error"), Bytes::new())
            .await;
        assert_eq!(
            body_json(outcome.into_response()).await,
            json!({ "error": "Custom handler failed", "detail": "Unknown error" })
        );
    }

    #[tokio::test]
    async fn test_handler_bad_header_is_500() {
        let engine = FakeEngine::new(ok_reply);
        let reg = registry(vec![get("/h", |_| Ok(ResponseValue::of("x").header("bad\nname", "v")))]);
        let gateway = DispatchGateway::new(reg, engine, 6677).unwrap();

        let response = gateway
            .dispatch(parts(Method::GET, "/_/h"), Bytes::new())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Custom handler failed");
    }

    #[tokio::test]
    async fn test_engine_response_passed_through() {
        let engine = FakeEngine::new(ok_reply);
        let gateway = DispatchGateway::new(None, engine.clone(), 6677).unwrap();

        let response = gateway
            .dispatch(parts(Method::GET, "/api/users?page=2"), Bytes::new())
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(body_json(response).await, json!({ "message": "success" }));
        assert_eq!(engine.calls(), vec![("get".to_string(), "/api/users?page=2".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_violations_are_400() {
        let engine = FakeEngine::new(violation_reply);
        let gateway = DispatchGateway::new(None, engine, 6677).unwrap();

        let outcome = gateway
            .dispatch(parts(Method::POST, "/api/users"), Bytes::new())
            .await;
        assert!(!outcome.is_failure());

        let response = outcome.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "violations": { "input": [{ "message": "bad" }], "output": [] } })
        );
    }

    #[tokio::test]
    async fn test_engine_error_is_500() {
        let engine = FakeEngine::new(error_reply);
        let gateway = DispatchGateway::new(None, engine, 6677).unwrap();

        let outcome = gateway
            .dispatch(parts(Method::GET, "/api/users"), Bytes::new())
            .await;
        assert!(outcome.is_failure());
        assert_eq!(
            body_json(outcome.into_response()).await,
            json!({ "error": "Mock failed", "detail": "Prism error" })
        );
    }

    #[tokio::test]
    async fn test_proxy_directive_for_claimed_path() {
        let engine = FakeEngine::new(ok_reply);
        let reg = registry(vec![get("/api/custom", |_| {
            Ok(ResponseValue::json(&json!({ "message": "custom" }))?)
        })]);
        let gateway = DispatchGateway::new(reg, engine.clone(), 8080).unwrap();

        gateway
            .dispatch(parts(Method::GET, "/api/custom"), Bytes::new())
            .await;

        let calls = engine.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "/api/custom");
        let directive = calls[0].2.clone().unwrap();
        assert!(directive.is_proxy);
        assert_eq!(directive.upstream.as_str(), "http://localhost:8080/_/");
    }

    #[tokio::test]
    async fn test_proxy_check_ignores_query_and_method() {
        let engine = FakeEngine::new(ok_reply);
        let reg = registry(vec![get("/api/custom", |_| Ok(ResponseValue::of("c")))]);
        let gateway = DispatchGateway::new(reg, engine.clone(), 6677).unwrap();

        gateway
            .dispatch(parts(Method::DELETE, "/api/custom?x=1"), Bytes::new())
            .await;

        let calls = engine.calls();
        assert_eq!(calls[0].0, "delete");
        assert_eq!(calls[0].1, "/api/custom?x=1");
        assert!(calls[0].2.is_some());
    }

    #[tokio::test]
    async fn test_same_request_twice_is_identical() {
        let engine = FakeEngine::new(ok_reply);
        let gateway = DispatchGateway::new(echo_registry(), engine, 6677).unwrap();

        let mut bodies = Vec::new();
        for _ in 0..2 {
            let response = gateway
                .dispatch(parts(Method::GET, "/_/api/users/7"), Bytes::new())
                .await
                .into_response();
            let headers = format!("{:?}", response.headers());
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            bodies.push((headers, bytes));
        }
        assert_eq!(bodies[0], bodies[1]);
    }
}
