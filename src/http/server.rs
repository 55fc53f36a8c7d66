//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all dispatch handler
//! - Wire up middleware (tracing, request ID, body limit)
//! - Bind server to listener
//! - Hand every request to the DispatchGateway
//! - Graceful shutdown on signal or trigger

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::engine::MockEngine;
use crate::http::gateway::DispatchGateway;
use crate::http::request::{request_id, MakeRequestUuid};
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::metrics;
use crate::routing::HandlerRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<DispatchGateway>,
}

/// HTTP server for the mock server.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server.
    ///
    /// `registry: None` means no custom handlers are configured at all.
    pub fn new(
        config: ServerConfig,
        registry: Option<HandlerRegistry>,
        engine: Arc<dyn MockEngine>,
    ) -> Result<Self, url::ParseError> {
        let gateway = DispatchGateway::new(
            registry.map(Arc::new),
            engine,
            config.listener.port,
        )?;

        let state = AppState {
            gateway: Arc::new(gateway),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {},
                    _ = shutdown.recv() => {},
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Catch-all handler: every method, every path.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts);
    let method = parts.method.to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %parts.uri.path(),
        "Dispatching request"
    );

    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large or unreadable")
                .into_response();
        }
    };

    let outcome = state.gateway.dispatch(parts, body).await;
    let status = outcome.status();

    tracing::debug!(
        request_id = %request_id,
        tier = outcome.tier(),
        status = status.as_u16(),
        failed = outcome.is_failure(),
        "Request dispatched"
    );
    metrics::record_request(&method, outcome.tier(), status.as_u16(), start_time);

    outcome.into_response()
}
