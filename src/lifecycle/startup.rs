//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Load the OpenAPI document and the custom handlers
//! - Build the engine adapter and the HTTP server
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Handlers are loaded exactly once, never at request time

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{validate_config, ConfigError, ServerConfig};
use crate::engine::{load_document, DocumentError, EngineError, HttpMockEngine};
use crate::handlers::{load_handlers, HandlerLoadError};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Fatal error raised before the server accepts requests.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Handlers(#[from] HandlerLoadError),

    #[error("failed to create mock engine adapter: {0}")]
    Engine(#[from] EngineError),

    #[error("invalid proxy upstream: {0}")]
    Upstream(#[from] url::ParseError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Validate `config`, load everything it points at and build the server.
pub async fn build_server(config: ServerConfig) -> Result<HttpServer, StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    let document = load_document(&config.openapi_url).await?;
    tracing::info!(
        location = %document.location,
        version = %document.version,
        title = document.title.as_deref().unwrap_or("untitled"),
        operations = document.operation_count,
        "OpenAPI document loaded"
    );

    let registry = match &config.handlers {
        Some(path) => {
            let registry = load_handlers(path)?;
            tracing::info!(path = ?path, handlers = registry.len(), "Custom handlers loaded");
            for entry in registry.iter() {
                tracing::debug!(
                    pattern = %entry.pattern(),
                    method = %entry.method(),
                    "Custom handler registered"
                );
            }
            Some(registry)
        }
        None => None,
    };

    let engine = HttpMockEngine::new(&config.engine)?;
    tracing::info!(engine = %config.engine.url, "Mock engine adapter ready");

    match (&config.engine.proxy_url, &registry) {
        (Some(proxy), _) => tracing::info!(
            proxy = %proxy,
            upstream = %format!("http://localhost:{}/_/", config.listener.port),
            "Claimed paths are validated through the proxy"
        ),
        (None, Some(_)) => tracing::warn!(
            "No engine.proxy_url set; custom responses on claimed paths are not validated"
        ),
        (None, None) => {}
    }

    Ok(HttpServer::new(config, registry, Arc::new(engine))?)
}

/// Build the server, bind it and serve until shutdown.
pub async fn run(config: ServerConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    let server = build_server(config).await?;
    let observability = &server.config().observability;

    if observability.metrics_enabled {
        let addr = observability
            .metrics_address
            .parse()
            .map_err(|e: std::net::AddrParseError| StartupError::Metrics(e.to_string()))?;
        metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
    }

    let address = server.config().listener.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    tracing::info!(
        address = %address,
        "Mock server running at http://localhost:{}",
        server.config().listener.port
    );

    server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Serve)
}
