//! OpenAPI mock server.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 MOCK SERVER                  │
//!     Client Request      │  ┌────────┐    ┌──────────┐                  │
//!     ────────────────────┼─▶│ server │───▶│ gateway  │                  │
//!                         │  └────────┘    └────┬─────┘                  │
//!                         │        /_/<path>    │     any other path     │
//!                         │          ┌──────────┴──────────┐             │
//!                         │          ▼                     ▼             │
//!                         │   ┌─────────────┐       ┌─────────────┐      │      ┌────────────┐
//!                         │   │  handlers   │       │   engine    │──────┼─────▶│ contract-  │
//!                         │   │  registry   │       │   adapter   │◀─────┼──────│ mock engine│
//!                         │   └─────────────┘       └─────────────┘      │      └────────────┘
//!                         │          ▲                     │             │
//!                         │          └──── proxy via /_ ───┘             │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use openapi_mockserver::config::{read_config, ServerConfig};
use openapi_mockserver::lifecycle::{self, Shutdown};
use openapi_mockserver::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "openapi-mockserver")]
#[command(about = "A mock server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the mock server
    Start(StartArgs),
}

#[derive(clap::Args)]
struct StartArgs {
    /// OpenAPI document URL or path
    openapi_url: Option<String>,

    /// Path to custom handlers
    #[arg(long)]
    handlers: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the contract-mock engine
    #[arg(long)]
    engine_url: Option<String>,

    /// Validating proxy for paths claimed by custom handlers
    #[arg(long)]
    engine_proxy_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl StartArgs {
    /// File configuration (if any) with command-line values on top.
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(url) = self.openapi_url {
            config.openapi_url = url;
        }
        if let Some(handlers) = self.handlers {
            config.handlers = Some(handlers);
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(url) = self.engine_url {
            config.engine.url = url;
        }
        if let Some(url) = self.engine_proxy_url {
            config.engine.proxy_url = Some(url);
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let Commands::Start(args) = Cli::parse().command;

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.observability);
    tracing::info!("Starting mock server...");

    let shutdown = Shutdown::new();
    match lifecycle::run(config, &shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Mock server failed");
            ExitCode::FAILURE
        }
    }
}
