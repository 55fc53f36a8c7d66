//! OpenAPI mock server library.
//!
//! Requests matching documented operations are answered by an external
//! contract-mock engine; paths claimed by custom handlers are answered
//! directly under the reserved `/_` namespace.

pub mod config;
pub mod engine;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use handlers::{delete, get, patch, post, put, HandlerEntry, HandlerFault};
pub use http::{HttpServer, RequestContext, ResponseValue};
pub use lifecycle::Shutdown;
pub use routing::{HandlerRegistry, RoutePattern};
