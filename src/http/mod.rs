//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, catch-all route)
//!     → request.rs (request ID, absolute URL, RequestContext)
//!     → gateway.rs (custom tier or forward to mock engine)
//!     → response.rs (custom handler ResponseValue → HTTP)
//!     → Send to client
//! ```

pub mod gateway;
pub mod request;
pub mod response;
pub mod server;

pub use gateway::{DispatchGateway, DispatchOutcome, RESERVED_PREFIX};
pub use request::{RequestContext, X_REQUEST_ID};
pub use response::ResponseValue;
pub use server::HttpServer;
