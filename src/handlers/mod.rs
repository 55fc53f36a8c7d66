//! Custom handler subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     builder fns (get/post/...) or loader.rs (declarative file)
//!     → HandlerEntry { RoutePattern, Method, produce }
//!     → HandlerRegistry (ordered, frozen)
//!
//! Per request (custom tier only):
//!     RequestContext → HandlerEntry::invoke → ResponseValue | HandlerFault
//! ```
//!
//! # Design Decisions
//! - `produce` is a plain synchronous call, not a future
//! - Handlers report failure by returning `Err(HandlerFault)`; that path is
//!   silent apart from the gateway's `tracing` event
//! - A panic inside `produce` is still caught and reported as a fault, never
//!   unwinds into the server. The process panic hook runs first, so the
//!   panic message also reaches stderr outside of `tracing`

pub mod loader;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use axum::http::Method;
use thiserror::Error;

use crate::http::request::RequestContext;
use crate::http::response::ResponseValue;
use crate::routing::RoutePattern;

pub use loader::{load_handlers, HandlerLoadError};

/// Failure raised by a custom handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerFault {
    /// Fault carrying a message.
    #[error("{0}")]
    Message(String),

    /// Fault without a usable message (e.g. a panic with a non-string payload).
    #[error("Unknown error")]
    Unknown,
}

impl HandlerFault {
    pub fn message(msg: impl Into<String>) -> Self {
        HandlerFault::Message(msg.into())
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(s) = payload.downcast_ref::<&str>() {
            HandlerFault::Message((*s).to_string())
        } else if let Some(s) = payload.downcast_ref::<String>() {
            HandlerFault::Message(s.clone())
        } else {
            HandlerFault::Unknown
        }
    }
}

impl From<serde_json::Error> for HandlerFault {
    fn from(e: serde_json::Error) -> Self {
        HandlerFault::Message(e.to_string())
    }
}

/// Signature of a handler's response producer.
pub type Produce = dyn Fn(RequestContext) -> Result<ResponseValue, HandlerFault> + Send + Sync;

/// A registered custom handler.
pub struct HandlerEntry {
    pattern: RoutePattern,
    method: Method,
    produce: Box<Produce>,
}

impl HandlerEntry {
    /// Create an entry, compiling `path` into a [`RoutePattern`].
    pub fn new<F>(path: &str, method: Method, produce: F) -> Self
    where
        F: Fn(RequestContext) -> Result<ResponseValue, HandlerFault> + Send + Sync + 'static,
    {
        Self {
            pattern: RoutePattern::compile(path),
            method,
            produce: Box::new(produce),
        }
    }

    /// Returns true if this entry's pattern matches `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.test(path)
    }

    /// Run the producer. Panics are converted into a [`HandlerFault`] after
    /// the panic hook has run; return `Err` to fail without one.
    pub fn invoke(&self, ctx: RequestContext) -> Result<ResponseValue, HandlerFault> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.produce)(ctx))) {
            Ok(result) => result,
            Err(payload) => Err(HandlerFault::from_panic(payload)),
        }
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// The method this entry was registered for. Informational only, lookup
    /// does not consult it.
    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("pattern", &self.pattern.template())
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Register a handler for GET requests.
pub fn get<F>(path: &str, produce: F) -> HandlerEntry
where
    F: Fn(RequestContext) -> Result<ResponseValue, HandlerFault> + Send + Sync + 'static,
{
    HandlerEntry::new(path, Method::GET, produce)
}

/// Register a handler for POST requests.
pub fn post<F>(path: &str, produce: F) -> HandlerEntry
where
    F: Fn(RequestContext) -> Result<ResponseValue, HandlerFault> + Send + Sync + 'static,
{
    HandlerEntry::new(path, Method::POST, produce)
}

/// Register a handler for PUT requests.
pub fn put<F>(path: &str, produce: F) -> HandlerEntry
where
    F: Fn(RequestContext) -> Result<ResponseValue, HandlerFault> + Send + Sync + 'static,
{
    HandlerEntry::new(path, Method::PUT, produce)
}

/// Register a handler for PATCH requests.
pub fn patch<F>(path: &str, produce: F) -> HandlerEntry
where
    F: Fn(RequestContext) -> Result<ResponseValue, HandlerFault> + Send + Sync + 'static,
{
    HandlerEntry::new(path, Method::PATCH, produce)
}

/// Register a handler for DELETE requests.
pub fn delete<F>(path: &str, produce: F) -> HandlerEntry
where
    F: Fn(RequestContext) -> Result<ResponseValue, HandlerFault> + Send + Sync + 'static,
{
    HandlerEntry::new(path, Method::DELETE, produce)
}
