//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Handler registration (at startup):
//!     template string
//!     → matcher.rs (compile to RoutePattern)
//!     → router.rs (append to HandlerRegistry, order = priority)
//!     → Freeze as immutable registry
//!
//! Incoming path
//!     → router.rs (ordered scan)
//!     → matcher.rs (anchored segment comparison)
//!     → Return: matched HandlerEntry or NoMatch
//! ```
//!
//! # Design Decisions
//! - Patterns compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same entry
//! - First match wins

pub mod matcher;
pub mod router;

pub use matcher::RoutePattern;
pub use router::HandlerRegistry;
