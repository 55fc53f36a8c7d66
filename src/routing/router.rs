//! Custom handler lookup.
//!
//! # Responsibilities
//! - Store handler entries in registration order
//! - Return the first entry whose pattern matches a path
//! - Return an explicit no-match otherwise
//!
//! # Design Decisions
//! - Immutable after construction (shared across requests without locks)
//! - O(n) scan: registration order is priority order, later entries can be shadowed
//! - Lookup is path-only. The HTTP method of an entry is not consulted, so an
//!   entry registered for GET also claims a DELETE to the same path.

use crate::handlers::HandlerEntry;

/// Ordered, immutable sequence of custom handlers.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    entries: Vec<HandlerEntry>,
}

impl HandlerRegistry {
    /// Create a registry. The order of `entries` is match priority.
    pub fn new(entries: Vec<HandlerEntry>) -> Self {
        Self { entries }
    }

    /// Find the first entry matching `path`.
    pub fn find(&self, path: &str) -> Option<&HandlerEntry> {
        find(path, &self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HandlerEntry> {
        self.entries.iter()
    }
}

impl FromIterator<HandlerEntry> for HandlerRegistry {
    fn from_iter<I: IntoIterator<Item = HandlerEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// First-match-wins scan over `entries`.
pub fn find<'a>(path: &str, entries: &'a [HandlerEntry]) -> Option<&'a HandlerEntry> {
    entries.iter().find(|entry| entry.matches(path))
}
