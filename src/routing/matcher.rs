//! Route template compilation and matching.
//!
//! # Responsibilities
//! - Compile a route template (`/api/users/:id`) once at registration time
//! - Test concrete request paths against the compiled pattern
//! - Extract named segment values for handlers that need them
//!
//! # Design Decisions
//! - Anchored at both ends: no prefix or substring matches
//! - No trailing-slash equivalence (`/api/users/` is not `/api/users`)
//! - Every non-parameter character is literal, `.` included
//! - A `:name` placeholder matches one or more characters, never `/`
//! - Segment comparison instead of regex keeps matching O(n)

use std::fmt;

/// One segment of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled, immutable route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    template: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compile a route template.
    ///
    /// A segment written as `:name` (non-empty name) becomes a placeholder.
    /// Everything else, including a bare `:`, is compared literally.
    pub fn compile(template: impl Into<String>) -> Self {
        let template = template.into();
        let segments = template
            .split('/')
            .map(|raw| match raw.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(raw.to_string()),
            })
            .collect();

        Self { template, segments }
    }

    /// Returns true if `path` is matched by this pattern.
    pub fn test(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Match `path` and return the `(name, value)` pairs of every placeholder,
    /// in template order. `None` means no match.
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<(&str, &'p str)>> {
        let mut parts = path.split('/');
        let mut captured = Vec::new();

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    captured.push((name.as_str(), part));
                }
            }
        }

        // Extra trailing segments mean the path is longer than the template.
        if parts.next().is_some() {
            return None;
        }

        Some(captured)
    }

    /// The template this pattern was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}
