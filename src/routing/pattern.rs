//! Route pattern parsing.
//!
//! # Responsibilities
//! - Parse `"<METHOD> /seg/[cap]/[...rest]"` strings into path parts
//! - Reject ambiguous rest-capture runs at registration time
//! - Produce an immutable pattern reused for every request
//!
//! # Design Decisions
//! - Patterns are parsed once when a plugin registers a route, never per request
//! - A rest capture must be bounded by a literal so greedy matching stays O(n)
//! - No regex: three part kinds are enough for registry routes

use thiserror::Error;

/// One segment of a parsed route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPart {
    /// Must match the URL segment exactly.
    Literal(String),
    /// Captures exactly one non-empty URL segment under the given name.
    Single(String),
    /// Captures one or more URL segments, joined by `/`, under the given name.
    Rest(String),
}

impl PathPart {
    /// True for `Single` and `Rest` parts.
    pub fn is_capture(&self) -> bool {
        !matches!(self, PathPart::Literal(_))
    }
}

/// Error raised while parsing a route pattern string.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The pattern has no space separating method from path.
    #[error("route pattern {0:?} is missing a method")]
    MissingMethod(String),

    /// The path portion does not start with `/`.
    #[error("route path {0:?} must start with '/'")]
    BadPath(String),

    /// A capture has an empty name, e.g. `[]` or `[...]`.
    #[error("route pattern {0:?} contains a capture with no name")]
    EmptyCaptureName(String),

    /// A rest capture appears with no literal segment since the previous
    /// rest capture, so greedy matching cannot be resolved.
    #[error("rest capture [...{name}] in {pattern:?} is not bounded by a literal segment")]
    UnresolvableRest { pattern: String, name: String },
}

/// A parsed, immutable route pattern: method plus ordered path parts.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    method: String,
    parts: Vec<PathPart>,
}

impl RoutePattern {
    /// Parse a pattern like `GET /feeds/[feed_slug]/packages`.
    ///
    /// The method is everything before the first space; the remainder is the
    /// path. Segments of the form `[name]` become single captures,
    /// `[...name]` become rest captures, anything else is a literal.
    pub fn parse(route: &str) -> Result<Self, PatternError> {
        let (method, path) = route
            .split_once(' ')
            .ok_or_else(|| PatternError::MissingMethod(route.to_string()))?;
        if method.is_empty() {
            return Err(PatternError::MissingMethod(route.to_string()));
        }
        if !path.starts_with('/') {
            return Err(PatternError::BadPath(path.to_string()));
        }

        let mut parts = Vec::new();
        // Tracks whether a literal has been seen since the last rest capture.
        // A fresh pattern counts as bounded on the left by the path root.
        let mut unresolved_rest: Option<String> = None;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = segment.strip_prefix("[...").and_then(|s| s.strip_suffix(']')) {
                if name.is_empty() {
                    return Err(PatternError::EmptyCaptureName(route.to_string()));
                }
                if unresolved_rest.is_some() {
                    return Err(PatternError::UnresolvableRest {
                        pattern: route.to_string(),
                        name: name.to_string(),
                    });
                }
                unresolved_rest = Some(name.to_string());
                parts.push(PathPart::Rest(name.to_string()));
            } else if let Some(name) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                if name.is_empty() {
                    return Err(PatternError::EmptyCaptureName(route.to_string()));
                }
                parts.push(PathPart::Single(name.to_string()));
            } else {
                unresolved_rest = None;
                parts.push(PathPart::Literal(segment.to_string()));
            }
        }

        Ok(Self {
            method: method.to_ascii_uppercase(),
            parts,
        })
    }

    /// The HTTP method this pattern applies to, uppercased.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The ordered path parts.
    pub fn parts(&self) -> &[PathPart] {
        &self.parts
    }
}
