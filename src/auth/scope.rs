//! Scope types.
//!
//! A scope is a structured description of an action a user is attempting,
//! the unit every authorization check operates on. Scopes are ephemeral:
//! constructed per check, never persisted.

use serde_json::Value;
use std::fmt;

/// Discriminant of a scope.
///
/// A bare identifier names a built-in scope kind; `namespace:identifier`
/// names a kind provided by a registered scope extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Builtin(String),
    Extension { extension: String, kind: String },
}

impl ScopeKind {
    /// Parse a kind string, splitting extension kinds on the first `:`.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((extension, kind)) => Self::Extension {
                extension: extension.to_string(),
                kind: kind.to_string(),
            },
            None => Self::Builtin(raw.to_string()),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(kind) => f.write_str(kind),
            Self::Extension { extension, kind } => write!(f, "{extension}:{kind}"),
        }
    }
}

/// A single authorization scope: kind plus kind-specific fields.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    /// Kind-specific fields, e.g. `{"feed": "acme", "action": "publish"}`.
    pub body: Value,
}

impl Scope {
    pub fn new(kind: &str, body: Value) -> Self {
        Self {
            kind: ScopeKind::parse(kind),
            body,
        }
    }

    /// Convenience accessor for a string field of the scope body.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.body.get(name).and_then(Value::as_str)
    }
}

/// Caller identity and extras passed alongside a scope.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Authenticated user id; `None` is an anonymous caller.
    pub user: Option<String>,
    /// Handler-specific extra parameters.
    pub extra: Value,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            extra: Value::Null,
        }
    }
}
