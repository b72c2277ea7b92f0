//! Request error taxonomy.
//!
//! # Responsibilities
//! - Carry status, message and plugin attribution for mid-request failures
//! - Track the "handled" mark so an error is annotated exactly once
//! - Render user-visible text differently in production and development
//!
//! # Design Decisions
//! - One tagged struct with an explicit kind and status instead of
//!   duck-typed shape checks on ad-hoc error objects
//! - `sensitive` defaults to false: a plugin opts in when its message must
//!   not reach clients in production
//! - Attribution (`plugin_export_name`) is stamped by the dispatcher, not
//!   by the throwing plugin, so nested recovery layers keep the original

use axum::http::StatusCode;

/// Broad classification of a mid-request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// Deliberate HTTP failure (404, 409, ...) raised by handler logic.
    Http,
    /// Authorization denied inside a handler.
    Auth,
    /// Request payload failed validation.
    Validation,
    /// Unexpected internal failure.
    Internal,
}

/// An error raised inside a middleware's `handle`.
///
/// Created by plugins, annotated once by the dispatcher, rendered by a
/// designated error-formatting layer (or the top-level fallback).
#[derive(Debug)]
pub struct RequestError {
    pub kind: RequestErrorKind,
    pub status: StatusCode,
    pub base_message: String,
    /// Name of the export whose plugin raised the error. Stamped by the
    /// dispatcher on first propagation.
    pub plugin_export_name: Option<String>,
    /// The raising plugin's display name, if it declared one.
    pub plugin_display_name: Option<String>,
    /// When true the message is replaced with a generic one in production.
    pub sensitive: bool,
    /// Set once the dispatcher has annotated this error.
    pub handled: bool,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RequestError {
    pub fn new(kind: RequestErrorKind, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            base_message: message.into(),
            plugin_export_name: None,
            plugin_display_name: None,
            sensitive: false,
            handled: false,
            source: None,
        }
    }

    /// A deliberate HTTP failure with a user-safe message.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(RequestErrorKind::Http, status, message)
    }

    /// An authorization denial with a user-safe message.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(RequestErrorKind::Auth, StatusCode::FORBIDDEN, message)
    }

    /// A validation failure with a user-safe message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RequestErrorKind::Validation, StatusCode::BAD_REQUEST, message)
    }

    /// An unexpected internal failure. Sensitive by default.
    pub fn internal(message: impl Into<String>) -> Self {
        let mut err = Self::new(
            RequestErrorKind::Internal,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
        );
        err.sensitive = true;
        err
    }

    /// Wrap an arbitrary error (the "non-Error throw" case) as internal.
    pub fn from_source(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        let mut err = Self::internal(source.to_string());
        err.source = Some(Box::new(source));
        err
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Mark the message as unsafe to show in production.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Annotate with the owning plugin and mark handled. No-op if some
    /// downstream layer already did, preserving the original attribution.
    pub(crate) fn stamp(&mut self, export_name: &str, display_name: Option<&str>) {
        if self.handled {
            return;
        }
        self.plugin_export_name = Some(export_name.to_string());
        self.plugin_display_name = display_name.map(str::to_string);
        self.handled = true;
    }

    /// The message safe to send to the client.
    ///
    /// In production a sensitive message is replaced with the generic
    /// status reason; in development the full message plus attribution is
    /// included to ease debugging.
    pub fn user_message(&self, production: bool) -> String {
        if production {
            if self.sensitive {
                self.status
                    .canonical_reason()
                    .unwrap_or("internal server error")
                    .to_string()
            } else {
                self.base_message.clone()
            }
        } else {
            let mut message = self.base_message.clone();
            if let Some(export) = &self.plugin_export_name {
                match &self.plugin_display_name {
                    Some(display) => {
                        message.push_str(&format!("\n    in plugin {display} (export {export})"));
                    }
                    None => message.push_str(&format!("\n    in plugin export {export}")),
                }
            }
            let mut cause: Option<&(dyn std::error::Error + 'static)> =
                self.source.as_deref().map(|s| s as _);
            while let Some(err) = cause {
                message.push_str(&format!("\n    caused by: {err}"));
                cause = err.source();
            }
            message
        }
    }
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.base_message)
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|s| s as _)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_is_applied_once() {
        let mut err = RequestError::http(StatusCode::NOT_FOUND, "no such package");
        err.stamp("db-plugin", Some("Database"));
        err.stamp("outer-plugin", None);
        assert_eq!(err.plugin_export_name.as_deref(), Some("db-plugin"));
        assert_eq!(err.plugin_display_name.as_deref(), Some("Database"));
        assert!(err.handled);
    }

    #[test]
    fn production_hides_sensitive_messages() {
        let err = RequestError::internal("db password rejected");
        assert_eq!(err.user_message(true), "Internal Server Error");
        assert!(err.user_message(false).contains("db password rejected"));
    }

    #[test]
    fn production_keeps_safe_messages() {
        let err = RequestError::http(StatusCode::CONFLICT, "version already published");
        assert_eq!(err.user_message(true), "version already published");
    }

    #[test]
    fn development_includes_attribution_and_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let mut err = RequestError::internal("storage write failed").with_source(io);
        err.stamp("fs-storage", None);
        let rendered = err.user_message(false);
        assert!(rendered.contains("storage write failed"));
        assert!(rendered.contains("fs-storage"));
        assert!(rendered.contains("disk full"));
    }
}
