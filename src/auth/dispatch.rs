//! Scope handler registry and dispatch.
//!
//! # Responsibilities
//! - Map scope kinds to handler pairs (check + list_valid)
//! - Resolve namespaced `extension:kind` scopes via the extension registry
//! - Convert handler-internal failures into generic denials so nothing
//!   leaks through the authorization path
//!
//! # Design Decisions
//! - An explicit registry object constructed at boot and injected by
//!   reference; each server or test run gets an isolated instance
//! - Unknown scope kind or extension id is a hard programming error, not a
//!   silent deny, so misconfiguration surfaces immediately
//! - Re-registration overwrites last-write-wins (logged as a warning);
//!   `register_strict` is the production-boot alternative

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::result::{AuthResult, ListValidResult};
use crate::auth::scope::{AuthContext, Scope, ScopeKind};
use crate::plugins::PluginError;

/// Handler pair for one scope kind.
#[async_trait]
pub trait ScopeHandler: Send + Sync {
    /// Decide whether the caller may perform the scoped action.
    async fn check(&self, scope: &Scope, auth: &AuthContext) -> Result<AuthResult, PluginError>;

    /// Enumerate which objects would pass the check for this caller.
    async fn list_valid(&self, auth: &AuthContext) -> Result<ListValidResult, PluginError>;
}

/// Handler for a whole extension namespace; receives the kind suffix.
#[async_trait]
pub trait ScopeExtension: Send + Sync {
    async fn check(
        &self,
        kind: &str,
        scope: &Scope,
        auth: &AuthContext,
    ) -> Result<AuthResult, PluginError>;

    async fn list_valid(
        &self,
        kind: &str,
        auth: &AuthContext,
    ) -> Result<ListValidResult, PluginError>;
}

/// Programming errors on the authorization dispatch path.
///
/// These are never user-facing denials: every reachable scope kind must
/// have a registered handler, so hitting one of these means broken wiring.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no handler registered for scope kind {0:?}")]
    UnknownScopeKind(String),

    #[error("no scope extension registered under id {0:?}")]
    UnknownExtension(String),

    #[error("scope kind {0:?} is already registered")]
    DuplicateScopeKind(String),

    #[error("scope extension {0:?} is already registered")]
    DuplicateExtension(String),
}

/// Registry mapping scope kinds to handlers.
///
/// One instance per authentication plugin; shared by reference, internally
/// concurrent.
#[derive(Default)]
pub struct ScopeRegistry {
    handlers: DashMap<String, Arc<dyn ScopeHandler>>,
    extensions: DashMap<String, Arc<dyn ScopeExtension>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a built-in scope kind.
    ///
    /// Re-registering the same kind silently overwrites (last write wins);
    /// handy for test overrides, a known footgun in production wiring.
    pub fn register(&self, kind: impl Into<String>, handler: Arc<dyn ScopeHandler>) {
        let kind = kind.into();
        if self.handlers.insert(kind.clone(), handler).is_some() {
            tracing::warn!(scope_kind = %kind, "scope handler overwritten");
        }
    }

    /// Like [`register`](Self::register) but rejects duplicates.
    pub fn register_strict(
        &self,
        kind: impl Into<String>,
        handler: Arc<dyn ScopeHandler>,
    ) -> Result<(), AuthError> {
        let kind = kind.into();
        // Entry keeps check-and-insert atomic.
        match self.handlers.entry(kind.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(AuthError::DuplicateScopeKind(kind))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(handler);
                Ok(())
            }
        }
    }

    /// Register an extension namespace.
    pub fn register_extension(&self, id: impl Into<String>, extension: Arc<dyn ScopeExtension>) {
        let id = id.into();
        if self.extensions.insert(id.clone(), extension).is_some() {
            tracing::warn!(extension = %id, "scope extension overwritten");
        }
    }

    /// Dispatch a check to the handler for the scope's kind.
    ///
    /// Handler-internal errors are logged and converted into a generic
    /// denial; an unregistered kind or extension is a hard error.
    pub async fn check(&self, scope: &Scope, auth: &AuthContext) -> Result<AuthResult, AuthError> {
        let outcome = match &scope.kind {
            ScopeKind::Builtin(kind) => {
                let handler = self.builtin(kind)?;
                handler.check(scope, auth).await
            }
            ScopeKind::Extension { extension, kind } => {
                let handler = self.extension(extension)?;
                handler.check(kind, scope, auth).await
            }
        };
        Ok(outcome.unwrap_or_else(|err| {
            tracing::error!(scope_kind = %scope.kind, error = %err, "scope handler failed");
            AuthResult::denied_internal()
        }))
    }

    /// Dispatch an enumeration query to the handler for `kind`.
    ///
    /// A failing handler yields `Unbounded` ("unknowable") rather than a
    /// false "nobody qualifies".
    pub async fn list_valid(
        &self,
        kind: &str,
        auth: &AuthContext,
    ) -> Result<ListValidResult, AuthError> {
        let outcome = match ScopeKind::parse(kind) {
            ScopeKind::Builtin(kind) => {
                let handler = self.builtin(&kind)?;
                handler.list_valid(auth).await
            }
            ScopeKind::Extension { extension, kind } => {
                let handler = self.extension(&extension)?;
                handler.list_valid(&kind, auth).await
            }
        };
        Ok(outcome.unwrap_or_else(|err| {
            tracing::error!(scope_kind = %kind, error = %err, "scope handler failed");
            ListValidResult::Unbounded
        }))
    }

    fn builtin(&self, kind: &str) -> Result<Arc<dyn ScopeHandler>, AuthError> {
        self.handlers
            .get(kind)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AuthError::UnknownScopeKind(kind.to_string()))
    }

    fn extension(&self, id: &str) -> Result<Arc<dyn ScopeExtension>, AuthError> {
        self.extensions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AuthError::UnknownExtension(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Allows callers named in `allowed`; enumerates `objects`.
    struct FixedHandler {
        allow: bool,
        objects: ListValidResult,
    }

    #[async_trait]
    impl ScopeHandler for FixedHandler {
        async fn check(
            &self,
            _scope: &Scope,
            _auth: &AuthContext,
        ) -> Result<AuthResult, PluginError> {
            Ok(if self.allow {
                AuthResult::allowed()
            } else {
                AuthResult::denied("not allowed")
            })
        }

        async fn list_valid(&self, _auth: &AuthContext) -> Result<ListValidResult, PluginError> {
            Ok(self.objects.clone())
        }
    }

    struct BrokenHandler;

    #[async_trait]
    impl ScopeHandler for BrokenHandler {
        async fn check(
            &self,
            _scope: &Scope,
            _auth: &AuthContext,
        ) -> Result<AuthResult, PluginError> {
            Err(PluginError::Message("connection pool exhausted".into()))
        }

        async fn list_valid(&self, _auth: &AuthContext) -> Result<ListValidResult, PluginError> {
            Err(PluginError::Message("connection pool exhausted".into()))
        }
    }

    struct EchoExtension;

    #[async_trait]
    impl ScopeExtension for EchoExtension {
        async fn check(
            &self,
            kind: &str,
            _scope: &Scope,
            _auth: &AuthContext,
        ) -> Result<AuthResult, PluginError> {
            Ok(AuthResult::denied(format!("extension saw {kind}")))
        }

        async fn list_valid(
            &self,
            kind: &str,
            _auth: &AuthContext,
        ) -> Result<ListValidResult, PluginError> {
            Ok(ListValidResult::Valid(vec![kind.to_string()]))
        }
    }

    fn scope(kind: &str) -> Scope {
        Scope::new(kind, json!({}))
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let registry = ScopeRegistry::new();
        registry.register(
            "publish",
            Arc::new(FixedHandler {
                allow: true,
                objects: ListValidResult::Unbounded,
            }),
        );
        let result = registry
            .check(&scope("publish"), &AuthContext::anonymous())
            .await
            .unwrap();
        assert!(result.is_allowed());
    }

    #[tokio::test]
    async fn unknown_kind_is_a_hard_error() {
        let registry = ScopeRegistry::new();
        let err = registry
            .check(&scope("publish"), &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::UnknownScopeKind("publish".into()));
    }

    #[tokio::test]
    async fn unknown_extension_is_a_hard_error_not_a_deny() {
        let registry = ScopeRegistry::new();
        let err = registry
            .check(&scope("audit:read"), &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::UnknownExtension("audit".into()));
    }

    #[tokio::test]
    async fn extension_receives_kind_suffix() {
        let registry = ScopeRegistry::new();
        registry.register_extension("audit", Arc::new(EchoExtension));
        let result = registry
            .check(&scope("audit:read-log"), &AuthContext::anonymous())
            .await
            .unwrap();
        assert_eq!(result, AuthResult::denied("extension saw read-log"));

        let listed = registry
            .list_valid("audit:read-log", &AuthContext::anonymous())
            .await
            .unwrap();
        assert_eq!(listed, ListValidResult::Valid(vec!["read-log".into()]));
    }

    #[tokio::test]
    async fn reregistration_overwrites_last_write_wins() {
        let registry = ScopeRegistry::new();
        registry.register(
            "publish",
            Arc::new(FixedHandler {
                allow: false,
                objects: ListValidResult::NoneValid,
            }),
        );
        registry.register(
            "publish",
            Arc::new(FixedHandler {
                allow: true,
                objects: ListValidResult::Unbounded,
            }),
        );
        let result = registry
            .check(&scope("publish"), &AuthContext::anonymous())
            .await
            .unwrap();
        assert!(result.is_allowed());
    }

    #[tokio::test]
    async fn strict_registration_rejects_duplicates() {
        let registry = ScopeRegistry::new();
        registry
            .register_strict(
                "publish",
                Arc::new(FixedHandler {
                    allow: true,
                    objects: ListValidResult::Unbounded,
                }),
            )
            .unwrap();
        let err = registry
            .register_strict(
                "publish",
                Arc::new(FixedHandler {
                    allow: false,
                    objects: ListValidResult::NoneValid,
                }),
            )
            .unwrap_err();
        assert_eq!(err, AuthError::DuplicateScopeKind("publish".into()));
    }

    #[tokio::test]
    async fn handler_failure_becomes_generic_denial() {
        let registry = ScopeRegistry::new();
        registry.register("publish", Arc::new(BrokenHandler));
        let result = registry
            .check(&scope("publish"), &AuthContext::anonymous())
            .await
            .unwrap();
        // Detail stays in the log; the caller sees a generic denial.
        assert_eq!(result, AuthResult::denied_internal());

        let listed = registry
            .list_valid("publish", &AuthContext::anonymous())
            .await
            .unwrap();
        assert_eq!(listed, ListValidResult::Unbounded);
    }

    #[tokio::test]
    async fn tri_state_passes_through_unchanged() {
        let registry = ScopeRegistry::new();
        registry.register(
            "a",
            Arc::new(FixedHandler {
                allow: true,
                objects: ListValidResult::Unbounded,
            }),
        );
        registry.register(
            "b",
            Arc::new(FixedHandler {
                allow: true,
                objects: ListValidResult::NoneValid,
            }),
        );
        registry.register(
            "c",
            Arc::new(FixedHandler {
                allow: true,
                objects: ListValidResult::Valid(vec!["acme".into()]),
            }),
        );
        let anon = AuthContext::anonymous();
        assert_eq!(
            registry.list_valid("a", &anon).await.unwrap(),
            ListValidResult::Unbounded
        );
        assert_eq!(
            registry.list_valid("b", &anon).await.unwrap(),
            ListValidResult::NoneValid
        );
        assert_eq!(
            registry.list_valid("c", &anon).await.unwrap(),
            ListValidResult::Valid(vec!["acme".into()])
        );
    }
}
