//! Scope-based authorization subsystem.
//!
//! # Data Flow
//! ```text
//! handler registration (at plugin init):
//!     scope kind → ScopeRegistry (check + list_valid pair)
//!     extension id → extension registry (namespaced kinds)
//!
//! per request:
//!     Scope { kind, fields } + AuthContext
//!     → dispatch.rs (lookup by kind, extension resolution)
//!     → AuthResult / ListValidResult (values, never exceptions)
//! ```
//!
//! # Design Decisions
//! - Denials carry user-safe messages; internal handler failures are
//!   converted to generic results so nothing leaks through this path
//! - Registries are per-authentication-plugin objects, injected by
//!   reference; no process-wide singletons

pub mod dispatch;
pub mod result;
pub mod scope;

pub use dispatch::{AuthError, ScopeExtension, ScopeHandler, ScopeRegistry};
pub use result::{AuthResult, ListValidResult};
pub use scope::{AuthContext, Scope, ScopeKind};
