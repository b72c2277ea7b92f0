//! Plugin subsystem.
//!
//! # Data Flow
//! ```text
//! Plugin package code
//!     → PluginExport (declaration: config needs, provisions, ordering)
//!     → resolver.rs (dependency graph, topological load order)
//!     → bootstrap (validate config, init in order)
//!     → PluginInstance (typed runtime object: middleware, storage, ...)
//! ```
//!
//! # Design Decisions
//! - Exports are declarations, instances are runtime objects; one export
//!   may yield several instances of different types
//! - Instances are trait objects behind `Arc`: owned by their export,
//!   referenced by ordering and capability selection
//! - `init` sees only its own config; cross-plugin references appear only
//!   in the metadata broadcast after every plugin initialized

pub mod model;
pub mod resolver;
pub mod schema;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::HeaderMap;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::{AuthContext, AuthError, AuthResult, ListValidResult, Scope, ScopeRegistry};
use crate::bootstrap::meta::EnvMeta;
use crate::http::request::RequestCtx;
use crate::middleware::{Next, RequestError};
use crate::plugins::model::{Feed, Package, PackageVersion};
use crate::plugins::schema::ConfigSchema;

pub use resolver::{sort_exports, ResolveError};

/// Error raised by plugin implementations (storage, database, init, ...).
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{0}")]
    Message(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl PluginError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}

/// A middleware layer: predicate plus handler around the rest of the chain.
#[async_trait]
pub trait MiddlewarePlugin: Send + Sync {
    /// Instance id, unique within the owning export.
    fn id(&self) -> &str;

    /// Human-readable name used in error attribution, if any.
    fn display_name(&self) -> Option<&str> {
        None
    }

    /// Decide whether this plugin participates in the request. May stash
    /// match data (route captures) into the plugin's private context slot.
    fn should_handle(&self, ctx: &RequestCtx) -> bool;

    /// Handle the request; `next` runs the downstream chain.
    async fn handle(&self, ctx: &RequestCtx, next: Next<'_>) -> Result<(), RequestError>;
}

/// Byte storage for one or more file categories.
#[async_trait]
pub trait StoragePlugin: Send + Sync {
    fn id(&self) -> &str;

    async fn read(&self, name: &str) -> Result<Bytes, PluginError>;

    async fn write(&self, name: &str, bytes: Bytes) -> Result<(), PluginError>;

    async fn exists(&self, name: &str) -> Result<bool, PluginError>;

    /// Content hash of a stored object, for integrity headers.
    async fn hash(&self, name: &str) -> Result<String, PluginError>;
}

/// Feed/package/version persistence.
#[async_trait]
pub trait DatabasePlugin: Send + Sync {
    fn id(&self) -> &str;

    async fn get_feed(&self, slug: &str) -> Result<Option<Feed>, PluginError>;

    async fn save_feed(&self, feed: Feed) -> Result<(), PluginError>;

    async fn list_packages(&self, feed_slug: &str) -> Result<Vec<Package>, PluginError>;

    async fn get_package(&self, feed_slug: &str, name: &str)
        -> Result<Option<Package>, PluginError>;

    async fn save_package(&self, package: Package) -> Result<(), PluginError>;

    async fn get_version(
        &self,
        feed_slug: &str,
        package_name: &str,
        version: &str,
    ) -> Result<Option<PackageVersion>, PluginError>;

    async fn save_version(&self, version: PackageVersion) -> Result<(), PluginError>;
}

/// Authentication and scope-based authorization.
///
/// Each instance owns its [`ScopeRegistry`], including the extension
/// registry for namespaced scopes.
#[async_trait]
pub trait AuthenticationPlugin: Send + Sync {
    fn id(&self) -> &str;

    /// The scope registry this instance dispatches through.
    fn scopes(&self) -> &ScopeRegistry;

    /// Resolve the caller from request headers; `None` is anonymous.
    async fn access_token(&self, headers: &HeaderMap) -> Result<Option<String>, PluginError>;

    async fn check(&self, scope: &Scope, auth: &AuthContext) -> Result<AuthResult, AuthError> {
        self.scopes().check(scope, auth).await
    }

    async fn list_valid(
        &self,
        kind: &str,
        auth: &AuthContext,
    ) -> Result<ListValidResult, AuthError> {
        self.scopes().list_valid(kind, auth).await
    }
}

/// Package content validation.
#[async_trait]
pub trait ValidationPlugin: Send + Sync {
    fn id(&self) -> &str;

    async fn validate_package_name(&self, name: &str) -> Result<bool, PluginError>;

    async fn validate_contents(&self, category: &str, bytes: &Bytes)
        -> Result<bool, PluginError>;
}

/// Format-specific package handling (manifest extraction etc.).
#[async_trait]
pub trait PackageHandlerPlugin: Send + Sync {
    fn id(&self) -> &str;

    /// File categories this handler understands.
    fn categories(&self) -> Vec<String>;

    async fn extract_manifest(&self, bytes: &Bytes) -> Result<Value, PluginError>;
}

/// Byte cache. A miss is `Ok(None)`, a sentinel rather than an error.
#[async_trait]
pub trait CachePlugin: Send + Sync {
    fn id(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Bytes>, PluginError>;

    async fn put(&self, key: &str, value: Bytes) -> Result<(), PluginError>;
}

/// A typed runtime plugin instance produced by an export's `init`.
#[derive(Clone)]
pub enum PluginInstance {
    Middleware(Arc<dyn MiddlewarePlugin>),
    Storage(Arc<dyn StoragePlugin>),
    Database(Arc<dyn DatabasePlugin>),
    Authentication(Arc<dyn AuthenticationPlugin>),
    Validation(Arc<dyn ValidationPlugin>),
    PackageHandler(Arc<dyn PackageHandlerPlugin>),
    Cache(Arc<dyn CachePlugin>),
}

impl PluginInstance {
    pub fn id(&self) -> &str {
        match self {
            Self::Middleware(p) => p.id(),
            Self::Storage(p) => p.id(),
            Self::Database(p) => p.id(),
            Self::Authentication(p) => p.id(),
            Self::Validation(p) => p.id(),
            Self::PackageHandler(p) => p.id(),
            Self::Cache(p) => p.id(),
        }
    }

    /// The type discriminator, for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Middleware(_) => "middleware",
            Self::Storage(_) => "storage",
            Self::Database(_) => "database",
            Self::Authentication(_) => "authentication",
            Self::Validation(_) => "validation",
            Self::PackageHandler(_) => "package-handler",
            Self::Cache(_) => "cache",
        }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PluginInstance({} {:?})", self.kind(), self.id())
    }
}

/// Capabilities an export declares it can fill, each naming the instance
/// id that supplies it.
#[derive(Debug, Clone, Default)]
pub struct Provides {
    pub authentication: Option<String>,
    pub database: Option<String>,
    /// File category → instance id.
    pub storage: HashMap<String, String>,
    pub validation: Option<String>,
    pub cache: Option<String>,
}

impl Provides {
    pub fn authentication(mut self, instance_id: impl Into<String>) -> Self {
        self.authentication = Some(instance_id.into());
        self
    }

    pub fn database(mut self, instance_id: impl Into<String>) -> Self {
        self.database = Some(instance_id.into());
        self
    }

    pub fn storage(mut self, category: impl Into<String>, instance_id: impl Into<String>) -> Self {
        self.storage.insert(category.into(), instance_id.into());
        self
    }

    pub fn validation(mut self, instance_id: impl Into<String>) -> Self {
        self.validation = Some(instance_id.into());
        self
    }

    pub fn cache(mut self, instance_id: impl Into<String>) -> Self {
        self.cache = Some(instance_id.into());
        self
    }
}

/// What a load-order constraint points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintTarget {
    /// An exact export name.
    Exact(String),
    /// Every export whose name starts with `<scope>/`.
    ScopeWildcard(String),
    /// Every other export.
    Wildcard,
}

impl ConstraintTarget {
    pub fn parse(raw: &str) -> Self {
        if raw == "*" {
            Self::Wildcard
        } else if let Some(scope) = raw.strip_suffix("/*") {
            Self::ScopeWildcard(scope.to_string())
        } else {
            Self::Exact(raw.to_string())
        }
    }
}

impl std::fmt::Display for ConstraintTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(name) => f.write_str(name),
            Self::ScopeWildcard(scope) => write!(f, "{scope}/*"),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

/// One declared `load_before`/`load_after` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConstraint {
    pub target: ConstraintTarget,
    /// When true, resolving to zero matching plugins is a fatal
    /// configuration error instead of a no-op.
    pub required: bool,
}

impl OrderConstraint {
    pub fn new(target: &str) -> Self {
        Self {
            target: ConstraintTarget::parse(target),
            required: false,
        }
    }

    pub fn required(target: &str) -> Self {
        Self {
            target: ConstraintTarget::parse(target),
            required: true,
        }
    }
}

impl From<&str> for OrderConstraint {
    fn from(target: &str) -> Self {
        Self::new(target)
    }
}

type InitFn = Box<
    dyn Fn(Option<Value>) -> BoxFuture<'static, Result<Vec<PluginInstance>, PluginError>>
        + Send
        + Sync,
>;

type MetaFn = Box<dyn Fn(EnvMeta) -> BoxFuture<'static, ()> + Send + Sync>;

type ValidateFn = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// The top-level declaration a plugin package provides to the bootstrap
/// process. Identity is the declared name; exports live for the whole
/// process and are never unloaded.
pub struct PluginExport {
    name: String,
    config_required: bool,
    config_schema: Option<ConfigSchema>,
    validate_config: Option<ValidateFn>,
    provides: Provides,
    load_before: Vec<OrderConstraint>,
    load_after: Vec<OrderConstraint>,
    init: InitFn,
    on_meta_loaded: Option<MetaFn>,
}

impl PluginExport {
    /// Create an export with its `init` function; everything else is
    /// declared through the chained setters.
    pub fn new<F, Fut>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<PluginInstance>, PluginError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            config_required: false,
            config_schema: None,
            validate_config: None,
            provides: Provides::default(),
            load_before: Vec::new(),
            load_after: Vec::new(),
            init: Box::new(move |config| Box::pin(init(config))),
            on_meta_loaded: None,
        }
    }

    pub fn config_required(mut self) -> Self {
        self.config_required = true;
        self
    }

    pub fn config_schema(mut self, schema: ConfigSchema) -> Self {
        self.config_schema = Some(schema);
        self
    }

    /// Custom configuration validator; mutually exclusive with
    /// [`config_schema`](Self::config_schema) (declaring both is a fatal
    /// authoring error caught at boot).
    pub fn validate_config_with<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validate_config = Some(Box::new(validate));
        self
    }

    pub fn provides(mut self, provides: Provides) -> Self {
        self.provides = provides;
        self
    }

    pub fn load_before(mut self, constraint: impl Into<OrderConstraint>) -> Self {
        self.load_before.push(constraint.into());
        self
    }

    pub fn load_after(mut self, constraint: impl Into<OrderConstraint>) -> Self {
        self.load_after.push(constraint.into());
        self
    }

    pub fn on_meta_loaded<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(EnvMeta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_meta_loaded = Some(Box::new(move |meta| Box::pin(hook(meta))));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_config_required(&self) -> bool {
        self.config_required
    }

    pub fn schema(&self) -> Option<&ConfigSchema> {
        self.config_schema.as_ref()
    }

    pub fn custom_validator(&self) -> Option<&ValidateFn> {
        self.validate_config.as_ref()
    }

    pub fn provisions(&self) -> &Provides {
        &self.provides
    }

    pub fn load_before_constraints(&self) -> &[OrderConstraint] {
        &self.load_before
    }

    pub fn load_after_constraints(&self) -> &[OrderConstraint] {
        &self.load_after
    }

    /// Run the export's `init` with its validated configuration.
    pub async fn init(&self, config: Option<Value>) -> Result<Vec<PluginInstance>, PluginError> {
        (self.init)(config).await
    }

    /// Invoke the metadata hook, if declared.
    pub async fn notify_meta(&self, meta: EnvMeta) {
        if let Some(hook) = &self.on_meta_loaded {
            hook(meta).await;
        }
    }
}

impl std::fmt::Debug for PluginExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginExport")
            .field("name", &self.name)
            .field("config_required", &self.config_required)
            .field("provides", &self.provides)
            .field("load_before", &self.load_before)
            .field("load_after", &self.load_after)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_target_parsing() {
        assert_eq!(ConstraintTarget::parse("*"), ConstraintTarget::Wildcard);
        assert_eq!(
            ConstraintTarget::parse("@acme/*"),
            ConstraintTarget::ScopeWildcard("@acme".into())
        );
        assert_eq!(
            ConstraintTarget::parse("fs-storage"),
            ConstraintTarget::Exact("fs-storage".into())
        );
    }

    #[tokio::test]
    async fn init_receives_config_and_yields_instances() {
        let export = PluginExport::new("empty", |config| async move {
            assert_eq!(config, Some(serde_json::json!({"k": 1})));
            Ok(Vec::new())
        });
        let instances = export.init(Some(serde_json::json!({"k": 1}))).await.unwrap();
        assert!(instances.is_empty());
    }
}
