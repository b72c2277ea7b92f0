//! Shared utilities for integration testing: in-memory plugin
//! implementations and config builders.

// Each integration test binary compiles its own copy of this module and
// uses a different subset of it.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::HeaderMap;

use pkg_registry::auth::ScopeRegistry;
use pkg_registry::http::RequestCtx;
use pkg_registry::middleware::{Next, RequestError};
use pkg_registry::plugins::model::{Feed, Package, PackageVersion};
use pkg_registry::plugins::{
    AuthenticationPlugin, CachePlugin, DatabasePlugin, MiddlewarePlugin, PluginError,
    PluginExport, PluginInstance, Provides, StoragePlugin, ValidationPlugin,
};
use pkg_registry::routing::{match_request, RoutePattern};
use pkg_registry::RegistryConfig;

pub struct MockAuth {
    scopes: ScopeRegistry,
}

impl MockAuth {
    pub fn new() -> Self {
        Self {
            scopes: ScopeRegistry::new(),
        }
    }
}

#[async_trait]
impl AuthenticationPlugin for MockAuth {
    fn id(&self) -> &str {
        "mock-auth"
    }

    fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    async fn access_token(&self, headers: &HeaderMap) -> Result<Option<String>, PluginError> {
        Ok(headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string))
    }
}

#[derive(Default)]
pub struct MemoryDb {
    feeds: Mutex<HashMap<String, Feed>>,
    packages: Mutex<HashMap<(String, String), Package>>,
    versions: Mutex<HashMap<(String, String, String), PackageVersion>>,
}

#[async_trait]
impl DatabasePlugin for MemoryDb {
    fn id(&self) -> &str {
        "memory-db"
    }

    async fn get_feed(&self, slug: &str) -> Result<Option<Feed>, PluginError> {
        Ok(self.feeds.lock().unwrap().get(slug).cloned())
    }

    async fn save_feed(&self, feed: Feed) -> Result<(), PluginError> {
        self.feeds.lock().unwrap().insert(feed.slug.clone(), feed);
        Ok(())
    }

    async fn list_packages(&self, feed_slug: &str) -> Result<Vec<Package>, PluginError> {
        Ok(self
            .packages
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.feed_slug == feed_slug)
            .cloned()
            .collect())
    }

    async fn get_package(
        &self,
        feed_slug: &str,
        name: &str,
    ) -> Result<Option<Package>, PluginError> {
        Ok(self
            .packages
            .lock()
            .unwrap()
            .get(&(feed_slug.to_string(), name.to_string()))
            .cloned())
    }

    async fn save_package(&self, package: Package) -> Result<(), PluginError> {
        self.packages.lock().unwrap().insert(
            (package.feed_slug.clone(), package.name.clone()),
            package,
        );
        Ok(())
    }

    async fn get_version(
        &self,
        feed_slug: &str,
        package_name: &str,
        version: &str,
    ) -> Result<Option<PackageVersion>, PluginError> {
        Ok(self
            .versions
            .lock()
            .unwrap()
            .get(&(
                feed_slug.to_string(),
                package_name.to_string(),
                version.to_string(),
            ))
            .cloned())
    }

    async fn save_version(&self, version: PackageVersion) -> Result<(), PluginError> {
        self.versions.lock().unwrap().insert(
            (
                version.feed_slug.clone(),
                version.package_name.clone(),
                version.version.clone(),
            ),
            version,
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl StoragePlugin for MemoryStorage {
    fn id(&self) -> &str {
        "memory-storage"
    }

    async fn read(&self, name: &str) -> Result<Bytes, PluginError> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::message(format!("no such file: {name}")))
    }

    async fn write(&self, name: &str, bytes: Bytes) -> Result<(), PluginError> {
        self.files.lock().unwrap().insert(name.to_string(), bytes);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, PluginError> {
        Ok(self.files.lock().unwrap().contains_key(name))
    }

    async fn hash(&self, name: &str) -> Result<String, PluginError> {
        let bytes = self.read(name).await?;
        // FNV-1a, good enough for test fixtures.
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in bytes.iter() {
            hash ^= u64::from(*b);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        Ok(format!("{hash:016x}"))
    }
}

pub struct AcceptAll;

#[async_trait]
impl ValidationPlugin for AcceptAll {
    fn id(&self) -> &str {
        "accept-all"
    }

    async fn validate_package_name(&self, name: &str) -> Result<bool, PluginError> {
        Ok(!name.is_empty())
    }

    async fn validate_contents(
        &self,
        _category: &str,
        _bytes: &Bytes,
    ) -> Result<bool, PluginError> {
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl CachePlugin for MemoryCache {
    fn id(&self) -> &str {
        "memory-cache"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, PluginError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), PluginError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

/// Middleware that serves a fixed body on one route pattern.
pub struct RouteMiddleware {
    id: String,
    pattern: RoutePattern,
    body: String,
}

impl RouteMiddleware {
    pub fn new(id: &str, pattern: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            pattern: RoutePattern::parse(pattern).unwrap(),
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl MiddlewarePlugin for RouteMiddleware {
    fn id(&self) -> &str {
        &self.id
    }

    fn should_handle(&self, ctx: &RequestCtx) -> bool {
        match_request(ctx.method().as_str(), ctx.path(), &self.pattern).is_some()
    }

    async fn handle(&self, ctx: &RequestCtx, _next: Next<'_>) -> Result<(), RequestError> {
        let body = ctx
            .response()
            .flush_headers(axum::http::StatusCode::OK);
        body.write(self.body.clone());
        body.flush_body();
        Ok(())
    }
}

/// An export bundling one in-memory instance of every capability.
pub fn core_export() -> PluginExport {
    PluginExport::new("core", |_config| async {
        Ok(vec![
            PluginInstance::Authentication(std::sync::Arc::new(MockAuth::new())),
            PluginInstance::Database(std::sync::Arc::new(MemoryDb::default())),
            PluginInstance::Validation(std::sync::Arc::new(AcceptAll)),
            PluginInstance::Cache(std::sync::Arc::new(MemoryCache::default())),
            PluginInstance::Storage(std::sync::Arc::new(MemoryStorage::default())),
        ])
    })
    .provides(
        Provides::default()
            .authentication("mock-auth")
            .database("memory-db")
            .validation("accept-all")
            .cache("memory-cache")
            .storage("package", "memory-storage"),
    )
}

/// A middleware-only export serving `body` on `pattern`.
pub fn route_export(name: &str, pattern: &str, body: &str) -> PluginExport {
    let id = format!("{name}-route");
    let pattern = pattern.to_string();
    let body = body.to_string();
    PluginExport::new(name, move |_config| {
        let middleware = RouteMiddleware::new(&id, &pattern, &body);
        async move {
            Ok(vec![PluginInstance::Middleware(std::sync::Arc::new(
                middleware,
            ))])
        }
    })
}

/// Config whose selection table points at [`core_export`].
pub fn core_config() -> RegistryConfig {
    let mut config = RegistryConfig::default();
    config.selection.authentication = Some("core".into());
    config.selection.database = Some("core".into());
    config.selection.validation = Some("core".into());
    config.selection.cache = Some("core".into());
    config
        .selection
        .storage
        .insert("package".into(), "core".into());
    config
}
