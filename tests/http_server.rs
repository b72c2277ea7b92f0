//! End-to-end tests: real listener, real client, plugin-served routes.

use async_trait::async_trait;
use axum::http::StatusCode;
use tokio::net::TcpListener;

use pkg_registry::bootstrap::{self, PluginSet};
use pkg_registry::http::RequestCtx;
use pkg_registry::middleware::{Next, RequestError};
use pkg_registry::plugins::{MiddlewarePlugin, PluginExport, PluginInstance};
use pkg_registry::routing::{match_request, RoutePattern};
use pkg_registry::RegistryServer;

mod common;

/// Boot a registry with the core export plus `extras` and serve it on an
/// ephemeral port.
async fn serve(extras: Vec<PluginExport>) -> String {
    let mut set = PluginSet::new();
    set.register(common::core_export());
    for export in extras {
        set.register(export);
    }

    let registry = bootstrap::boot(common::core_config(), set).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(RegistryServer::new(registry).run(listener));
    format!("http://{addr}")
}

#[tokio::test]
async fn matched_route_serves_plugin_response() {
    let base = serve(vec![common::route_export("ping", "GET /-/ping", "pong")]).await;

    let response = reqwest::get(format!("{base}/-/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let server_header = response
        .headers()
        .get("server")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(server_header.starts_with("pkg-registry/"));
    assert_eq!(response.text().await.unwrap(), "pong");
}

#[tokio::test]
async fn unmatched_request_is_a_fatal_500() {
    let base = serve(vec![common::route_export("ping", "GET /-/ping", "pong")]).await;

    let response = reqwest::get(format!("{base}/no/such/route")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.text().await.unwrap(),
        "no middleware produced a response"
    );
}

/// Streams the captured package name back in two chunks.
struct EchoName {
    pattern: RoutePattern,
}

#[async_trait]
impl MiddlewarePlugin for EchoName {
    fn id(&self) -> &str {
        "echo-name"
    }

    fn should_handle(&self, ctx: &RequestCtx) -> bool {
        match_request(ctx.method().as_str(), ctx.path(), &self.pattern).is_some()
    }

    async fn handle(&self, ctx: &RequestCtx, _next: Next<'_>) -> Result<(), RequestError> {
        let captures = match_request(ctx.method().as_str(), ctx.path(), &self.pattern)
            .ok_or_else(|| RequestError::internal("route no longer matches"))?;
        let name = captures.get("name").unwrap_or_default().to_string();

        let body = ctx.response().flush_headers(StatusCode::OK);
        body.write("package: ");
        body.write(name);
        body.flush_body();
        Ok(())
    }
}

#[tokio::test]
async fn captures_flow_from_path_to_response() {
    let export = PluginExport::new("echo", |_| async {
        let pattern = RoutePattern::parse("GET /pkg/[name]").map_err(|e| {
            pkg_registry::plugins::PluginError::message(e.to_string())
        })?;
        Ok(vec![PluginInstance::Middleware(std::sync::Arc::new(
            EchoName { pattern },
        ))])
    });
    let base = serve(vec![export]).await;

    let response = reqwest::get(format!("{base}/pkg/left-pad")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "package: left-pad");
}
