//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all registry handler
//! - Wire up middleware (tracing, timeouts)
//! - Bind server to listener, serve with graceful shutdown
//! - Bridge each request into a RequestCtx and drive the plugin chain
//! - Stream the staged response back to the client as it is produced
//!
//! # Design Decisions
//! - One catch-all route: URL dispatch belongs to plugin predicates, not
//!   the Axum router
//! - The chain runs in a spawned task; the handler returns as soon as the
//!   head is flushed, so body bytes stream without buffering
//! - Client disconnects surface as a cancellation flag, never an error

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::bootstrap::BootedRegistry;
use crate::config::RegistryConfig;
use crate::http::request::{CancelFlag, RequestCtx};
use crate::http::response::response_channel;
use crate::middleware::{run_chain, MiddlewareEntry};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
struct AppState {
    middleware: Arc<Vec<MiddlewareEntry>>,
    production: bool,
}

/// HTTP server for the registry.
pub struct RegistryServer {
    router: Router,
    config: RegistryConfig,
}

impl RegistryServer {
    /// Create a server from a booted registry.
    pub fn new(registry: BootedRegistry) -> Self {
        let state = AppState {
            middleware: registry.middleware.clone(),
            production: registry.config.is_production(),
        };
        let router = Self::build_router(&registry.config, state);
        Self {
            router,
            config: registry.config,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RegistryConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(registry_handler))
            .route("/", any(registry_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

/// Main registry handler.
/// Builds the request context, picks the participating middleware, and
/// streams back whatever the chain produces.
async fn registry_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> impl IntoResponse {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);

    let cancel = CancelFlag::new();
    let (stage, receiver) = response_channel(state.production, cancel.clone());
    let ctx = Arc::new(RequestCtx::new(
        parts.method,
        path,
        query,
        parts.headers,
        body,
        stage,
        cancel,
    ));

    let chain: Vec<MiddlewareEntry> = state
        .middleware
        .iter()
        .filter(|entry| entry.plugin.should_handle(&ctx))
        .cloned()
        .collect();

    tracing::debug!(
        request_id = %ctx.id(),
        method = %ctx.method(),
        path = %ctx.path(),
        layers = chain.len(),
        "dispatching request"
    );

    let worker_ctx = ctx.clone();
    let production = state.production;
    tokio::spawn(async move {
        let complete = run_chain(&chain, &worker_ctx, production).await;
        metrics::record_request(
            worker_ctx.method().as_str(),
            complete.status().as_u16(),
            start_time,
        );
    });

    match receiver.head.await {
        Ok((status, headers)) => {
            let stream = receiver.body.map(Ok::<_, Infallible>);
            let mut response = Response::new(Body::from_stream(stream));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        // The chain task panicked before flushing anything.
        Err(_) => {
            tracing::error!(request_id = %ctx.id(), "response channel closed without a head");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
