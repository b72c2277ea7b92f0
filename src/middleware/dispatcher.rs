//! Middleware chain dispatcher.
//!
//! # Data Flow
//! ```text
//! filtered middleware list (by should_handle)
//!     → dispatch(chain, 0, ctx)
//!         plugin 0 handle(ctx, next) ──next.run()──▶ plugin 1 ... plugin N
//!         ◀── results / errors bubble back up the same stack ──
//!     → run_chain: top-level fallback (unhandled error, no response)
//! ```
//!
//! # Design Decisions
//! - Index-based recursion, not a flat loop: each layer wraps the whole
//!   downstream chain so it can intercept results (error formatting,
//!   header fixups after the fact)
//! - `Next` is consumed by `run`, so calling it twice is a compile error
//!   rather than a silent double-dispatch
//! - Errors are stamped with their owning plugin exactly once; an error a
//!   downstream layer already handled passes through unchanged
//! - Cancellation is checked before every layer and stops the chain
//!   without an error: an aborted request is a normal early termination

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::http::request::RequestCtx;
use crate::http::response::CompleteStage;
use crate::middleware::error::RequestError;
use crate::plugins::MiddlewarePlugin;

/// One loaded middleware layer: the runtime plugin plus its owning export.
#[derive(Clone)]
pub struct MiddlewareEntry {
    /// Name of the export that produced this plugin, used for attribution.
    pub export_name: String,
    pub plugin: Arc<dyn MiddlewarePlugin>,
}

impl std::fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareEntry")
            .field("export_name", &self.export_name)
            .field("plugin", &self.plugin.id())
            .finish()
    }
}

/// Continuation handed to each middleware layer.
///
/// Consuming it with [`Next::run`] invokes the rest of the chain; dropping
/// it without running resolves the chain at this layer. Because `run` takes
/// `self` by value, invoking the continuation twice does not compile.
pub struct Next<'a> {
    chain: &'a [MiddlewareEntry],
    index: usize,
}

impl<'a> Next<'a> {
    /// Run the downstream chain, propagating its errors.
    pub async fn run(self, ctx: &RequestCtx) -> Result<(), RequestError> {
        dispatch(self.chain, self.index, ctx).await
    }

    /// Run the downstream chain, returning its error as a value instead of
    /// propagating it.
    ///
    /// This is the error-formatting layer's mode: it receives every
    /// downstream failure (already stamped with its owner) and decides
    /// whether to render, transform or re-raise it.
    pub async fn run_collect_error(self, ctx: &RequestCtx) -> Option<RequestError> {
        dispatch(self.chain, self.index, ctx).await.err()
    }
}

/// Recursive dispatch step. Layer `index` runs with a continuation for
/// `index + 1`; pre-`next` work of layer N strictly precedes layer N+1, and
/// post-`next` work of layer N strictly follows the full nested chain.
fn dispatch<'a>(
    chain: &'a [MiddlewareEntry],
    index: usize,
    ctx: &'a RequestCtx,
) -> BoxFuture<'a, Result<(), RequestError>> {
    Box::pin(async move {
        if ctx.cancel_flag().is_cancelled() {
            tracing::debug!(request_id = %ctx.id(), layer = index, "request cancelled, chain stopped");
            return Ok(());
        }
        let Some(entry) = chain.get(index) else {
            return Ok(());
        };

        let next = Next {
            chain,
            index: index + 1,
        };
        match entry.plugin.handle(ctx, next).await {
            Ok(()) => Ok(()),
            Err(mut err) => {
                if !err.handled {
                    err.stamp(&entry.export_name, entry.plugin.display_name());
                    tracing::debug!(
                        request_id = %ctx.id(),
                        plugin_export = %entry.export_name,
                        error = %err,
                        "request error attributed"
                    );
                }
                Err(err)
            }
        }
    })
}

/// Drive the whole chain for one request and close out the response.
///
/// The top-level fallback: renders errors no layer handled, reports the
/// fatal "no middleware produced a response" condition, and guarantees the
/// response machine reaches the complete stage.
pub async fn run_chain(
    chain: &[MiddlewareEntry],
    ctx: &RequestCtx,
    production: bool,
) -> CompleteStage {
    match dispatch(chain, 0, ctx).await {
        Ok(()) => {
            if !ctx.response().flushed() && !ctx.cancel_flag().is_cancelled() {
                tracing::error!(
                    request_id = %ctx.id(),
                    method = %ctx.method(),
                    path = %ctx.path(),
                    "no middleware produced a response"
                );
                let body = ctx
                    .response()
                    .flush_headers(StatusCode::INTERNAL_SERVER_ERROR);
                body.write("no middleware produced a response");
            }
        }
        Err(err) => {
            // An error that reached the top was rendered by no layer.
            tracing::error!(
                request_id = %ctx.id(),
                plugin_export = err.plugin_export_name.as_deref().unwrap_or("unknown"),
                status = err.status.as_u16(),
                error = %err,
                "unhandled mid-request error"
            );
            if !ctx.response().flushed() {
                let body = ctx.response().flush_headers(err.status);
                body.write(err.user_message(production));
            }
        }
    }

    // Idempotent transitions make this safe regardless of how far the
    // chain got.
    ctx.response().flush_headers(StatusCode::OK).flush_body()
}
