//! Response lifecycle state machine.
//!
//! # Data Flow
//! ```text
//! HeadersStage (headers mutable, status not sent)
//!     → flush_headers(status)      — sends the head exactly once
//! BodyStage (body sink writable, optional side buffer)
//!     → flush_body()               — closes the stream exactly once
//! CompleteStage (immutable snapshot: status, headers, saved bytes)
//! ```
//!
//! # Design Decisions
//! - Transitions are strictly forward and idempotent: flushing twice
//!   returns the same next-stage handle rather than erroring
//! - Stage handles alias one shared machine, so "the same BodyStage" is a
//!   real identity, not a copy
//! - Writes after client disconnect or after completion are detected and
//!   dropped, logged outside production mode, never a panic
//! - Each stage has a private context slot map that does not propagate to
//!   the next stage; whoever needs forwarding does it explicitly

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::http::header::{HeaderName, HeaderValue, SERVER};
use axum::http::{HeaderMap, StatusCode};
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::http::request::CancelFlag;

/// Value stamped into the `server` header before the first flush.
pub const SERVER_IDENT: &str = concat!("pkg-registry/", env!("CARGO_PKG_VERSION"));

/// Well-known purposes for stage side-channel context values.
///
/// A small closed set instead of dynamic symbol keys: cross-cutting layers
/// (cookie tracking) get a private, collision-free extension point without
/// runtime reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// Cookie jar tracked across header manipulation.
    Cookies,
    /// Free-form diagnostic payload for error-formatting layers.
    Diagnostics,
}

/// Typed side-channel values attached to a single stage.
#[derive(Default)]
pub struct StageContext {
    values: HashMap<ContextKey, Box<dyn Any + Send + Sync>>,
}

impl StageContext {
    pub fn set<T: Any + Send + Sync>(&mut self, key: ContextKey, value: T) {
        self.values.insert(key, Box::new(value));
    }

    pub fn take<T: Any + Send + Sync>(&mut self, key: ContextKey) -> Option<T> {
        let value = self.values.remove(&key)?;
        match value.downcast::<T>() {
            Ok(boxed) => Some(*boxed),
            Err(original) => {
                self.values.insert(key, original);
                None
            }
        }
    }

    pub fn contains(&self, key: ContextKey) -> bool {
        self.values.contains_key(&key)
    }
}

/// Head of the response, sent once on the first `flush_headers`.
pub type ResponseHead = (StatusCode, HeaderMap);

/// Receiving side of a response machine, consumed by the server loop.
pub struct ResponseReceiver {
    /// Resolves when some layer flushes headers.
    pub head: oneshot::Receiver<ResponseHead>,
    /// Streamed body chunks; ends when `flush_body` runs.
    pub body: UnboundedReceiver<Bytes>,
}

enum Phase {
    Headers {
        headers: HeaderMap,
        head_tx: oneshot::Sender<ResponseHead>,
        body_tx: UnboundedSender<Bytes>,
        ctx: StageContext,
    },
    Body {
        status: StatusCode,
        headers: HeaderMap,
        body_tx: UnboundedSender<Bytes>,
        save: bool,
        saved: Vec<u8>,
        ctx: StageContext,
    },
    Complete(CompleteStage),
}

struct Machine {
    phase: Mutex<Phase>,
    production: bool,
    cancel: CancelFlag,
}

impl Machine {
    fn dropped_write(&self, reason: &str) {
        // Silent in production; a disconnecting client is not noteworthy.
        if !self.production {
            tracing::debug!(reason, "response write dropped");
        }
    }
}

/// Build a response machine for one request.
///
/// Returns the entry stage handle and the receiver the server loop turns
/// into the actual HTTP response.
pub fn response_channel(production: bool, cancel: CancelFlag) -> (HeadersStage, ResponseReceiver) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = unbounded();
    let machine = Arc::new(Machine {
        phase: Mutex::new(Phase::Headers {
            headers: HeaderMap::new(),
            head_tx,
            body_tx,
            ctx: StageContext::default(),
        }),
        production,
        cancel,
    });
    (
        HeadersStage { machine },
        ResponseReceiver {
            head: head_rx,
            body: body_rx,
        },
    )
}

/// First stage: headers are mutable, the status line has not been sent.
#[derive(Clone)]
pub struct HeadersStage {
    machine: Arc<Machine>,
}

impl HeadersStage {
    /// Insert (or replace) a response header.
    ///
    /// A no-op once headers have been flushed.
    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        let mut phase = self.machine.phase.lock().expect("response lock poisoned");
        if let Phase::Headers { headers, .. } = &mut *phase {
            headers.insert(name, value);
        } else {
            self.machine.dropped_write("header mutation after flush");
        }
    }

    /// Read back a header set on this stage.
    pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        let phase = self.machine.phase.lock().expect("response lock poisoned");
        match &*phase {
            Phase::Headers { headers, .. } | Phase::Body { headers, .. } => {
                headers.get(name).cloned()
            }
            Phase::Complete(complete) => complete.headers().get(name).cloned(),
        }
    }

    /// True once `flush_headers` has run (used by the outermost caller to
    /// detect "no middleware produced a response").
    pub fn flushed(&self) -> bool {
        let phase = self.machine.phase.lock().expect("response lock poisoned");
        !matches!(&*phase, Phase::Headers { .. })
    }

    /// Attach a side-channel value to this stage.
    pub fn set_context<T: Any + Send + Sync>(&self, key: ContextKey, value: T) {
        let mut phase = self.machine.phase.lock().expect("response lock poisoned");
        if let Phase::Headers { ctx, .. } = &mut *phase {
            ctx.set(key, value);
        }
    }

    /// Remove a side-channel value from this stage.
    pub fn take_context<T: Any + Send + Sync>(&self, key: ContextKey) -> Option<T> {
        let mut phase = self.machine.phase.lock().expect("response lock poisoned");
        match &mut *phase {
            Phase::Headers { ctx, .. } => ctx.take(key),
            _ => None,
        }
    }

    /// Send the status line and headers, transitioning to the body stage.
    ///
    /// Idempotent: repeated calls return the already-created [`BodyStage`]
    /// without re-sending, and the later status is ignored. The fixed
    /// `server` identification header is stamped before the first flush
    /// unless a layer already set one.
    pub fn flush_headers(&self, status: StatusCode) -> BodyStage {
        let mut phase = self.machine.phase.lock().expect("response lock poisoned");
        if matches!(&*phase, Phase::Headers { .. }) {
            let old = std::mem::replace(
                &mut *phase,
                Phase::Complete(CompleteStage::new(status, HeaderMap::new(), None)),
            );
            if let Phase::Headers {
                mut headers,
                head_tx,
                body_tx,
                ctx: _,
            } = old
            {
                if !headers.contains_key(SERVER) {
                    headers.insert(SERVER, HeaderValue::from_static(SERVER_IDENT));
                }
                *phase = Phase::Body {
                    status,
                    headers: headers.clone(),
                    body_tx,
                    save: false,
                    saved: Vec::new(),
                    ctx: StageContext::default(),
                };
                if head_tx.send((status, headers)).is_err() {
                    // Receiver gone: the client disconnected before headers.
                    self.machine.cancel.cancel();
                    self.machine.dropped_write("head receiver closed");
                }
            }
        }
        BodyStage {
            machine: Arc::clone(&self.machine),
        }
    }
}

/// Second stage: status sent, body sink writable.
#[derive(Clone)]
pub struct BodyStage {
    machine: Arc<Machine>,
}

impl std::fmt::Debug for BodyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyStage")
            .field("machine", &Arc::as_ptr(&self.machine))
            .finish()
    }
}

impl PartialEq for BodyStage {
    /// Two handles are equal when they alias the same response machine.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.machine, &other.machine)
    }
}

impl BodyStage {
    /// Write a chunk to the body sink.
    ///
    /// Writes after the client disconnected or after `flush_body` are
    /// detected and dropped, never an error for the writer.
    pub fn write(&self, chunk: impl Into<Bytes>) {
        let chunk: Bytes = chunk.into();
        let mut phase = self.machine.phase.lock().expect("response lock poisoned");
        match &mut *phase {
            Phase::Body {
                body_tx,
                save,
                saved,
                ..
            } => {
                if *save {
                    saved.extend_from_slice(&chunk);
                }
                if body_tx.unbounded_send(chunk).is_err() {
                    self.machine.cancel.cancel();
                    self.machine.dropped_write("body receiver closed");
                }
            }
            _ => self.machine.dropped_write("write outside body stage"),
        }
    }

    /// Buffer all future writes into a side buffer for diagnostics.
    pub fn enable_body_save(&self) {
        let mut phase = self.machine.phase.lock().expect("response lock poisoned");
        if let Phase::Body { save, .. } = &mut *phase {
            *save = true;
        }
    }

    /// Attach a side-channel value to this stage.
    pub fn set_context<T: Any + Send + Sync>(&self, key: ContextKey, value: T) {
        let mut phase = self.machine.phase.lock().expect("response lock poisoned");
        if let Phase::Body { ctx, .. } = &mut *phase {
            ctx.set(key, value);
        }
    }

    /// Remove a side-channel value from this stage.
    pub fn take_context<T: Any + Send + Sync>(&self, key: ContextKey) -> Option<T> {
        let mut phase = self.machine.phase.lock().expect("response lock poisoned");
        match &mut *phase {
            Phase::Body { ctx, .. } => ctx.take(key),
            _ => None,
        }
    }

    /// Close the body stream, transitioning to the complete stage.
    ///
    /// Idempotent: repeated calls return the same snapshot.
    pub fn flush_body(&self) -> CompleteStage {
        let mut phase = self.machine.phase.lock().expect("response lock poisoned");
        match &*phase {
            Phase::Complete(complete) => complete.clone(),
            Phase::Headers { .. } => {
                // Flushing the body with headers still pending would skip a
                // stage; treat it as a flush of an empty 200 first.
                drop(phase);
                let body = HeadersStage {
                    machine: Arc::clone(&self.machine),
                }
                .flush_headers(StatusCode::OK);
                body.flush_body()
            }
            Phase::Body { .. } => {
                let old = std::mem::replace(
                    &mut *phase,
                    Phase::Complete(CompleteStage::new(StatusCode::OK, HeaderMap::new(), None)),
                );
                let Phase::Body {
                    status,
                    headers,
                    body_tx,
                    save,
                    saved,
                    ctx: _,
                } = old
                else {
                    unreachable!("phase changed while locked");
                };
                body_tx.close_channel();
                let complete = CompleteStage::new(
                    status,
                    headers,
                    if save { Some(Bytes::from(saved)) } else { None },
                );
                *phase = Phase::Complete(complete.clone());
                complete
            }
        }
    }
}

struct CompleteInner {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
    ctx: Mutex<StageContext>,
}

/// Final stage: immutable snapshot of the finished response.
#[derive(Clone)]
pub struct CompleteStage {
    inner: Arc<CompleteInner>,
}

impl CompleteStage {
    fn new(status: StatusCode, headers: HeaderMap, body: Option<Bytes>) -> Self {
        Self {
            inner: Arc::new(CompleteInner {
                status,
                headers,
                body,
                ctx: Mutex::new(StageContext::default()),
            }),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// The written body bytes, if body-save was enabled.
    pub fn saved_body(&self) -> Option<&Bytes> {
        self.inner.body.as_ref()
    }

    /// Attach a side-channel value to the snapshot.
    pub fn set_context<T: Any + Send + Sync>(&self, key: ContextKey, value: T) {
        self.inner
            .ctx
            .lock()
            .expect("stage context lock poisoned")
            .set(key, value);
    }

    /// Remove a side-channel value from the snapshot.
    pub fn take_context<T: Any + Send + Sync>(&self, key: ContextKey) -> Option<T> {
        self.inner
            .ctx
            .lock()
            .expect("stage context lock poisoned")
            .take(key)
    }
}
