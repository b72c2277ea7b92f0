//! Per-request context.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) as early as possible
//! - Carry method, path, query and headers into the middleware chain
//! - Hold the request body for at most one consumer
//! - Provide per-plugin private side-channel slots (route captures etc.)
//! - Track the cancellation flag tied to the client connection
//!
//! # Design Decisions
//! - Each request owns its context; nothing here is shared across requests
//! - Slots are keyed by owning plugin id: written by that plugin, read by
//!   no one else, so there are no cross-plugin races
//! - Cancellation is a flag, not a forced abort: plugins observe it at
//!   their own suspension points

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{HeaderMap, Method};
use uuid::Uuid;

use crate::http::response::HeadersStage;

/// Cancellation signal tied to the client connection.
///
/// Set when the client disconnects (detected via the response channel) or
/// by the server when it stops caring about the request. Checked by the
/// dispatcher before each middleware layer; an aborted request is a normal
/// early termination, never an error.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the request as cancelled.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once the request has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Context for a single in-flight request.
///
/// Built by the server loop, handed to every middleware layer by reference.
pub struct RequestCtx {
    id: Uuid,
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Mutex<Option<Body>>,
    slots: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
    response: HeadersStage,
    cancel: CancelFlag,
}

impl RequestCtx {
    pub fn new(
        method: Method,
        path: String,
        query: Option<String>,
        headers: HeaderMap,
        body: Body,
        response: HeadersStage,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path,
            query,
            headers,
            body: Mutex::new(Some(body)),
            slots: Mutex::new(HashMap::new()),
            response,
            cancel,
        }
    }

    /// Unique ID for this request, for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Take the request body. Returns `None` if another layer already took it.
    pub fn take_body(&self) -> Option<Body> {
        self.body.lock().expect("request body lock poisoned").take()
    }

    /// The response lifecycle entry stage for this request.
    pub fn response(&self) -> &HeadersStage {
        &self.response
    }

    /// The cancellation flag for this request.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Store a value in the slot owned by `owner` (a plugin instance id).
    ///
    /// Typical use: a middleware's `should_handle` stashing route captures
    /// for its `handle` to pick up.
    pub fn set_slot<T: Any + Send + Sync>(&self, owner: &str, value: T) {
        self.slots
            .lock()
            .expect("request slot lock poisoned")
            .insert(owner.to_string(), Box::new(value));
    }

    /// Remove and return the value in `owner`'s slot, if the type matches.
    pub fn take_slot<T: Any + Send + Sync>(&self, owner: &str) -> Option<T> {
        let mut slots = self.slots.lock().expect("request slot lock poisoned");
        let value = slots.remove(owner)?;
        match value.downcast::<T>() {
            Ok(boxed) => Some(*boxed),
            Err(original) => {
                // Wrong type requested; put the value back untouched.
                slots.insert(owner.to_string(), original);
                None
            }
        }
    }

    /// Clone the value in `owner`'s slot without removing it.
    pub fn slot_cloned<T: Any + Send + Sync + Clone>(&self, owner: &str) -> Option<T> {
        self.slots
            .lock()
            .expect("request slot lock poisoned")
            .get(owner)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }
}
