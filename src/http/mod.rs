//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! incoming request
//!     → server.rs (Axum catch-all handler)
//!     → request.rs (RequestCtx: method, path, headers, body, slots)
//!     → middleware chain (crate::middleware)
//!     → response.rs (staged response machine)
//!     → server.rs streams head + body chunks to the client
//! ```
//!
//! # Design Decisions
//! - The response is a channel, not a return value: middleware flushes
//!   headers and body chunks whenever it is ready, and the handler task
//!   streams them out concurrently
//! - Each request gets a UUID v4 id carried through all log lines

pub mod request;
pub mod response;
pub mod server;

pub use request::{CancelFlag, RequestCtx};
pub use response::{
    response_channel, BodyStage, CompleteStage, ContextKey, HeadersStage, ResponseReceiver,
    StageContext,
};
pub use server::RegistryServer;
