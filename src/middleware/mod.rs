//! Middleware pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → server loop filters plugins via should_handle
//!     → dispatcher.rs chains the survivors (strict call/return nesting)
//!     → errors bubble up stamped with their owning plugin (error.rs)
//!     → top-level fallback renders anything no layer handled
//! ```
//!
//! # Design Decisions
//! - The chain is a recursion, not an iteration: wrap-around-`next`
//!   behavior is structurally required by error-handling middleware
//! - A request with no flushed headers after the chain is a server bug,
//!   reported loudly, never a silent empty reply

pub mod dispatcher;
pub mod error;

pub use dispatcher::{run_chain, MiddlewareEntry, Next};
pub use error::{RequestError, RequestErrorKind};
