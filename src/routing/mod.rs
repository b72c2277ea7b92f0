//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration (at plugin init):
//!     "GET /feeds/[slug]/packages"
//!     → pattern.rs (parse into ordered path parts)
//!     → RoutePattern (immutable, reused per request)
//!
//! Incoming request:
//!     method + path
//!     → matcher.rs (lock-step walk, capture extraction)
//!     → Some(Captures) or None
//! ```
//!
//! # Design Decisions
//! - Patterns compiled once at registration, immutable at runtime
//! - Three part kinds (literal, single capture, rest capture); no regex
//! - Deterministic: same input always produces the same captures
//! - "No match" is a sentinel, not an error

pub mod matcher;
pub mod pattern;

pub use matcher::{match_path, match_request, Captures};
pub use pattern::{PathPart, PatternError, RoutePattern};
