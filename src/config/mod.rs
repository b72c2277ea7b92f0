//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RegistryConfig (validated, immutable)
//!     → per-plugin [plugins.<name>] blocks handed to each plugin at init
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require restart
//! - All host fields have defaults to allow minimal configs
//! - Plugin blocks are opaque here; schema or validator checks happen in
//!   the bootstrap phase where the owning export is known

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    Environment, ListenerConfig, ObservabilityConfig, RegistryConfig, SelectionConfig,
    TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
