//! Process bootstrap.
//!
//! # Responsibilities
//! - Resolve plugin load order and validate plugin configuration
//! - Initialize plugins and select the instance for each capability
//! - Broadcast environment metadata once every plugin is up
//! - Map each fatal outcome to a subsystem-namespaced exit code

pub mod exit;
pub mod meta;
pub mod orchestrator;
pub mod selection;

pub use exit::ExitCode;
pub use meta::{EnvMeta, RoleMeta};
pub use orchestrator::{boot, check, BootError, BootedRegistry, LoadedPlugin, PluginSet};
pub use selection::{SelectError, SelectedPlugins};
