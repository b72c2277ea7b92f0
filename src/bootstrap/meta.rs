//! Environment metadata broadcast to plugins after initialization.

use std::sync::Arc;

use serde_json::Value;

use crate::bootstrap::orchestrator::LoadedPlugin;
use crate::bootstrap::selection::SelectedPlugins;

/// Identity of one infrastructure role in the running process.
#[derive(Debug, Clone)]
pub struct RoleMeta {
    pub name: String,
    pub version: String,
    /// Role-specific details (load order, selection table, bind address).
    pub data: Value,
}

impl RoleMeta {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            data,
        }
    }
}

/// Snapshot of the booted environment, handed to each plugin's
/// `on_meta_loaded` hook once every plugin has initialized.
#[derive(Debug, Clone)]
pub struct EnvMeta {
    pub plugin_loader: RoleMeta,
    pub plugin_selector: RoleMeta,
    pub backend: RoleMeta,
    pub selected: Arc<SelectedPlugins>,
    pub plugins: Arc<Vec<LoadedPlugin>>,
}
