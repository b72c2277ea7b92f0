//! Boot sequence for the registry process.
//!
//! # Data Flow
//! ```text
//! RegistryConfig + PluginSet
//!     → resolve load order      (fatal: LoadOrderUnresolvable)
//!     → validate plugin configs (fatal: PluginConfigInvalid)
//!     → init plugins in order   (fatal: PluginInitFailed)
//!     → select capabilities     (fatal: SelectionFailed)
//!     → broadcast EnvMeta
//!     → BootedRegistry, ready to serve
//! ```
//!
//! # Design Decisions
//! - Every phase is a hard gate: the first failure aborts the whole boot
//!   rather than limping along with a partial plugin set
//! - Middleware chain order is load order; the resolver, not registration
//!   order, decides who wraps whom

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::bootstrap::exit::ExitCode;
use crate::bootstrap::meta::{EnvMeta, RoleMeta};
use crate::bootstrap::selection::{select, SelectError, SelectedPlugins};
use crate::config::RegistryConfig;
use crate::middleware::MiddlewareEntry;
use crate::plugins::{sort_exports, PluginError, PluginExport, PluginInstance, ResolveError};

/// The full set of plugin exports registered by the embedding process.
#[derive(Default)]
pub struct PluginSet {
    exports: Vec<PluginExport>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, export: PluginExport) {
        self.exports.push(export);
    }

    pub fn exports(&self) -> &[PluginExport] {
        &self.exports
    }

    pub fn export(&self, name: &str) -> Option<&PluginExport> {
        self.exports.iter().find(|e| e.name() == name)
    }
}

/// One instance produced during init, tagged with its owning export.
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    pub export_name: String,
    pub instance: PluginInstance,
}

#[derive(Debug, Error)]
pub enum BootError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("plugin {plugin:?} requires configuration but none was supplied")]
    ConfigRequired { plugin: String },

    #[error("plugin {plugin:?} declares both a config schema and a custom validator")]
    ConflictingValidators { plugin: String },

    #[error("configuration for plugin {plugin:?} is invalid: {}", violations.join("; "))]
    ConfigSchema {
        plugin: String,
        violations: Vec<String>,
    },

    #[error("configuration for plugin {plugin:?} was rejected by its validator")]
    ConfigRejected { plugin: String },

    #[error("configuration for plugin {plugin:?} could not be decoded: {source}")]
    ConfigDecode {
        plugin: String,
        source: serde_json::Error,
    },

    #[error("plugin {plugin:?} failed to initialize: {source}")]
    Init {
        plugin: String,
        source: PluginError,
    },

    #[error(transparent)]
    Select(#[from] SelectError),
}

impl BootError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Resolve(_) => ExitCode::LoadOrderUnresolvable,
            Self::ConfigRequired { .. }
            | Self::ConflictingValidators { .. }
            | Self::ConfigSchema { .. }
            | Self::ConfigRejected { .. }
            | Self::ConfigDecode { .. } => ExitCode::PluginConfigInvalid,
            Self::Init { .. } => ExitCode::PluginInitFailed,
            Self::Select(_) => ExitCode::SelectionFailed,
        }
    }
}

/// Everything the HTTP layer needs once boot completes.
#[derive(Debug)]
pub struct BootedRegistry {
    pub config: RegistryConfig,
    /// Middleware entries in load order.
    pub middleware: Arc<Vec<MiddlewareEntry>>,
    pub selected: Arc<SelectedPlugins>,
    pub plugins: Arc<Vec<LoadedPlugin>>,
}

/// Run the whole boot sequence.
pub async fn boot(config: RegistryConfig, set: PluginSet) -> Result<BootedRegistry, BootError> {
    let order = resolve_order(&set)?;
    let configs = validate_configs(&config, &set, &order)?;

    let mut loaded: Vec<LoadedPlugin> = Vec::new();
    let mut middleware: Vec<MiddlewareEntry> = Vec::new();
    for (&idx, plugin_config) in order.iter().zip(configs) {
        let export = &set.exports()[idx];
        let instances = export
            .init(plugin_config)
            .await
            .map_err(|source| BootError::Init {
                plugin: export.name().to_string(),
                source,
            })?;
        info!(
            plugin = export.name(),
            instances = instances.len(),
            "plugin initialized"
        );
        for instance in instances {
            if let PluginInstance::Middleware(layer) = &instance {
                middleware.push(MiddlewareEntry {
                    export_name: export.name().to_string(),
                    plugin: layer.clone(),
                });
            }
            loaded.push(LoadedPlugin {
                export_name: export.name().to_string(),
                instance,
            });
        }
    }

    let selected = Arc::new(select(&config.selection, &set, &loaded)?);
    let plugins = Arc::new(loaded);

    let meta = EnvMeta {
        plugin_loader: RoleMeta::new(
            "plugin-loader",
            Value::Array(
                order
                    .iter()
                    .map(|&idx| Value::String(set.exports()[idx].name().to_string()))
                    .collect(),
            ),
        ),
        plugin_selector: RoleMeta::new("plugin-selector", serde_json::json!({})),
        backend: RoleMeta::new(
            "backend",
            serde_json::json!({ "bindAddress": config.listener.bind_address }),
        ),
        selected: selected.clone(),
        plugins: plugins.clone(),
    };
    for &idx in &order {
        set.exports()[idx].notify_meta(meta.clone()).await;
    }

    metrics::gauge!("registry_plugins_loaded").set(plugins.len() as f64);

    Ok(BootedRegistry {
        config,
        middleware: Arc::new(middleware),
        selected,
        plugins,
    })
}

/// Dry-run the pre-init phases for `--check`: load order and plugin
/// configuration, without touching any backend.
pub fn check(config: &RegistryConfig, set: &PluginSet) -> Result<(), BootError> {
    let order = resolve_order(set)?;
    validate_configs(config, set, &order)?;
    Ok(())
}

fn resolve_order(set: &PluginSet) -> Result<Vec<usize>, BootError> {
    let order = sort_exports(set.exports())?;
    info!(
        order = ?order
            .iter()
            .map(|&idx| set.exports()[idx].name())
            .collect::<Vec<_>>(),
        "plugin load order resolved"
    );
    Ok(order)
}

/// Validate each export's configuration, returning the decoded config
/// values in load order.
fn validate_configs(
    config: &RegistryConfig,
    set: &PluginSet,
    order: &[usize],
) -> Result<Vec<Option<Value>>, BootError> {
    for name in config.plugins.keys() {
        if set.export(name).is_none() {
            warn!(plugin = %name, "configuration present for an unregistered plugin");
        }
    }

    let mut configs = Vec::with_capacity(order.len());
    for &idx in order {
        let export = &set.exports()[idx];
        let name = export.name().to_string();

        if export.schema().is_some() && export.custom_validator().is_some() {
            return Err(BootError::ConflictingValidators { plugin: name });
        }

        let raw = match config.plugin_config(export.name()) {
            Some(value) => Some(serde_json::to_value(value).map_err(|source| {
                BootError::ConfigDecode {
                    plugin: name.clone(),
                    source,
                }
            })?),
            None => None,
        };

        if raw.is_none() && export.is_config_required() {
            return Err(BootError::ConfigRequired { plugin: name });
        }

        if let Some(value) = &raw {
            if let Some(schema) = export.schema() {
                if let Err(violations) = schema.validate(value) {
                    return Err(BootError::ConfigSchema {
                        plugin: name,
                        violations,
                    });
                }
            } else if let Some(validator) = export.custom_validator() {
                if !validator(value) {
                    return Err(BootError::ConfigRejected { plugin: name });
                }
            }
        }

        configs.push(raw);
    }
    Ok(configs)
}
