//! Capability selection: binding configured export names to the typed
//! plugin instances that fill each infrastructure role.
//!
//! Selection failures distinguish "no export by that name" from "that
//! export does not provide this capability" so the operator's fix is
//! obvious from the log line alone.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::bootstrap::orchestrator::{LoadedPlugin, PluginSet};
use crate::config::SelectionConfig;
use crate::plugins::{
    AuthenticationPlugin, CachePlugin, DatabasePlugin, PluginInstance, Provides, StoragePlugin,
    ValidationPlugin,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("no plugin selected for required capability {capability:?}")]
    MissingSelection { capability: String },

    #[error("capability {capability:?} selects export {export:?}, which is not loaded")]
    NoSuchExport { capability: String, export: String },

    #[error("capability {capability:?} selects export {export:?}, which does not provide it")]
    DoesNotProvide { capability: String, export: String },

    #[error(
        "export {export:?} declares instance {instance:?} for capability {capability:?} \
         but init produced no such instance of that type"
    )]
    InstanceMissing {
        capability: String,
        export: String,
        instance: String,
    },
}

/// The winning instance for each infrastructure capability.
#[derive(Clone)]
pub struct SelectedPlugins {
    pub authentication: Arc<dyn AuthenticationPlugin>,
    pub database: Arc<dyn DatabasePlugin>,
    pub validation: Arc<dyn ValidationPlugin>,
    pub cache: Option<Arc<dyn CachePlugin>>,
    /// File category → storage backend.
    pub storage: HashMap<String, Arc<dyn StoragePlugin>>,
}

impl std::fmt::Debug for SelectedPlugins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedPlugins")
            .field("authentication", &self.authentication.id())
            .field("database", &self.database.id())
            .field("validation", &self.validation.id())
            .field("cache", &self.cache.as_ref().map(|c| c.id()))
            .field(
                "storage",
                &self
                    .storage
                    .iter()
                    .map(|(cat, p)| (cat.clone(), p.id().to_string()))
                    .collect::<HashMap<_, _>>(),
            )
            .finish()
    }
}

/// Resolve the configured selection table against the loaded plugins.
pub fn select(
    selection: &SelectionConfig,
    set: &PluginSet,
    plugins: &[LoadedPlugin],
) -> Result<SelectedPlugins, SelectError> {
    let authentication = required(
        selection.authentication.as_deref(),
        "authentication",
        set,
        plugins,
        |p| p.authentication.as_deref(),
        |inst| match inst {
            PluginInstance::Authentication(p) => Some(p.clone()),
            _ => None,
        },
    )?;

    let database = required(
        selection.database.as_deref(),
        "database",
        set,
        plugins,
        |p| p.database.as_deref(),
        |inst| match inst {
            PluginInstance::Database(p) => Some(p.clone()),
            _ => None,
        },
    )?;

    let validation = required(
        selection.validation.as_deref(),
        "validation",
        set,
        plugins,
        |p| p.validation.as_deref(),
        |inst| match inst {
            PluginInstance::Validation(p) => Some(p.clone()),
            _ => None,
        },
    )?;

    let cache = match selection.cache.as_deref() {
        Some(export_name) => Some(resolve(
            export_name,
            "cache",
            set,
            plugins,
            |p| p.cache.as_deref(),
            |inst| match inst {
                PluginInstance::Cache(p) => Some(p.clone()),
                _ => None,
            },
        )?),
        None => None,
    };

    let mut storage = HashMap::with_capacity(selection.storage.len());
    for (category, export_name) in &selection.storage {
        let capability = format!("storage:{category}");
        let backend = resolve(
            export_name,
            &capability,
            set,
            plugins,
            |p| p.storage.get(category).map(String::as_str),
            |inst| match inst {
                PluginInstance::Storage(p) => Some(p.clone()),
                _ => None,
            },
        )?;
        storage.insert(category.clone(), backend);
    }

    let selected = SelectedPlugins {
        authentication,
        database,
        validation,
        cache,
        storage,
    };
    info!(?selected, "plugin selection complete");
    Ok(selected)
}

fn required<T>(
    configured: Option<&str>,
    capability: &str,
    set: &PluginSet,
    plugins: &[LoadedPlugin],
    provided: impl Fn(&Provides) -> Option<&str>,
    downcast: impl Fn(&PluginInstance) -> Option<T>,
) -> Result<T, SelectError> {
    let export_name = configured.ok_or_else(|| SelectError::MissingSelection {
        capability: capability.to_string(),
    })?;
    resolve(export_name, capability, set, plugins, provided, downcast)
}

/// Look up the export, read its capability declaration, and fetch the
/// declared instance from the loaded set.
fn resolve<T>(
    export_name: &str,
    capability: &str,
    set: &PluginSet,
    plugins: &[LoadedPlugin],
    provided: impl Fn(&Provides) -> Option<&str>,
    downcast: impl Fn(&PluginInstance) -> Option<T>,
) -> Result<T, SelectError> {
    let export = set
        .export(export_name)
        .ok_or_else(|| SelectError::NoSuchExport {
            capability: capability.to_string(),
            export: export_name.to_string(),
        })?;
    let instance_id = provided(export.provisions()).ok_or_else(|| SelectError::DoesNotProvide {
        capability: capability.to_string(),
        export: export_name.to_string(),
    })?;
    plugins
        .iter()
        .filter(|loaded| loaded.export_name == export_name && loaded.instance.id() == instance_id)
        .find_map(|loaded| downcast(&loaded.instance))
        .ok_or_else(|| SelectError::InstanceMissing {
            capability: capability.to_string(),
            export: export_name.to_string(),
            instance: instance_id.to_string(),
        })
}
