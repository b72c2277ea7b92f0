//! Registry data shapes exchanged with database plugins.
//!
//! These are the contract types only; how a backend stores them is its own
//! business.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A feed: a named namespace of packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A package inside a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub feed_slug: String,
    pub name: String,
    /// Latest published version, if any.
    #[serde(default)]
    pub latest_version: Option<String>,
}

/// One published version of a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageVersion {
    pub feed_slug: String,
    pub package_name: String,
    pub version: String,
    /// Format-specific manifest payload, opaque to the core.
    #[serde(default)]
    pub manifest: Value,
}
