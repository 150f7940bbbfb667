//! Type definitions for the plugin system

use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString};

/// Plugin metadata information
#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    /// Unique key in the registry
    pub name: String,
    /// Higher runs first among plugins not ordered by dependencies
    pub priority: f64,
    /// Plugins that must run before this one when both are enabled
    pub deps: Vec<String>,
    pub description: String,
    pub version: String,
    pub api_version: u32,
}

impl PluginInfo {
    /// Info for a plugin built into this crate
    pub fn builtin(name: &str, priority: f64, deps: &[&str], description: &str) -> Self {
        Self {
            name: name.to_string(),
            priority,
            deps: deps.iter().map(|d| d.to_string()).collect(),
            description: description.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            api_version: crate::core::version::get_api_version(),
        }
    }
}

/// Operation kinds a plugin may serve
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Refine,
    Search,
    GetUpdates,
    GetDistroUpgrades,
    Refresh,
    Install,
    Remove,
    Launch,
    SetRating,
    FilenameToApp,
}

/// Actions routed to a record's management plugin
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AppAction {
    Install,
    Remove,
    Launch,
    SetRating,
}

impl AppAction {
    pub fn capability(self) -> Capability {
        match self {
            AppAction::Install => Capability::Install,
            AppAction::Remove => Capability::Remove,
            AppAction::Launch => Capability::Launch,
            AppAction::SetRating => Capability::SetRating,
        }
    }
}

/// Registry view of one plugin, in execution order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSummary {
    pub name: String,
    pub priority: f64,
    pub enabled: bool,
    pub description: String,
    pub version: String,
    pub capabilities: Vec<Capability>,
}
