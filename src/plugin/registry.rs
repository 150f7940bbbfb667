//! Plugin Registry
//!
//! Owns every loaded plugin together with its enabled flag and the execution
//! order computed at setup. Dispatch code asks the registry for the ordered
//! list of enabled plugins serving a given capability.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::{
    AppManager, DistroUpgradeProvider, FileResolver, Plugin, Refiner, Refresher, Searcher,
    UpdateProvider,
};
use crate::plugin::types::{AppAction, PluginSummary};

struct PluginEntry {
    plugin: Box<dyn Plugin>,
    enabled: bool,
}

/// Plugin registry for managing loaded plugins
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, PluginEntry>,
    /// Execution order; registration order until setup computes the real one
    order: Vec<String>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("order", &self.order)
            .field(
                "disabled",
                &self
                    .plugins
                    .iter()
                    .filter(|(_, e)| !e.enabled)
                    .map(|(n, _)| n)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin in the registry
    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) -> PluginResult<()> {
        let plugin_name = plugin.plugin_info().name;

        if self.plugins.contains_key(&plugin_name) {
            return Err(PluginError::SetupFailed {
                plugin_name: plugin_name.clone(),
                cause: format!("Plugin '{}' is already registered", plugin_name),
            });
        }

        self.order.push(plugin_name.clone());
        self.plugins.insert(
            plugin_name,
            PluginEntry {
                plugin,
                enabled: true,
            },
        );
        Ok(())
    }

    pub fn get_plugin(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins.get(name).map(|e| e.plugin.as_ref())
    }

    pub fn get_plugin_mut(&mut self, name: &str) -> Option<&mut Box<dyn Plugin>> {
        self.plugins.get_mut(name).map(|e| &mut e.plugin)
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Get list of all plugin names, sorted
    pub fn get_plugin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.plugins.get(name).is_some_and(|e| e.enabled)
    }

    /// Disable a plugin for the rest of the process
    pub fn disable_plugin(&mut self, name: &str) -> PluginResult<()> {
        let entry = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| PluginError::PluginNotFound {
                plugin_name: name.to_string(),
            })?;
        entry.enabled = false;
        Ok(())
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Replace the execution order; every registered plugin must appear once
    pub fn set_order(&mut self, order: Vec<String>) -> PluginResult<()> {
        if order.len() != self.plugins.len() {
            return Err(PluginError::ExecutionError {
                plugin_name: "registry".to_string(),
                operation: "set_order".to_string(),
                cause: format!(
                    "order names {} plugins but {} are registered",
                    order.len(),
                    self.plugins.len()
                ),
            });
        }
        if let Some(unknown) = order.iter().find(|name| !self.plugins.contains_key(*name)) {
            return Err(PluginError::PluginNotFound {
                plugin_name: unknown.clone(),
            });
        }
        self.order = order;
        Ok(())
    }

    /// Enabled plugins in execution order
    pub fn enabled_plugins(&self) -> impl Iterator<Item = (&str, &dyn Plugin)> {
        self.order.iter().filter_map(|name| {
            self.plugins
                .get(name)
                .filter(|e| e.enabled)
                .map(|e| (name.as_str(), e.plugin.as_ref()))
        })
    }

    /// Enabled plugins exposing a capability, in execution order
    pub fn capable<'a, T: ?Sized + 'a>(
        &'a self,
        accessor: impl Fn(&'a dyn Plugin) -> Option<&'a T>,
    ) -> Vec<(&'a str, &'a T)> {
        self.enabled_plugins()
            .filter_map(|(name, plugin)| accessor(plugin).map(|cap| (name, cap)))
            .collect()
    }

    pub fn refiners(&self) -> Vec<(&str, &dyn Refiner)> {
        self.capable(|p| p.as_refiner())
    }

    pub fn searchers(&self) -> Vec<(&str, &dyn Searcher)> {
        self.capable(|p| p.as_searcher())
    }

    pub fn update_providers(&self) -> Vec<(&str, &dyn UpdateProvider)> {
        self.capable(|p| p.as_updates())
    }

    pub fn distro_upgrade_providers(&self) -> Vec<(&str, &dyn DistroUpgradeProvider)> {
        self.capable(|p| p.as_distro_upgrades())
    }

    pub fn refreshers(&self) -> Vec<(&str, &dyn Refresher)> {
        self.capable(|p| p.as_refresher())
    }

    pub fn file_resolvers(&self) -> Vec<(&str, &dyn FileResolver)> {
        self.capable(|p| p.as_file_resolver())
    }

    /// Enabled managers supporting `action`, in execution order
    pub fn app_managers(&self, action: AppAction) -> Vec<(&str, &dyn AppManager)> {
        self.capable(|p| p.as_app_manager())
            .into_iter()
            .filter(|(_, manager)| manager.supports(action))
            .collect()
    }

    /// Look up the manager a record names, whatever it supports
    pub fn app_manager(&self, name: &str) -> PluginResult<&dyn AppManager> {
        let entry = self
            .plugins
            .get(name)
            .filter(|e| e.enabled)
            .ok_or_else(|| PluginError::PluginNotFound {
                plugin_name: name.to_string(),
            })?;
        entry
            .plugin
            .as_app_manager()
            .ok_or_else(|| PluginError::NotSupported {
                plugin_name: name.to_string(),
                operation: "app-action".to_string(),
            })
    }

    /// Describe every plugin in execution order
    pub fn summaries(&self) -> Vec<PluginSummary> {
        self.order
            .iter()
            .filter_map(|name| self.plugins.get(name))
            .map(|entry| {
                let info = entry.plugin.plugin_info();
                PluginSummary {
                    name: info.name,
                    priority: info.priority,
                    enabled: entry.enabled,
                    description: info.description,
                    version: info.version,
                    capabilities: entry.plugin.capabilities(),
                }
            })
            .collect()
    }
}

/// Thread-safe shared plugin registry
#[derive(Debug, Clone, Default)]
pub struct SharedPluginRegistry {
    inner: Arc<RwLock<PluginRegistry>>,
}

impl SharedPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get access to the inner registry for read/write operations
    pub fn inner(&self) -> &Arc<RwLock<PluginRegistry>> {
        &self.inner
    }

    pub async fn has_plugin(&self, name: &str) -> bool {
        self.inner.read().await.has_plugin(name)
    }

    pub async fn get_plugin_names(&self) -> Vec<String> {
        self.inner.read().await.get_plugin_names()
    }

    pub async fn plugin_count(&self) -> usize {
        self.inner.read().await.plugin_count()
    }

    pub async fn is_enabled(&self, name: &str) -> bool {
        self.inner.read().await.is_enabled(name)
    }

    pub async fn summaries(&self) -> Vec<PluginSummary> {
        self.inner.read().await.summaries()
    }
}
