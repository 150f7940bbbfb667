//! Plugin Manager
//!
//! Owns the plugin registry and drives the plugin lifecycle: discovery,
//! compatibility checks, ordering, initialization and shutdown.

use std::collections::HashMap;

use log::debug;

use crate::notifications::api::{
    get_notification_service_arc, publish_quietly, Event, PluginEvent, PluginEventType,
    SharedNotificationManager,
};
use crate::plugin::builtin::api::get_all_builtin_plugins;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::initialization::PluginInitializer;
use crate::plugin::ordering::compute_order;
use crate::plugin::registry::SharedPluginRegistry;
use crate::plugin::traits::Plugin;
use crate::plugin::types::PluginInfo;

/// Central plugin manager
pub struct PluginManager {
    registry: SharedPluginRegistry,
    api_version: u32,
    notification_manager: SharedNotificationManager,
}

impl PluginManager {
    /// Create a manager wired to the global notification service
    pub fn new(api_version: u32) -> Self {
        Self::with_notification_manager(api_version, get_notification_service_arc())
    }

    pub fn with_notification_manager(
        api_version: u32,
        notification_manager: SharedNotificationManager,
    ) -> Self {
        Self {
            registry: SharedPluginRegistry::new(),
            api_version,
            notification_manager,
        }
    }

    /// Get shared access to the plugin registry
    pub fn registry(&self) -> &SharedPluginRegistry {
        &self.registry
    }

    pub fn notification_manager(&self) -> &SharedNotificationManager {
        &self.notification_manager
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Same major version (year) is compatible
    pub fn is_api_compatible(&self, plugin_api_version: u32) -> bool {
        self.get_major_version(self.api_version) == self.get_major_version(plugin_api_version)
    }

    /// Get major version (year) from API version
    pub fn get_major_version(&self, api_version: u32) -> u32 {
        crate::core::version::api_major(api_version)
    }

    /// Validate plugin compatibility before registration
    pub fn validate_plugin_compatibility(&self, plugin_info: &PluginInfo) -> PluginResult<()> {
        if !self.is_api_compatible(plugin_info.api_version) {
            return Err(PluginError::VersionIncompatible {
                message: format!(
                    "Plugin '{}' has incompatible API version {} (expected major version {})",
                    plugin_info.name,
                    plugin_info.api_version,
                    self.get_major_version(self.api_version)
                ),
            });
        }
        Ok(())
    }

    /// Register a plugin after checking it can run against this API
    pub async fn register_plugin(&self, plugin: Box<dyn Plugin>) -> PluginResult<()> {
        let info = plugin.plugin_info();
        self.validate_plugin_compatibility(&info)?;
        if !plugin.is_compatible(self.api_version) {
            return Err(PluginError::VersionIncompatible {
                message: format!(
                    "Plugin '{}' does not support API version {}",
                    info.name, self.api_version
                ),
            });
        }

        self.registry.inner().write().await.register_plugin(plugin)?;
        debug!("Registered plugin '{}' (priority {})", info.name, info.priority);
        publish_quietly(
            &self.notification_manager,
            Event::Plugin(PluginEvent::new(PluginEventType::Registered, info.name)),
        )
        .await;
        Ok(())
    }

    /// Register every builtin plugin not named in `excluded`
    ///
    /// Incompatible plugins are skipped with a warning. Returns the number
    /// registered.
    pub async fn discover_plugins(&self, excluded: &[String]) -> PluginResult<usize> {
        debug!(
            "PluginManager: Starting plugin discovery with exclusions: {:?}",
            excluded
        );

        let mut registered = 0;
        for plugin in get_all_builtin_plugins() {
            let name = plugin.plugin_info().name;
            if excluded.iter().any(|e| *e == name) {
                debug!("Plugin '{}' excluded by configuration", name);
                continue;
            }
            match self.register_plugin(plugin).await {
                Ok(()) => registered += 1,
                Err(e @ PluginError::VersionIncompatible { .. }) => {
                    log::warn!("Skipping plugin '{}': {}", name, e)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(registered)
    }

    /// Order and initialize every registered plugin
    ///
    /// A dependency cycle is fatal; a plugin failing to initialize is only
    /// disabled.
    pub async fn setup(
        &self,
        plugin_tables: HashMap<String, toml::Table>,
        use_colors: Option<bool>,
    ) -> PluginResult<()> {
        let mut registry = self.registry.inner().write().await;

        let infos: Vec<PluginInfo> = registry
            .order()
            .iter()
            .filter_map(|name| registry.get_plugin(name))
            .map(|plugin| plugin.plugin_info())
            .collect();
        let order = compute_order(&infos)?;
        debug!("Plugin order: {:?}", order);
        registry.set_order(order.clone())?;

        let initializer =
            PluginInitializer::new(self.notification_manager.clone(), plugin_tables, use_colors);
        let disabled = initializer.initialize_plugins(&mut registry, &order).await;
        if !disabled.is_empty() {
            debug!("Disabled plugins: {:?}", disabled);
        }
        Ok(())
    }

    /// Destroy every plugin, last in order first
    pub async fn shutdown(&self) {
        let mut registry = self.registry.inner().write().await;
        let order: Vec<String> = registry.order().to_vec();
        for name in order.iter().rev() {
            if let Some(plugin) = registry.get_plugin_mut(name) {
                if let Err(e) = plugin.destroy().await {
                    log::warn!("Plugin '{}' failed to shut down cleanly: {}", name, e);
                }
            }
            publish_quietly(
                &self.notification_manager,
                Event::Plugin(PluginEvent::new(PluginEventType::Destroyed, name.clone())),
            )
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::get_api_version;
    use crate::notifications::api::new_notification_manager;
    use crate::plugin::tests::utils::{CallLog, MockPlugin};

    fn manager() -> PluginManager {
        PluginManager::with_notification_manager(get_api_version(), new_notification_manager())
    }

    #[test]
    fn test_api_compatibility() {
        let manager = PluginManager::with_notification_manager(20251016, new_notification_manager());
        assert!(manager.is_api_compatible(20250101));
        assert!(!manager.is_api_compatible(20240101));
        assert_eq!(manager.get_major_version(20251016), 2025);
    }

    #[test]
    fn test_incompatible_plugin_is_rejected() {
        let manager = manager();
        let mut info = MockPlugin::new("old").plugin_info();
        info.api_version = 20190101;
        assert!(matches!(
            manager.validate_plugin_compatibility(&info),
            Err(PluginError::VersionIncompatible { .. })
        ));
    }

    #[tokio::test]
    async fn test_setup_orders_and_initializes() {
        let manager = manager();
        let calls = CallLog::new();
        for plugin in [
            MockPlugin::new("steam").with_deps(&["appstream"]),
            MockPlugin::new("desktop").with_deps(&["steam"]).with_priority(10.0),
            MockPlugin::new("tagger").with_priority(1.2),
        ] {
            manager
                .register_plugin(Box::new(plugin.with_calls(&calls)))
                .await
                .unwrap();
        }

        manager.setup(HashMap::new(), None).await.unwrap();

        let registry = manager.registry().inner().read().await;
        assert_eq!(registry.order(), ["tagger", "steam", "desktop"].map(String::from));
        assert_eq!(calls.count("initialize"), 3);
    }

    #[tokio::test]
    async fn test_setup_fails_on_cycle() {
        let manager = manager();
        manager
            .register_plugin(Box::new(MockPlugin::new("a").with_deps(&["b"])))
            .await
            .unwrap();
        manager
            .register_plugin(Box::new(MockPlugin::new("b").with_deps(&["a"])))
            .await
            .unwrap();

        assert!(matches!(
            manager.setup(HashMap::new(), None).await,
            Err(PluginError::DependencyCycle { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_destroys_every_plugin() {
        let manager = manager();
        let calls = CallLog::new();
        manager
            .register_plugin(Box::new(MockPlugin::new("a").with_calls(&calls)))
            .await
            .unwrap();
        manager
            .register_plugin(Box::new(MockPlugin::new("b").with_calls(&calls)))
            .await
            .unwrap();
        manager.setup(HashMap::new(), None).await.unwrap();
        manager.shutdown().await;
        assert_eq!(calls.count("destroy"), 2);
    }

    #[tokio::test]
    async fn test_discover_respects_exclusions() {
        let manager = manager();
        let excluded = vec![
            "fedora-tagger".to_string(),
            "ubuntu-reviews".to_string(),
            "steam".to_string(),
        ];
        let count = manager.discover_plugins(&excluded).await.unwrap();
        assert_eq!(count, 2);
        assert!(manager.registry().has_plugin("packagekit").await);
        assert!(manager.registry().has_plugin("desktop").await);
        assert!(!manager.registry().has_plugin("steam").await);
    }
}
