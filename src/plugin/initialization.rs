//! Plugin initialization helper module
//!
//! Injects the notification manager and per-plugin configuration, then runs
//! `initialize` on each plugin in execution order. A plugin that fails is
//! disabled; setup as a whole carries on.

use std::collections::HashMap;

use crate::notifications::api::{
    publish_quietly, Event, PluginEvent, PluginEventType, SharedNotificationManager,
};
use crate::plugin::args::PluginConfig;
use crate::plugin::error::PluginError;
use crate::plugin::registry::PluginRegistry;

/// Helper struct for managing plugin initialization
pub struct PluginInitializer {
    notification_manager: SharedNotificationManager,
    /// `[plugins.<name>]` tables from the configuration file
    plugin_tables: HashMap<String, toml::Table>,
    use_colors: Option<bool>,
}

impl PluginInitializer {
    pub fn new(
        notification_manager: SharedNotificationManager,
        plugin_tables: HashMap<String, toml::Table>,
        use_colors: Option<bool>,
    ) -> Self {
        Self {
            notification_manager,
            plugin_tables,
            use_colors,
        }
    }

    fn config_for(&self, plugin_name: &str) -> PluginConfig {
        match self.plugin_tables.get(plugin_name) {
            Some(table) => PluginConfig::from_toml(self.use_colors, table),
            None => PluginConfig {
                use_colors: self.use_colors,
                ..PluginConfig::default()
            },
        }
    }

    /// Initialize every plugin named in `order`; returns the names that were disabled
    pub async fn initialize_plugins(
        &self,
        registry: &mut PluginRegistry,
        order: &[String],
    ) -> Vec<String> {
        let mut disabled = Vec::new();
        for plugin_name in order {
            if !self.initialize_plugin(registry, plugin_name).await {
                disabled.push(plugin_name.clone());
            }
        }
        disabled
    }

    /// Returns whether the plugin ended up enabled
    async fn initialize_plugin(&self, registry: &mut PluginRegistry, plugin_name: &str) -> bool {
        let config = self.config_for(plugin_name);

        let Some(plugin) = registry.get_plugin_mut(plugin_name) else {
            log::warn!("Cannot initialize unknown plugin '{}'", plugin_name);
            return false;
        };

        plugin.set_notification_manager(self.notification_manager.clone());

        let error = match plugin.initialize(&config).await {
            Ok(()) => {
                log::debug!("Plugin '{}' initialized", plugin_name);
                self.publish(PluginEvent::new(
                    PluginEventType::Initialized,
                    plugin_name.to_string(),
                ))
                .await;
                return true;
            }
            Err(error) => error,
        };

        match &error {
            PluginError::Disabled { reason, .. } => {
                log::info!("Plugin '{}' disabled itself: {}", plugin_name, reason)
            }
            _ => log::warn!("Plugin '{}' failed to initialize: {}", plugin_name, error),
        }
        if let Err(e) = registry.disable_plugin(plugin_name) {
            log::warn!("Could not disable plugin '{}': {}", plugin_name, e);
        }
        self.publish(PluginEvent::with_message(
            PluginEventType::Disabled,
            plugin_name.to_string(),
            error.to_string(),
        ))
        .await;
        false
    }

    async fn publish(&self, event: PluginEvent) {
        publish_quietly(&self.notification_manager, Event::Plugin(event)).await;
    }
}
