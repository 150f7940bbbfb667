//! Plugin Trait System
//!
//! Every data source implements [`Plugin`]. What a plugin can actually do is
//! expressed through the capability traits below; the plugin hands out a
//! reference to itself through the matching `as_*` accessor, and the registry
//! only dispatches an operation to plugins whose accessor returns `Some`.
//!
//! Capability methods take `&self`: plugins keep any mutable state behind
//! their own locks so that several operations can run concurrently.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::cancel::CancellationToken;
use crate::notifications::api::SharedNotificationManager;
use crate::plugin::args::PluginConfig;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::types::{AppAction, Capability, PluginInfo};
use crate::record::api::{App, AppList, RefineFlags};

/// Base plugin trait that all plugins must implement
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Get plugin metadata
    fn plugin_info(&self) -> PluginInfo;

    /// Check if this plugin is compatible with the given system API version
    ///
    /// The default returns false so plugins state their compatibility
    /// explicitly. Builtin plugins compare against
    /// `crate::core::version::get_api_version()`.
    fn is_compatible(&self, _system_api_version: u32) -> bool {
        false
    }

    /// Inject the notification manager; called before `initialize`
    fn set_notification_manager(&mut self, _manager: SharedNotificationManager) {}

    /// Prepare the plugin for use
    ///
    /// Returning an error disables the plugin for the rest of the process.
    /// Return [`PluginError::Disabled`] to opt out quietly.
    async fn initialize(&mut self, config: &PluginConfig) -> PluginResult<()>;

    /// Release resources; called once at shutdown
    async fn destroy(&mut self) -> PluginResult<()> {
        Ok(())
    }

    fn as_refiner(&self) -> Option<&dyn Refiner> {
        None
    }

    fn as_searcher(&self) -> Option<&dyn Searcher> {
        None
    }

    fn as_updates(&self) -> Option<&dyn UpdateProvider> {
        None
    }

    fn as_distro_upgrades(&self) -> Option<&dyn DistroUpgradeProvider> {
        None
    }

    fn as_refresher(&self) -> Option<&dyn Refresher> {
        None
    }

    fn as_file_resolver(&self) -> Option<&dyn FileResolver> {
        None
    }

    fn as_app_manager(&self) -> Option<&dyn AppManager> {
        None
    }

    /// Operation kinds this plugin serves, derived from the accessors
    fn capabilities(&self) -> Vec<Capability> {
        let mut caps = Vec::new();
        if self.as_refiner().is_some() {
            caps.push(Capability::Refine);
        }
        if self.as_searcher().is_some() {
            caps.push(Capability::Search);
        }
        if self.as_updates().is_some() {
            caps.push(Capability::GetUpdates);
        }
        if self.as_distro_upgrades().is_some() {
            caps.push(Capability::GetDistroUpgrades);
        }
        if self.as_refresher().is_some() {
            caps.push(Capability::Refresh);
        }
        if let Some(manager) = self.as_app_manager() {
            caps.extend(
                manager
                    .supported_actions()
                    .iter()
                    .map(|action| action.capability()),
            );
        }
        if self.as_file_resolver().is_some() {
            caps.push(Capability::FilenameToApp);
        }
        caps
    }
}

/// Fill in fields on existing records
#[async_trait]
pub trait Refiner: Send + Sync {
    /// Populate whatever `flags` asks for on `apps`
    ///
    /// Records the plugin knows nothing about are skipped, not an error.
    async fn refine(
        &self,
        apps: &[Arc<App>],
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()>;
}

#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(
        &self,
        query: &str,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<AppList>;
}

#[async_trait]
pub trait UpdateProvider: Send + Sync {
    /// Records with pending updates; must not change any system state
    async fn get_updates(
        &self,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<AppList>;
}

#[async_trait]
pub trait DistroUpgradeProvider: Send + Sync {
    async fn get_distro_upgrades(
        &self,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<AppList>;
}

#[async_trait]
pub trait Refresher: Send + Sync {
    /// Refresh cached metadata older than `cache_age`
    async fn refresh(
        &self,
        cache_age: Duration,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()>;
}

#[async_trait]
pub trait FileResolver: Send + Sync {
    /// Build a record for a local file; `NotFound` if the file is not ours
    async fn filename_to_app(
        &self,
        path: &Path,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<Arc<App>>;
}

/// Executes actions on records
///
/// Actions not listed in `supported_actions` are never routed here; the
/// defaults report them as unsupported.
#[async_trait]
pub trait AppManager: Send + Sync {
    fn manager_name(&self) -> &str;

    fn supported_actions(&self) -> &[AppAction];

    fn supports(&self, action: AppAction) -> bool {
        self.supported_actions().contains(&action)
    }

    async fn app_install(&self, _app: &Arc<App>, _cancel: &CancellationToken) -> PluginResult<()> {
        Err(self.unsupported(AppAction::Install))
    }

    async fn app_remove(&self, _app: &Arc<App>, _cancel: &CancellationToken) -> PluginResult<()> {
        Err(self.unsupported(AppAction::Remove))
    }

    async fn app_launch(&self, _app: &Arc<App>, _cancel: &CancellationToken) -> PluginResult<()> {
        Err(self.unsupported(AppAction::Launch))
    }

    /// Submit the record's current `rating`
    async fn app_set_rating(
        &self,
        _app: &Arc<App>,
        _cancel: &CancellationToken,
    ) -> PluginResult<()> {
        Err(self.unsupported(AppAction::SetRating))
    }

    fn unsupported(&self, action: AppAction) -> PluginError {
        PluginError::NotSupported {
            plugin_name: self.manager_name().to_string(),
            operation: action.to_string(),
        }
    }
}
