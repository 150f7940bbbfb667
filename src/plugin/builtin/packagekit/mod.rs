//! PackageKit Plugin
//!
//! Package-manager data source. Resolves record sources to packages, fills in
//! package details and update information, searches package names, lists
//! updates and installs or removes packages through a [`PackageBackend`].

pub mod backend;
mod convert;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::builtin;
use crate::core::cancel::CancellationToken;
use crate::core::version::{api_major, get_api_version};
use crate::notifications::api::{
    publish_quietly, Event, PluginEvent, PluginEventType, SharedNotificationManager,
};
use crate::plugin::args::PluginConfig;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::{
    AppManager, DistroUpgradeProvider, FileResolver, Plugin, Refiner, Refresher, Searcher,
    UpdateProvider,
};
use crate::plugin::types::{AppAction, PluginInfo};
use crate::record::api::{
    App, AppKind, AppList, AppState, IdKind, Quality, RefineFlags, UrlKind, SIZE_UNKNOWN,
};

use backend::{split_package_id, JsonPackageBackend, PackageBackend, PackageInfo};
use convert::{
    apply_details, apply_resolved, apply_update_detail, format_description, packages_to_apps,
    search_sort_key, set_metadata_from_package, LOCAL_FILENAME_KEY,
};

pub const PLUGIN_NAME: &str = "packagekit";

/// Metadata key set by the desktop data source on installed applications
const DESKTOP_FILENAME_KEY: &str = "DataDir::desktop-filename";

const ACTIONS: &[AppAction] = &[AppAction::Install, AppAction::Remove];

builtin!(|| Box::new(PackageKitPlugin::new()));

pub struct PackageKitPlugin {
    backend: Option<Arc<dyn PackageBackend>>,
    notification_manager: Option<SharedNotificationManager>,
}

impl Default for PackageKitPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageKitPlugin {
    pub fn new() -> Self {
        Self {
            backend: None,
            notification_manager: None,
        }
    }

    /// Use `backend` instead of opening the configured database
    pub fn with_backend(backend: Arc<dyn PackageBackend>) -> Self {
        Self {
            backend: Some(backend),
            notification_manager: None,
        }
    }

    pub fn default_database_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("softcenter")
            .join("packages.json")
    }

    fn backend(&self) -> PluginResult<&Arc<dyn PackageBackend>> {
        self.backend.as_ref().ok_or_else(|| PluginError::SetupFailed {
            plugin_name: PLUGIN_NAME.to_string(),
            cause: "no package backend".to_string(),
        })
    }

    fn check_cancelled(cancel: &CancellationToken) -> PluginResult<()> {
        if cancel.is_cancelled() {
            Err(PluginError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn needs_resolve(app: &App, flags: RefineFlags) -> bool {
        if app.id_kind() == IdKind::WebApp || app.sources().is_empty() {
            return false;
        }
        if app.metadata_item(LOCAL_FILENAME_KEY).is_some() {
            return false;
        }
        if app.state() == AppState::Unknown {
            return true;
        }
        let wants_package_id = flags.intersects(
            RefineFlags::REQUIRE_VERSION
                | RefineFlags::REQUIRE_LICENCE
                | RefineFlags::REQUIRE_URL
                | RefineFlags::REQUIRE_SIZE
                | RefineFlags::REQUIRE_DESCRIPTION
                | RefineFlags::REQUIRE_UPDATE_DETAILS,
        );
        (wants_package_id && app.source_id_default().is_none())
            || (flags.contains(RefineFlags::REQUIRE_ORIGIN) && app.origin().is_none())
            || (flags.contains(RefineFlags::REQUIRE_VERSION) && app.version().is_none())
    }

    fn needs_details(app: &App) -> bool {
        app.licence().is_none()
            || app.url(UrlKind::Homepage).is_none()
            || app.size() == SIZE_UNKNOWN
            || app.description().is_none()
    }

    async fn resolve_packages(&self, apps: &[&Arc<App>]) -> PluginResult<()> {
        let backend = self.backend()?;
        let mut names: Vec<String> = apps.iter().flat_map(|app| app.sources()).collect();
        names.sort();
        names.dedup();
        let packages = backend.resolve(&names).await?;
        let repos = backend.repo_list().await?;
        for app in apps {
            apply_resolved(app, &packages, &repos);
        }
        Ok(())
    }

    /// Find the package owning an installed desktop file
    async fn refine_from_desktop(&self, app: &App, filename: &str) -> PluginResult<()> {
        let backend = self.backend()?;
        let packages = backend.search_files(filename).await?;
        match packages.as_slice() {
            [package] => {
                let repos = backend.repo_list().await?;
                set_metadata_from_package(app, package, &repos);
            }
            _ => log::warn!(
                "Failed to find one package for {}, {} [{}]",
                app.id(),
                filename,
                packages.len()
            ),
        }
        Ok(())
    }

    async fn refine_update_details(&self, apps: &[&Arc<App>]) -> PluginResult<()> {
        let ids: Vec<String> = apps.iter().filter_map(|a| a.source_id_default()).collect();
        let details = self.backend()?.update_details(&ids).await?;
        for app in apps {
            apply_update_detail(app, &details);
        }
        Ok(())
    }

    async fn refine_details(&self, apps: &[&Arc<App>]) -> PluginResult<()> {
        let ids: Vec<String> = apps.iter().flat_map(|a| a.source_ids()).collect();
        let details = self.backend()?.details(&ids).await?;
        for app in apps {
            apply_details(app, &details);
        }
        Ok(())
    }

    async fn publish(&self, event_type: PluginEventType, message: &str) {
        if let Some(manager) = &self.notification_manager {
            publish_quietly(
                manager,
                Event::Plugin(PluginEvent::with_message(
                    event_type,
                    PLUGIN_NAME.to_string(),
                    message.to_string(),
                )),
            )
            .await;
        }
    }
}

#[async_trait]
impl Plugin for PackageKitPlugin {
    fn plugin_info(&self) -> PluginInfo {
        PluginInfo::builtin(
            PLUGIN_NAME,
            0.0,
            &["appstream"],
            "Installed and available packages from the system package manager",
        )
    }

    fn is_compatible(&self, system_api_version: u32) -> bool {
        api_major(system_api_version) == api_major(get_api_version())
    }

    fn set_notification_manager(&mut self, manager: SharedNotificationManager) {
        self.notification_manager = Some(manager);
    }

    async fn initialize(&mut self, config: &PluginConfig) -> PluginResult<()> {
        if self.backend.is_some() {
            return Ok(());
        }
        let path = config.get_path("database", Self::default_database_path());
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(PluginError::Disabled {
                plugin_name: PLUGIN_NAME.to_string(),
                reason: format!("no package database at {}", path.display()),
            });
        }
        let backend = JsonPackageBackend::open(&path).await.map_err(|e| PluginError::SetupFailed {
            plugin_name: PLUGIN_NAME.to_string(),
            cause: e.to_string(),
        })?;
        self.backend = Some(Arc::new(backend));
        Ok(())
    }

    async fn destroy(&mut self) -> PluginResult<()> {
        self.backend = None;
        Ok(())
    }

    fn as_refiner(&self) -> Option<&dyn Refiner> {
        Some(self)
    }

    fn as_searcher(&self) -> Option<&dyn Searcher> {
        Some(self)
    }

    fn as_updates(&self) -> Option<&dyn UpdateProvider> {
        Some(self)
    }

    fn as_distro_upgrades(&self) -> Option<&dyn DistroUpgradeProvider> {
        Some(self)
    }

    fn as_refresher(&self) -> Option<&dyn Refresher> {
        Some(self)
    }

    fn as_file_resolver(&self) -> Option<&dyn FileResolver> {
        Some(self)
    }

    fn as_app_manager(&self) -> Option<&dyn AppManager> {
        Some(self)
    }
}

#[async_trait]
impl Refiner for PackageKitPlugin {
    async fn refine(
        &self,
        apps: &[Arc<App>],
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        let to_resolve: Vec<&Arc<App>> = apps
            .iter()
            .filter(|app| Self::needs_resolve(app, flags))
            .collect();
        if !to_resolve.is_empty() {
            self.resolve_packages(&to_resolve).await?;
        }

        if flags.contains(RefineFlags::REQUIRE_SETUP_ACTION) {
            for app in apps {
                Self::check_cancelled(cancel)?;
                if app.source_id_default().is_some() {
                    continue;
                }
                if let Some(filename) = app.metadata_item(DESKTOP_FILENAME_KEY) {
                    self.refine_from_desktop(app, &filename).await?;
                }
            }
        }

        Self::check_cancelled(cancel)?;
        let updatable: Vec<&Arc<App>> = apps
            .iter()
            .filter(|app| app.state() == AppState::Updatable)
            .filter(|app| {
                (flags.contains(RefineFlags::REQUIRE_UPDATE_DETAILS)
                    && app.update_details().is_none())
                    || flags.contains(RefineFlags::REQUIRE_UPDATE_SEVERITY)
            })
            .collect();
        if !updatable.is_empty() {
            self.refine_update_details(&updatable).await?;
        }

        Self::check_cancelled(cancel)?;
        let wants_details = flags.intersects(
            RefineFlags::REQUIRE_LICENCE
                | RefineFlags::REQUIRE_URL
                | RefineFlags::REQUIRE_SIZE
                | RefineFlags::REQUIRE_DESCRIPTION,
        );
        if wants_details {
            let needing: Vec<&Arc<App>> = apps
                .iter()
                .filter(|app| app.id_kind() != IdKind::WebApp)
                .filter(|app| app.source_id_default().is_some())
                .filter(|app| Self::needs_details(app))
                .collect();
            if !needing.is_empty() {
                self.refine_details(&needing).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Searcher for PackageKitPlugin {
    async fn search(
        &self,
        query: &str,
        _flags: RefineFlags,
        _cancel: &CancellationToken,
    ) -> PluginResult<AppList> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let backend = self.backend()?;
        let packages = backend.search_names(&terms).await?;
        let repos = backend.repo_list().await?;
        let keys: Vec<(String, String)> = packages
            .iter()
            .map(|p| (p.name.clone(), search_sort_key(p, &terms)))
            .collect();

        let apps = packages_to_apps(packages, &repos);
        for app in &apps {
            if let Some((_, key)) = keys.iter().find(|(name, _)| name == app.id()) {
                app.set_search_sort_key(key.clone());
            }
        }
        log::debug!("Search for '{}' matched {} packages", query, apps.len());
        Ok(apps)
    }
}

#[async_trait]
impl UpdateProvider for PackageKitPlugin {
    async fn get_updates(
        &self,
        _flags: RefineFlags,
        _cancel: &CancellationToken,
    ) -> PluginResult<AppList> {
        let backend = self.backend()?;
        let updates = backend.get_updates().await?;
        let repos = backend.repo_list().await?;
        let installed = backend
            .resolve(&updates.iter().map(|u| u.name.clone()).collect::<Vec<_>>())
            .await?;

        let mut apps = Vec::with_capacity(updates.len());
        for update in updates {
            let app = App::with_kind(update.name.clone(), AppKind::Package);
            if let Some(current) = installed
                .iter()
                .find(|p| p.name == update.name && p.info == PackageInfo::Installed)
            {
                app.set_version(current.version.clone());
            }
            set_metadata_from_package(&app, &update, &repos);
            app.set_update_version(update.version.clone());
            app.set_state(AppState::Updatable);
            apps.push(app);
        }
        Ok(apps)
    }
}

#[async_trait]
impl DistroUpgradeProvider for PackageKitPlugin {
    async fn get_distro_upgrades(
        &self,
        _flags: RefineFlags,
        _cancel: &CancellationToken,
    ) -> PluginResult<AppList> {
        let upgrades = self.backend()?.get_distro_upgrades().await?;
        Ok(upgrades
            .into_iter()
            .map(|upgrade| {
                let app = App::with_kind(upgrade.id.clone(), AppKind::OsUpdate);
                app.set_name(Quality::Lowest, upgrade.name);
                if let Some(summary) = upgrade.summary {
                    app.set_summary(Quality::Lowest, summary);
                }
                if let Some(description) = upgrade.description {
                    app.set_description(Quality::Lowest, description);
                }
                app.set_version(upgrade.version);
                if upgrade.size > 0 {
                    app.set_size(upgrade.size);
                }
                app.set_management_plugin(PLUGIN_NAME);
                app.set_state(AppState::Available);
                app
            })
            .collect())
    }
}

#[async_trait]
impl Refresher for PackageKitPlugin {
    async fn refresh(
        &self,
        cache_age: Duration,
        _flags: RefineFlags,
        _cancel: &CancellationToken,
    ) -> PluginResult<()> {
        if self.backend()?.refresh(cache_age).await? {
            log::info!("Package metadata changed");
            self.publish(PluginEventType::CacheInvalidated, "package metadata changed")
                .await;
        }
        Ok(())
    }
}

#[async_trait]
impl FileResolver for PackageKitPlugin {
    async fn filename_to_app(
        &self,
        path: &Path,
        _flags: RefineFlags,
        _cancel: &CancellationToken,
    ) -> PluginResult<Arc<App>> {
        let backend = self.backend()?;
        let Some(package) = backend.local_file(path).await? else {
            return Err(PluginError::not_found(format!(
                "{} is not a known package file",
                path.display()
            )));
        };

        let app = App::with_kind(package.name.clone(), AppKind::Package);
        app.set_metadata(LOCAL_FILENAME_KEY, path.display().to_string());
        set_metadata_from_package(&app, &package, &backend.repo_list().await?);
        if let Some(license) = &package.license {
            app.set_licence(Quality::Lowest, license.clone());
        }
        if let Some(description) = &package.description {
            app.set_description(Quality::Lowest, format_description(description));
        }
        if package.size > 0 {
            app.set_size(package.size);
        }
        app.set_state(AppState::AvailableLocal);
        Ok(app)
    }
}

#[async_trait]
impl AppManager for PackageKitPlugin {
    fn manager_name(&self) -> &str {
        PLUGIN_NAME
    }

    fn supported_actions(&self) -> &[AppAction] {
        ACTIONS
    }

    async fn app_install(&self, app: &Arc<App>, _cancel: &CancellationToken) -> PluginResult<()> {
        let ids: Vec<String> = app
            .source_ids()
            .into_iter()
            .filter(|id| !id.contains(";installed:"))
            .collect();
        if ids.is_empty() {
            return Err(PluginError::not_found(format!(
                "no packages to install for {}",
                app.id()
            )));
        }
        app.set_progress(0);
        self.backend()?.install(&ids).await?;
        app.set_progress(100);
        Ok(())
    }

    async fn app_remove(&self, app: &Arc<App>, _cancel: &CancellationToken) -> PluginResult<()> {
        let ids: Vec<String> = app
            .source_ids()
            .into_iter()
            .filter(|id| id.contains(";installed:"))
            .collect();
        if ids.is_empty() {
            return Err(PluginError::not_found(format!(
                "no installed packages for {}",
                app.id()
            )));
        }
        let backend = self.backend()?;
        app.set_progress(0);
        backend.remove(&ids).await?;
        app.set_progress(100);

        // Without a repo still carrying the package it cannot be reinstalled
        let names: Vec<String> = ids
            .iter()
            .filter_map(|id| split_package_id(id).map(|(name, ..)| name.to_string()))
            .collect();
        let remaining = backend.resolve(&names).await?;
        if !remaining.iter().any(|p| p.info == PackageInfo::Available) {
            app.set_state(AppState::Unavailable);
        }
        Ok(())
    }
}
