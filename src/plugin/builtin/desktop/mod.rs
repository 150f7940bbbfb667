//! Desktop Plugin
//!
//! Reads installed desktop entries to name and place installed applications
//! in the menu, and launches applications from their `Exec=` line.

mod entry;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;

use crate::builtin;
use crate::core::cancel::CancellationToken;
use crate::core::version::{api_major, get_api_version};
use crate::plugin::args::PluginConfig;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::{AppManager, Plugin, Refiner};
use crate::plugin::types::{AppAction, PluginInfo};
use crate::record::api::{App, AppState, IdKind, Quality, RefineFlags};

use entry::{menu_section, DesktopEntry};

pub const PLUGIN_NAME: &str = "desktop";

/// Records whose desktop file was found carry its path under this key
pub const DESKTOP_FILENAME_KEY: &str = "DataDir::desktop-filename";

const ACTIONS: &[AppAction] = &[AppAction::Launch];

builtin!(|| Box::new(DesktopPlugin::new()));

pub struct DesktopPlugin {
    app_dirs: Vec<PathBuf>,
}

impl Default for DesktopPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopPlugin {
    pub fn new() -> Self {
        Self {
            app_dirs: Self::default_dirs(),
        }
    }

    fn default_dirs() -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = dirs::data_dir()
            .map(|d| d.join("applications"))
            .into_iter()
            .collect();
        dirs.push(PathBuf::from("/usr/local/share/applications"));
        dirs.push(PathBuf::from("/usr/share/applications"));
        dirs
    }

    fn desktop_filename(id: &str) -> String {
        if id.ends_with(".desktop") {
            id.to_string()
        } else {
            format!("{}.desktop", id)
        }
    }

    /// First application directory holding `<id>.desktop`
    async fn find_desktop_file(&self, id: &str) -> Option<PathBuf> {
        let filename = Self::desktop_filename(id);
        for dir in &self.app_dirs {
            let path = dir.join(&filename);
            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                return Some(path);
            }
        }
        None
    }

    fn is_desktop_app(app: &App) -> bool {
        app.id_kind() == IdKind::Desktop
            || (app.id_kind() == IdKind::Unknown && app.id().ends_with(".desktop"))
    }

    async fn refine_app(&self, app: &App, flags: RefineFlags) {
        let Some(path) = self.find_desktop_file(app.id()).await else {
            return;
        };
        let entry = match DesktopEntry::load(&path).await {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Cannot read {}: {}", path.display(), e);
                return;
            }
        };

        app.set_metadata(DESKTOP_FILENAME_KEY, path.display().to_string());
        // an entry on disk means the application is installed
        if app.state() == AppState::Unknown {
            app.set_state(AppState::Installed);
        }
        if let Some(name) = entry.name() {
            app.set_name(Quality::Lowest, name);
        }
        if let Some(comment) = entry.comment() {
            app.set_summary(Quality::Lowest, comment);
        }
        let categories = entry.categories();
        for category in &categories {
            app.add_category(category.clone());
        }
        if flags.contains(RefineFlags::REQUIRE_MENU_PATH) && app.menu_path().is_empty() {
            if let Some(section) = categories.iter().find_map(|c| menu_section(c)) {
                app.set_menu_path(vec![section.to_string()]);
            }
        }
        if app.management_plugin().is_none() {
            app.set_management_plugin(PLUGIN_NAME);
        }
    }
}

#[async_trait]
impl Plugin for DesktopPlugin {
    fn plugin_info(&self) -> PluginInfo {
        PluginInfo::builtin(
            PLUGIN_NAME,
            0.0,
            &["steam"],
            "Installed desktop entries: names, menu placement and launching",
        )
    }

    fn is_compatible(&self, system_api_version: u32) -> bool {
        api_major(system_api_version) == api_major(get_api_version())
    }

    async fn initialize(&mut self, config: &PluginConfig) -> PluginResult<()> {
        let dirs = config.get_string_list("dirs");
        if !dirs.is_empty() {
            self.app_dirs = dirs.into_iter().map(PathBuf::from).collect();
        }
        log::debug!("Reading desktop entries from {:?}", self.app_dirs);
        Ok(())
    }

    fn as_refiner(&self) -> Option<&dyn Refiner> {
        Some(self)
    }

    fn as_app_manager(&self) -> Option<&dyn AppManager> {
        Some(self)
    }
}

#[async_trait]
impl Refiner for DesktopPlugin {
    async fn refine(
        &self,
        apps: &[Arc<App>],
        flags: RefineFlags,
        _cancel: &CancellationToken,
    ) -> PluginResult<()> {
        for app in apps.iter().filter(|app| Self::is_desktop_app(app)) {
            if app.state().is_installed() || app.metadata_item(DESKTOP_FILENAME_KEY).is_none() {
                self.refine_app(app, flags).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AppManager for DesktopPlugin {
    fn manager_name(&self) -> &str {
        PLUGIN_NAME
    }

    fn supported_actions(&self) -> &[AppAction] {
        ACTIONS
    }

    async fn app_launch(&self, app: &Arc<App>, _cancel: &CancellationToken) -> PluginResult<()> {
        let Some(path) = self.find_desktop_file(app.id()).await else {
            return Err(PluginError::not_found(format!(
                "no such desktop file: {}",
                app.id()
            )));
        };
        let entry = DesktopEntry::load(&path).await.map_err(|e| PluginError::ExecutionError {
            plugin_name: PLUGIN_NAME.to_string(),
            operation: "launch".to_string(),
            cause: format!("{}: {}", path.display(), e),
        })?;
        let Some(argv) = entry.command() else {
            return Err(PluginError::ExecutionError {
                plugin_name: PLUGIN_NAME.to_string(),
                operation: "launch".to_string(),
                cause: format!("{} has no Exec line", path.display()),
            });
        };

        log::info!("Launching {}: {:?}", app.id(), argv);
        tokio::process::Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PluginError::ExecutionError {
                plugin_name: PLUGIN_NAME.to_string(),
                operation: "launch".to_string(),
                cause: format!("cannot run {}: {}", argv[0], e),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plugin_with(dir: &TempDir) -> DesktopPlugin {
        DesktopPlugin {
            app_dirs: vec![dir.path().to_path_buf()],
        }
    }

    fn write_entry(dir: &TempDir, id: &str, contents: &str) {
        std::fs::write(dir.path().join(id), contents).unwrap();
    }

    #[tokio::test]
    async fn test_config_overrides_dirs() {
        let mut plugin = DesktopPlugin::new();
        let config = PluginConfig::default().with_value("dirs", "/opt/apps");
        plugin.initialize(&config).await.unwrap();
        assert_eq!(plugin.app_dirs, vec![PathBuf::from("/opt/apps")]);
    }

    #[tokio::test]
    async fn test_refine_installed_app_from_entry() {
        let dir = TempDir::new().unwrap();
        write_entry(
            &dir,
            "org.example.Editor.desktop",
            "[Desktop Entry]\nName=Editor\nComment=Edits text\nExec=editor %F\nCategories=Utility;TextEditor;\n",
        );
        let plugin = plugin_with(&dir);
        let app = App::new("org.example.Editor.desktop");
        app.set_state(AppState::Installed);
        app.set_name(Quality::Normal, "Text Editor");

        plugin
            .refine(&[app.clone()], RefineFlags::REQUIRE_MENU_PATH, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(app.name().as_deref(), Some("Text Editor"));
        assert_eq!(app.summary().as_deref(), Some("Edits text"));
        assert_eq!(app.menu_path(), vec!["Accessories".to_string()]);
        assert!(app.has_category("TextEditor"));
        assert_eq!(app.management_plugin().as_deref(), Some(PLUGIN_NAME));
        assert!(app.metadata_item(DESKTOP_FILENAME_KEY).is_some());
    }

    #[tokio::test]
    async fn test_refine_marks_unknown_app_installed() {
        let dir = TempDir::new().unwrap();
        write_entry(&dir, "org.example.Maps.desktop", "[Desktop Entry]\nName=Maps\n");
        let plugin = plugin_with(&dir);
        let app = App::new("org.example.Maps.desktop");

        plugin
            .refine(&[app.clone()], RefineFlags::DEFAULT, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(app.state(), AppState::Installed);
        assert_eq!(app.name().as_deref(), Some("Maps"));

        let missing = App::new("org.example.Absent.desktop");
        plugin
            .refine(&[missing.clone()], RefineFlags::DEFAULT, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(missing.state(), AppState::Unknown);
    }

    #[tokio::test]
    async fn test_refine_ignores_non_desktop_records() {
        let dir = TempDir::new().unwrap();
        write_entry(&dir, "gimp.desktop", "[Desktop Entry]\nName=GIMP\n");
        let plugin = plugin_with(&dir);
        let package = App::new("gimp");
        package.set_id_kind(IdKind::WebApp);
        plugin
            .refine(&[package.clone()], RefineFlags::DEFAULT, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(package.name(), None);
    }

    #[tokio::test]
    async fn test_launch_missing_desktop_file() {
        let dir = TempDir::new().unwrap();
        let plugin = plugin_with(&dir);
        let app = App::new("org.example.Missing.desktop");
        let result = plugin.app_launch(&app, &CancellationToken::new()).await;
        match result {
            Err(PluginError::NotFound { message }) => {
                assert!(message.starts_with("no such desktop file"))
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_launch_spawns_exec_line() {
        let dir = TempDir::new().unwrap();
        write_entry(
            &dir,
            "org.example.True.desktop",
            "[Desktop Entry]\nName=True\nExec=true %U\n",
        );
        let plugin = plugin_with(&dir);
        let app = App::new("org.example.True");
        assert!(plugin.app_launch(&app, &CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_launch_without_exec_fails() {
        let dir = TempDir::new().unwrap();
        write_entry(&dir, "org.example.NoExec.desktop", "[Desktop Entry]\nName=NoExec\n");
        let plugin = plugin_with(&dir);
        let app = App::new("org.example.NoExec.desktop");
        assert!(matches!(
            plugin.app_launch(&app, &CancellationToken::new()).await,
            Err(PluginError::ExecutionError { .. })
        ));
    }
}
