//! Steam Plugin
//!
//! Games described by appstream data carry a Steam game id. Their records are
//! made available and handed to the Steam client for installing, removing and
//! running through `steam://` URLs.

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
use crate::record::api::{App, AppState, RefineFlags};

pub const PLUGIN_NAME: &str = "steam";

pub const GAME_ID_KEY: &str = "X-Steam-GameID";
pub const SIZE_KEY: &str = "X-Steam-Size";

const DEFAULT_COMMAND: &str = "steam";

const ACTIONS: &[AppAction] = &[AppAction::Install, AppAction::Remove, AppAction::Launch];

builtin!(|| Box::new(SteamPlugin::new()));

pub struct SteamPlugin {
    command: String,
}

impl Default for SteamPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl SteamPlugin {
    pub fn new() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
        }
    }

    fn game_id(app: &App) -> PluginResult<String> {
        app.metadata_item(GAME_ID_KEY).ok_or_else(|| {
            PluginError::not_found(format!("{} has no Steam game id", app.id()))
        })
    }

    /// Hand `steam://<verb>/<id>` to the Steam client without waiting for it
    fn open_url(&self, verb: &str, app: &App) -> PluginResult<()> {
        let url = format!("steam://{}/{}", verb, Self::game_id(app)?);
        log::info!("Running {} {}", self.command, url);
        tokio::process::Command::new(&self.command)
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| PluginError::ExecutionError {
                plugin_name: PLUGIN_NAME.to_string(),
                operation: verb.to_string(),
                cause: format!("cannot run {}: {}", self.command, e),
            })
    }
}

#[async_trait]
impl Plugin for SteamPlugin {
    fn plugin_info(&self) -> PluginInfo {
        PluginInfo::builtin(
            PLUGIN_NAME,
            0.0,
            &["appstream"],
            "Steam games: availability and actions through the Steam client",
        )
    }

    fn is_compatible(&self, system_api_version: u32) -> bool {
        api_major(system_api_version) == api_major(get_api_version())
    }

    async fn initialize(&mut self, config: &PluginConfig) -> PluginResult<()> {
        self.command = config.get_string("command", DEFAULT_COMMAND);
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
impl Refiner for SteamPlugin {
    async fn refine(
        &self,
        apps: &[Arc<App>],
        _flags: RefineFlags,
        _cancel: &CancellationToken,
    ) -> PluginResult<()> {
        for app in apps {
            if app.metadata_item(GAME_ID_KEY).is_none() {
                continue;
            }
            if let Some(size) = app
                .metadata_item(SIZE_KEY)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|size| *size > 0)
            {
                app.set_size(size);
            }
            if app.state() == AppState::Unknown {
                app.set_state(AppState::Available);
            }
            app.set_management_plugin(PLUGIN_NAME);
        }
        Ok(())
    }
}

#[async_trait]
impl AppManager for SteamPlugin {
    fn manager_name(&self) -> &str {
        PLUGIN_NAME
    }

    fn supported_actions(&self) -> &[AppAction] {
        ACTIONS
    }

    async fn app_install(&self, app: &Arc<App>, _cancel: &CancellationToken) -> PluginResult<()> {
        self.open_url("install", app)
    }

    async fn app_remove(&self, app: &Arc<App>, _cancel: &CancellationToken) -> PluginResult<()> {
        self.open_url("uninstall", app)
    }

    async fn app_launch(&self, app: &Arc<App>, _cancel: &CancellationToken) -> PluginResult<()> {
        self.open_url("run", app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::api::SIZE_UNKNOWN;

    fn game(id: &str, game_id: &str) -> Arc<App> {
        let app = App::new(id);
        app.set_metadata(GAME_ID_KEY, game_id);
        app
    }

    #[tokio::test]
    async fn test_refine_marks_games_available() {
        let plugin = SteamPlugin::new();
        let portal = game("com.valvesoftware.Portal", "400");
        portal.set_metadata(SIZE_KEY, "4294967296");
        let other = App::new("org.example.Other");

        plugin
            .refine(
                &[portal.clone(), other.clone()],
                RefineFlags::DEFAULT,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(portal.state(), AppState::Available);
        assert_eq!(portal.size(), 4294967296);
        assert_eq!(portal.management_plugin().as_deref(), Some(PLUGIN_NAME));
        assert_eq!(other.state(), AppState::Unknown);
        assert_eq!(other.management_plugin(), None);
    }

    #[tokio::test]
    async fn test_refine_keeps_known_state_and_ignores_bad_size() {
        let plugin = SteamPlugin::new();
        let installed = game("com.valvesoftware.HalfLife", "70");
        installed.set_state(AppState::Installed);
        installed.set_metadata(SIZE_KEY, "0");

        plugin
            .refine(&[installed.clone()], RefineFlags::DEFAULT, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(installed.state(), AppState::Installed);
        assert_eq!(installed.size(), SIZE_UNKNOWN);
    }

    #[tokio::test]
    async fn test_actions_run_configured_command() {
        let mut plugin = SteamPlugin::new();
        plugin
            .initialize(&PluginConfig::default().with_value("command", "true"))
            .await
            .unwrap();
        let portal = game("com.valvesoftware.Portal", "400");
        let cancel = CancellationToken::new();

        assert!(plugin.app_install(&portal, &cancel).await.is_ok());
        assert!(plugin.app_remove(&portal, &cancel).await.is_ok());
        assert!(plugin.app_launch(&portal, &cancel).await.is_ok());
    }

    #[tokio::test]
    async fn test_action_without_game_id() {
        let plugin = SteamPlugin::new();
        let app = App::new("org.example.NotAGame");
        assert!(matches!(
            plugin.app_launch(&app, &CancellationToken::new()).await,
            Err(PluginError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_command_is_an_execution_error() {
        let mut plugin = SteamPlugin::new();
        plugin
            .initialize(&PluginConfig::default().with_value("command", "/nonexistent/steam"))
            .await
            .unwrap();
        let portal = game("com.valvesoftware.Portal", "400");
        assert!(matches!(
            plugin.app_install(&portal, &CancellationToken::new()).await,
            Err(PluginError::ExecutionError { .. })
        ));
    }
}
