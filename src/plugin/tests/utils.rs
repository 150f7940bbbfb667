//! Plugin Test Utilities
//!
//! A configurable mock plugin used by the registry, manager, refine and
//! loader tests. Every call is recorded in a [`CallLog`] that the test keeps a
//! handle to after the plugin has been moved into a registry.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::cancel::CancellationToken;
use crate::plugin::args::PluginConfig;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::{
    AppManager, FileResolver, Plugin, Refiner, Refresher, Searcher, UpdateProvider,
};
use crate::plugin::types::{AppAction, PluginInfo};
use crate::record::api::{App, AppList, RefineFlags};

pub type RefineFn = Arc<dyn Fn(&[Arc<App>], RefineFlags) -> PluginResult<()> + Send + Sync>;
pub type SearchFn = Arc<dyn Fn(&str) -> PluginResult<AppList> + Send + Sync>;
pub type UpdatesFn = Arc<dyn Fn() -> PluginResult<AppList> + Send + Sync>;
pub type FileFn = Arc<dyn Fn(&Path) -> PluginResult<Arc<App>> + Send + Sync>;

/// Shared record of the calls made on mock plugins
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Number of entries equal to `op` or starting with `op:`
    pub fn count(&self, op: &str) -> usize {
        let prefix = format!("{}:", op);
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == op || e.starts_with(&prefix))
            .count()
    }
}

/// Configurable mock plugin for comprehensive testing
pub struct MockPlugin {
    info: PluginInfo,
    calls: CallLog,
    refine: Option<RefineFn>,
    search: Option<SearchFn>,
    updates: Option<UpdatesFn>,
    refresh: bool,
    files: Option<FileFn>,
    actions: Vec<AppAction>,
    action_error: Option<PluginError>,
    init_error: Option<PluginError>,
    delay: Duration,
}

impl MockPlugin {
    pub fn new(name: &str) -> Self {
        Self {
            info: PluginInfo::builtin(name, 0.0, &[], "Mock plugin for testing"),
            calls: CallLog::new(),
            refine: None,
            search: None,
            updates: None,
            refresh: false,
            files: None,
            actions: Vec::new(),
            action_error: None,
            init_error: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.info.priority = priority;
        self
    }

    pub fn with_deps(mut self, deps: &[&str]) -> Self {
        self.info.deps = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_calls(mut self, calls: &CallLog) -> Self {
        self.calls = calls.clone();
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    /// Sleep this long in every capability call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_init(mut self, error: PluginError) -> Self {
        self.init_error = Some(error);
        self
    }

    pub fn refining(self) -> Self {
        self.refining_with(|_, _| Ok(()))
    }

    pub fn refining_with(
        mut self,
        f: impl Fn(&[Arc<App>], RefineFlags) -> PluginResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.refine = Some(Arc::new(f));
        self
    }

    pub fn searching(self) -> Self {
        self.searching_with(|_| Ok(Vec::new()))
    }

    pub fn searching_with(
        mut self,
        f: impl Fn(&str) -> PluginResult<AppList> + Send + Sync + 'static,
    ) -> Self {
        self.search = Some(Arc::new(f));
        self
    }

    pub fn updating_with(
        mut self,
        f: impl Fn() -> PluginResult<AppList> + Send + Sync + 'static,
    ) -> Self {
        self.updates = Some(Arc::new(f));
        self
    }

    pub fn refreshing(mut self) -> Self {
        self.refresh = true;
        self
    }

    pub fn resolving_files_with(
        mut self,
        f: impl Fn(&Path) -> PluginResult<Arc<App>> + Send + Sync + 'static,
    ) -> Self {
        self.files = Some(Arc::new(f));
        self
    }

    pub fn managing(mut self, actions: &[AppAction]) -> Self {
        self.actions = actions.to_vec();
        self
    }

    pub fn failing_actions(mut self, error: PluginError) -> Self {
        self.action_error = Some(error);
        self
    }

    async fn pause(&self, cancel: &CancellationToken) -> PluginResult<()> {
        if self.delay.is_zero() {
            return Ok(());
        }
        cancel
            .run_until_cancelled(tokio::time::sleep(self.delay))
            .await
            .ok_or(PluginError::Cancelled)
    }

    async fn act(&self, action: AppAction, app: &Arc<App>, cancel: &CancellationToken) -> PluginResult<()> {
        self.calls.record(format!("{}:{}", action, app.id()));
        self.pause(cancel).await?;
        match &self.action_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn plugin_info(&self) -> PluginInfo {
        self.info.clone()
    }

    fn is_compatible(&self, _system_api_version: u32) -> bool {
        true
    }

    async fn initialize(&mut self, _config: &PluginConfig) -> PluginResult<()> {
        self.calls.record("initialize");
        match &self.init_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn destroy(&mut self) -> PluginResult<()> {
        self.calls.record("destroy");
        Ok(())
    }

    fn as_refiner(&self) -> Option<&dyn Refiner> {
        self.refine.as_ref().map(|_| self as &dyn Refiner)
    }

    fn as_searcher(&self) -> Option<&dyn Searcher> {
        self.search.as_ref().map(|_| self as &dyn Searcher)
    }

    fn as_updates(&self) -> Option<&dyn UpdateProvider> {
        self.updates.as_ref().map(|_| self as &dyn UpdateProvider)
    }

    fn as_refresher(&self) -> Option<&dyn Refresher> {
        self.refresh.then_some(self as &dyn Refresher)
    }

    fn as_file_resolver(&self) -> Option<&dyn FileResolver> {
        self.files.as_ref().map(|_| self as &dyn FileResolver)
    }

    fn as_app_manager(&self) -> Option<&dyn AppManager> {
        (!self.actions.is_empty()).then_some(self as &dyn AppManager)
    }
}

#[async_trait]
impl Refiner for MockPlugin {
    async fn refine(
        &self,
        apps: &[Arc<App>],
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        self.calls.record(format!("refine:{}", self.info.name));
        self.pause(cancel).await?;
        match &self.refine {
            Some(f) => f(apps, flags),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Searcher for MockPlugin {
    async fn search(
        &self,
        query: &str,
        _flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<AppList> {
        self.calls.record(format!("search:{}", query));
        self.pause(cancel).await?;
        match &self.search {
            Some(f) => f(query),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl UpdateProvider for MockPlugin {
    async fn get_updates(
        &self,
        _flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<AppList> {
        self.calls.record("get-updates");
        self.pause(cancel).await?;
        match &self.updates {
            Some(f) => f(),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Refresher for MockPlugin {
    async fn refresh(
        &self,
        cache_age: Duration,
        _flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        self.calls.record(format!("refresh:{}", cache_age.as_secs()));
        self.pause(cancel).await
    }
}

#[async_trait]
impl FileResolver for MockPlugin {
    async fn filename_to_app(
        &self,
        path: &Path,
        _flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<Arc<App>> {
        self.calls
            .record(format!("filename-to-app:{}", self.info.name));
        self.pause(cancel).await?;
        match &self.files {
            Some(f) => f(path),
            None => Err(PluginError::not_found("no resolver")),
        }
    }
}

#[async_trait]
impl AppManager for MockPlugin {
    fn manager_name(&self) -> &str {
        &self.info.name
    }

    fn supported_actions(&self) -> &[AppAction] {
        &self.actions
    }

    async fn app_install(&self, app: &Arc<App>, cancel: &CancellationToken) -> PluginResult<()> {
        self.act(AppAction::Install, app, cancel).await
    }

    async fn app_remove(&self, app: &Arc<App>, cancel: &CancellationToken) -> PluginResult<()> {
        self.act(AppAction::Remove, app, cancel).await
    }

    async fn app_launch(&self, app: &Arc<App>, cancel: &CancellationToken) -> PluginResult<()> {
        self.act(AppAction::Launch, app, cancel).await
    }

    async fn app_set_rating(
        &self,
        app: &Arc<App>,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        self.act(AppAction::SetRating, app, cancel).await
    }
}
