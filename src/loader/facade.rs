//! Plugin Loader
//!
//! The single entry point callers use. Operations fan out to the plugins
//! serving them, fold the results into the shared arena of canonical records
//! and refine them for the fields the caller asked for.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::core::cancel::CancellationToken;
use crate::dedup::api::DedupEngine;
use crate::loader::fanout::{fan_out, PluginCall};
use crate::loader::search::SearchSlot;
use crate::notifications::api::{
    publish_quietly, Event, EventFilter, EventReceiver, LoaderEvent, LoaderEventType,
    PluginEventType, SharedNotificationManager,
};
use crate::plugin::api::{
    log_plugin_error, AppAction, AppManager, PluginError, PluginManager, PluginResult,
    PluginSummary, SharedPluginRegistry,
};
use crate::record::api::{App, AppList, AppState, RefineFlags};
use crate::refine::api::RefineOrchestrator;

const SUBSCRIBER_ID: &str = "plugin-loader";

/// Shortest query, after trimming, that reaches the plugins
pub const MIN_QUERY_LENGTH: usize = 2;

pub struct PluginLoader {
    manager: PluginManager,
    registry: SharedPluginRegistry,
    pub(super) dedup: Arc<DedupEngine>,
    refiner: RefineOrchestrator,
    notifications: SharedNotificationManager,
    search: SearchSlot,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("registry", &self.registry)
            .field("dedup", &self.dedup)
            .finish()
    }
}

impl PluginLoader {
    /// Wrap a manager whose plugins have been set up
    ///
    /// Starts forwarding plugin cache invalidations as
    /// [`LoaderEventType::UpdatesChanged`].
    pub async fn new(manager: PluginManager) -> Self {
        let registry = manager.registry().clone();
        let notifications = manager.notification_manager().clone();
        let dedup = Arc::new(DedupEngine::new());
        let refiner =
            RefineOrchestrator::new(registry.clone(), dedup.clone(), notifications.clone());

        let subscription = notifications.lock().await.subscribe(
            SUBSCRIBER_ID.to_string(),
            EventFilter::PluginOnly,
            "PluginLoader".to_string(),
        );
        let forwarder = match subscription {
            Ok(receiver) => Some(tokio::spawn(forward_invalidations(
                receiver,
                notifications.clone(),
            ))),
            Err(e) => {
                log::warn!("Update notifications unavailable: {}", e);
                None
            }
        };

        publish_quietly(
            &notifications,
            Event::Loader(LoaderEvent::new(LoaderEventType::Ready)),
        )
        .await;

        Self {
            manager,
            registry,
            dedup,
            refiner,
            notifications,
            search: SearchSlot::default(),
            forwarder: Mutex::new(forwarder),
        }
    }

    pub fn notification_manager(&self) -> &SharedNotificationManager {
        &self.notifications
    }

    /// Search every search-capable plugin
    ///
    /// Starting a search cancels the one still running; the superseded call
    /// returns [`PluginError::Cancelled`] without touching any record.
    pub async fn search(
        &self,
        query: &str,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<AppList> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LENGTH {
            return Err(PluginError::not_found(format!(
                "search query '{}' is too short",
                query
            )));
        }

        let ticket = self.search.begin(cancel);
        if ticket.superseded_previous {
            publish_quietly(
                &self.notifications,
                Event::Loader(LoaderEvent::with_message(
                    LoaderEventType::SearchSuperseded,
                    query.to_string(),
                )),
            )
            .await;
        }

        let result = self
            .run_search(query, flags, &ticket.token, || self.search.is_current(&ticket))
            .await;
        self.search.finish(&ticket);
        result
    }

    async fn run_search(
        &self,
        query: &str,
        flags: RefineFlags,
        token: &CancellationToken,
        is_current: impl Fn() -> bool,
    ) -> PluginResult<AppList> {
        let found = {
            let registry = self.registry.inner().read().await;
            let calls: Vec<PluginCall<'_, AppList>> = registry
                .searchers()
                .into_iter()
                .map(|(name, searcher)| (name, searcher.search(query, flags, token)))
                .collect();
            fan_out("search", calls, token).await
        };
        if !is_current() {
            log::debug!("Search '{}' was superseded", query);
            return Err(PluginError::Cancelled);
        }
        let found: AppList = found?.into_iter().flatten().collect();

        let apps = self.dedup.dedupe_all(found);
        self.refiner.refine(&apps, flags, token).await?;
        if !is_current() {
            return Err(PluginError::Cancelled);
        }

        let mut apps: AppList = apps
            .into_iter()
            .filter(|app| app.state() != AppState::Unknown && app.name().is_some())
            .collect();
        apps.sort_by(|a, b| {
            b.search_sort_key()
                .cmp(&a.search_sort_key())
                .then_with(|| a.name().cmp(&b.name()))
        });
        log::debug!("Search '{}' found {} records", query, apps.len());
        Ok(apps)
    }

    /// Dedupe and refine what a fan-out produced
    async fn collect(
        &self,
        lists: Vec<AppList>,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<AppList> {
        let apps = self.dedup.dedupe_all(lists.into_iter().flatten().collect());
        self.refiner.refine(&apps, flags, cancel).await?;
        Ok(apps)
    }

    /// Records with pending updates; changes no system state
    pub async fn get_updates(
        &self,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<AppList> {
        let lists = {
            let registry = self.registry.inner().read().await;
            let calls: Vec<PluginCall<'_, AppList>> = registry
                .update_providers()
                .into_iter()
                .map(|(name, provider)| (name, provider.get_updates(flags, cancel)))
                .collect();
            fan_out("get-updates", calls, cancel).await?
        };
        self.collect(lists, flags, cancel).await
    }

    pub async fn get_distro_upgrades(
        &self,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<AppList> {
        let lists = {
            let registry = self.registry.inner().read().await;
            let calls: Vec<PluginCall<'_, AppList>> = registry
                .distro_upgrade_providers()
                .into_iter()
                .map(|(name, provider)| (name, provider.get_distro_upgrades(flags, cancel)))
                .collect();
            fan_out("get-distro-upgrades", calls, cancel).await?
        };
        self.collect(lists, flags, cancel).await
    }

    /// Ask every refresh-capable plugin to refresh data older than `cache_age`
    pub async fn refresh(
        &self,
        cache_age: Duration,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        let registry = self.registry.inner().read().await;
        let calls: Vec<PluginCall<'_, ()>> = registry
            .refreshers()
            .into_iter()
            .map(|(name, refresher)| (name, refresher.refresh(cache_age, flags, cancel)))
            .collect();
        fan_out("refresh", calls, cancel).await.map(|_| ())
    }

    pub async fn app_refine(
        &self,
        app: &Arc<App>,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        self.refiner
            .refine(std::slice::from_ref(app), flags, cancel)
            .await
    }

    /// Refine `app` on the runtime without waiting for it
    pub fn app_refine_in_background(
        &self,
        app: Arc<App>,
        flags: RefineFlags,
        cancel: CancellationToken,
    ) -> JoinHandle<PluginResult<()>> {
        let refiner = self.refiner.clone();
        tokio::spawn(async move { refiner.refine(&[app], flags, &cancel).await })
    }

    /// Build a record for a local file
    ///
    /// File-resolving plugins are asked in order; the first record returned
    /// wins and `NotFound` from a plugin passes the file on to the next.
    pub async fn filename_to_app(
        &self,
        path: &Path,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<Arc<App>> {
        let mut first_error: Option<PluginError> = None;
        let mut found: Option<Arc<App>> = None;
        {
            let registry = self.registry.inner().read().await;
            for (name, resolver) in registry.file_resolvers() {
                let Some(outcome) = cancel
                    .run_until_cancelled(resolver.filename_to_app(path, flags, cancel))
                    .await
                else {
                    return Err(PluginError::Cancelled);
                };
                match outcome {
                    Ok(app) => {
                        log::debug!("{} resolved {} to {}", name, path.display(), app.id());
                        found = Some(app);
                        break;
                    }
                    Err(PluginError::NotFound { .. }) => {}
                    Err(PluginError::Cancelled) => return Err(PluginError::Cancelled),
                    Err(error) => {
                        log_plugin_error(&error, name, "filename-to-app");
                        first_error.get_or_insert(error);
                    }
                }
            }
        }

        let Some(app) = found else {
            return Err(first_error.unwrap_or_else(|| {
                PluginError::not_found(format!("no plugin can handle {}", path.display()))
            }));
        };
        let app = self.dedup.dedupe(app);
        self.app_refine(&app, flags, cancel).await?;
        Ok(app)
    }

    /// Run `action` on `app` through the plugin responsible for it
    pub async fn app_action(
        &self,
        app: &Arc<App>,
        action: AppAction,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        let Some(management) = app.management_plugin() else {
            return Err(PluginError::NoManagementPlugin {
                app_id: app.id().to_string(),
            });
        };
        if cancel.is_cancelled() {
            return Err(PluginError::Cancelled);
        }

        let registry = self.registry.inner().read().await;
        let manager = registry.app_manager(&management)?;

        if action == AppAction::SetRating && !manager.supports(action) {
            let calls: Vec<PluginCall<'_, ()>> = registry
                .app_managers(action)
                .into_iter()
                .map(|(name, manager)| (name, manager.app_set_rating(app, cancel)))
                .collect();
            if calls.is_empty() {
                return Err(manager.unsupported(action));
            }
            return fan_out("set-rating", calls, cancel).await.map(|_| ());
        }
        if !manager.supports(action) {
            return Err(manager.unsupported(action));
        }

        let (transient, done) = match action {
            AppAction::Install => (Some(AppState::Installing), Some(AppState::Installed)),
            AppAction::Remove => (Some(AppState::Removing), Some(AppState::Available)),
            AppAction::Launch | AppAction::SetRating => (None, None),
        };
        if let Some(transient) = transient {
            if !app.set_state(transient) {
                return Err(PluginError::ExecutionError {
                    plugin_name: management,
                    operation: action.to_string(),
                    cause: format!("{} cannot {} from state {}", app.id(), action, app.state()),
                });
            }
        }

        log::info!("{} {} via {}", action, app.id(), management);
        let result = match cancel
            .run_until_cancelled(dispatch(manager, action, app, cancel))
            .await
        {
            Some(result) => result,
            None => Err(PluginError::Cancelled),
        };

        match (&result, done) {
            // the plugin may already have settled the record, e.g. as unavailable
            (Ok(()), Some(done)) if app.state().is_transient() => {
                app.set_state(done);
            }
            (Err(error), _) => {
                log_plugin_error(error, &management, &action.to_string());
                app.set_state_recover();
            }
            _ => {}
        }
        result
    }

    /// Canonical record for an id, as linked from addons, related or history
    pub fn resolve(&self, id: &str) -> Option<Arc<App>> {
        self.dedup.resolve(id)
    }

    /// Every plugin in execution order
    pub async fn plugins(&self) -> Vec<PluginSummary> {
        self.registry.summaries().await
    }

    /// Stop forwarding events and tear the plugins down
    pub async fn shutdown(&self) {
        self.search.cancel();
        self.notifications.lock().await.unsubscribe(SUBSCRIBER_ID);
        if let Some(forwarder) = self.forwarder.lock().await.take() {
            forwarder.abort();
        }
        self.manager.shutdown().await;
    }
}

fn dispatch<'a>(
    manager: &'a dyn AppManager,
    action: AppAction,
    app: &'a Arc<App>,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, PluginResult<()>> {
    match action {
        AppAction::Install => manager.app_install(app, cancel),
        AppAction::Remove => manager.app_remove(app, cancel),
        AppAction::Launch => manager.app_launch(app, cancel),
        AppAction::SetRating => manager.app_set_rating(app, cancel),
    }
}

/// Republish plugin cache invalidations as loader update notifications
async fn forward_invalidations(mut receiver: EventReceiver, notifications: SharedNotificationManager) {
    while let Some(event) = receiver.recv().await {
        let Event::Plugin(event) = event else {
            continue;
        };
        if event.event_type != PluginEventType::CacheInvalidated {
            continue;
        }
        log::debug!("{} invalidated its cache; updates changed", event.plugin_name);
        publish_quietly(
            &notifications,
            Event::Loader(LoaderEvent::with_message(
                LoaderEventType::UpdatesChanged,
                event.plugin_name,
            )),
        )
        .await;
    }
}
