//! Refine Orchestrator
//!
//! Runs the refine-capable plugins over a list of records until the fields
//! the caller asked for are filled in. Plugins run one after another in
//! registry order so every pass is deterministic.

use std::sync::Arc;

use crate::core::cancel::CancellationToken;
use crate::dedup::api::DedupEngine;
use crate::notifications::api::{
    publish_quietly, Event, PluginEvent, PluginEventType, SharedNotificationManager,
};
use crate::plugin::api::{log_plugin_error, PluginError, PluginResult, SharedPluginRegistry};
use crate::record::api::{App, RefineFlags};
use crate::refine::needs::needs_refine;

/// Flags that never carry over to the addon pass
const RELATION_FLAGS: RefineFlags = RefineFlags::REQUIRE_ADDONS
    .union(RefineFlags::REQUIRE_RELATED)
    .union(RefineFlags::REQUIRE_HISTORY);

#[derive(Clone)]
pub struct RefineOrchestrator {
    registry: SharedPluginRegistry,
    dedup: Arc<DedupEngine>,
    notifications: SharedNotificationManager,
}

impl std::fmt::Debug for RefineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefineOrchestrator")
            .field("registry", &self.registry)
            .field("dedup", &self.dedup)
            .finish()
    }
}

impl RefineOrchestrator {
    pub fn new(
        registry: SharedPluginRegistry,
        dedup: Arc<DedupEngine>,
        notifications: SharedNotificationManager,
    ) -> Self {
        Self {
            registry,
            dedup,
            notifications,
        }
    }

    /// Refine `apps` for `flags`
    ///
    /// The first plugin error aborts the operation and is published as a
    /// [`PluginEventType::Error`] for the failing plugin. Records parked as
    /// relations by the plugins are adopted into the arena afterwards; with
    /// `REQUIRE_ADDONS` the addons get a pass of their own.
    pub async fn refine(
        &self,
        apps: &[Arc<App>],
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        self.refine_pass(apps, flags, cancel).await?;

        if flags.contains(RefineFlags::REQUIRE_ADDONS) {
            let addons: Vec<Arc<App>> = apps
                .iter()
                .flat_map(|app| app.addons())
                .filter_map(|id| self.dedup.resolve(&id))
                .collect();
            let addons = self.dedup.dedupe_all(addons);
            if !addons.is_empty() {
                log::debug!("Refining {} addons", addons.len());
                self.refine_pass(&addons, flags.difference(RELATION_FLAGS), cancel)
                    .await?;
            }
        }
        Ok(())
    }

    async fn refine_pass(
        &self,
        apps: &[Arc<App>],
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        if cancel.is_cancelled() {
            return Err(PluginError::Cancelled);
        }
        if !apps.iter().any(|app| needs_refine(app, flags)) {
            log::trace!("Nothing to refine for {:?} on {} records", flags, apps.len());
            return Ok(());
        }

        self.run_refiners(apps, flags, cancel).await?;

        for app in apps {
            app.add_refined(flags);
            self.dedup.adopt_relations(app);
        }
        Ok(())
    }

    async fn run_refiners(
        &self,
        apps: &[Arc<App>],
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        let registry = self.registry.inner().read().await;
        for (name, refiner) in registry.refiners() {
            if cancel.is_cancelled() {
                return Err(PluginError::Cancelled);
            }
            log::trace!("Refining {} records with {}", apps.len(), name);
            match cancel
                .run_until_cancelled(refiner.refine(apps, flags, cancel))
                .await
            {
                None => return Err(PluginError::Cancelled),
                Some(Err(PluginError::Cancelled)) => return Err(PluginError::Cancelled),
                Some(Err(error)) => {
                    log_plugin_error(&error, name, "refine");
                    publish_quietly(
                        &self.notifications,
                        Event::Plugin(PluginEvent::with_message(
                            PluginEventType::Error,
                            name.to_string(),
                            error.to_string(),
                        )),
                    )
                    .await;
                    return Err(error);
                }
                Some(Ok(())) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::api::{new_notification_manager, EventFilter, EventReceiver};
    use crate::plugin::api::PluginRegistry;
    use crate::plugin::tests::utils::{CallLog, MockPlugin};
    use crate::record::api::{AppState, Quality};
    use std::time::Duration;

    fn orchestrator(plugins: Vec<MockPlugin>) -> RefineOrchestrator {
        let mut registry = PluginRegistry::new();
        for plugin in plugins {
            registry.register_plugin(Box::new(plugin)).unwrap();
        }
        let shared = SharedPluginRegistry::new();
        *shared.inner().try_write().unwrap() = registry;
        RefineOrchestrator::new(shared, Arc::new(DedupEngine::new()), new_notification_manager())
    }

    async fn plugin_events(refine: &RefineOrchestrator) -> EventReceiver {
        refine
            .notifications
            .lock()
            .await
            .subscribe("test".to_string(), EventFilter::PluginOnly, "test".to_string())
            .unwrap()
    }

    fn available(id: &str) -> Arc<App> {
        let app = App::new(id);
        app.set_state(AppState::Available);
        app
    }

    #[tokio::test]
    async fn test_fast_path_invokes_no_plugin() {
        let calls = CallLog::new();
        let refine = orchestrator(vec![MockPlugin::new("p1").refining().with_calls(&calls)]);
        let app = available("a");
        app.set_licence(Quality::Normal, "MIT");

        refine
            .refine(&[app], RefineFlags::REQUIRE_LICENCE, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(calls.count("refine"), 0);
    }

    #[tokio::test]
    async fn test_higher_tier_from_later_plugin_wins() {
        let calls = CallLog::new();
        let refine = orchestrator(vec![
            MockPlugin::new("p1")
                .refining_with(|apps, _| {
                    apps[0].set_licence(Quality::Lowest, "GPL-2.0");
                    Ok(())
                })
                .with_calls(&calls),
            MockPlugin::new("p2")
                .refining_with(|apps, _| {
                    apps[0].set_licence(Quality::Highest, "GPL-2.0+");
                    Ok(())
                })
                .with_calls(&calls),
        ]);
        let app = available("a");

        refine
            .refine(&[app.clone()], RefineFlags::REQUIRE_LICENCE, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(app.licence().as_deref(), Some("GPL-2.0+"));
        assert_eq!(calls.entries(), vec!["refine:p1", "refine:p2"]);
        assert!(app.refined().contains(RefineFlags::REQUIRE_LICENCE));
    }

    #[tokio::test]
    async fn test_first_error_aborts() {
        let calls = CallLog::new();
        let refine = orchestrator(vec![
            MockPlugin::new("p1")
                .refining_with(|_, _| Err(PluginError::not_found("gone")))
                .with_calls(&calls),
            MockPlugin::new("p2").refining().with_calls(&calls),
        ]);
        let app = App::new("a");

        let result = refine
            .refine(&[app.clone()], RefineFlags::DEFAULT, &CancellationToken::new())
            .await;
        assert_eq!(result, Err(PluginError::not_found("gone")));
        assert_eq!(calls.entries(), vec!["refine:p1"]);
        assert!(app.refined().is_empty());
    }

    #[tokio::test]
    async fn test_abort_publishes_plugin_error() {
        let refine = orchestrator(vec![
            MockPlugin::new("p1").refining(),
            MockPlugin::new("p2").refining_with(|_, _| Err(PluginError::not_found("gone"))),
        ]);
        let mut events = plugin_events(&refine).await;

        let result = refine
            .refine(&[App::new("a")], RefineFlags::DEFAULT, &CancellationToken::new())
            .await;
        assert!(result.is_err());

        match events.try_recv() {
            Some(Event::Plugin(event)) => {
                assert_eq!(event.event_type, PluginEventType::Error);
                assert_eq!(event.plugin_name, "p2");
                assert!(event.message.unwrap().contains("gone"));
            }
            other => panic!("expected a plugin error event, got {:?}", other),
        }
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_refine_publishes_nothing() {
        let refine = orchestrator(vec![
            MockPlugin::new("p1").refining_with(|_, _| Err(PluginError::Cancelled))
        ]);
        let mut events = plugin_events(&refine).await;

        let result = refine
            .refine(&[App::new("a")], RefineFlags::DEFAULT, &CancellationToken::new())
            .await;
        assert_eq!(result, Err(PluginError::Cancelled));
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let calls = CallLog::new();
        let refine = orchestrator(vec![MockPlugin::new("p1").refining().with_calls(&calls)]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = refine.refine(&[App::new("a")], RefineFlags::DEFAULT, &cancel).await;
        assert_eq!(result, Err(PluginError::Cancelled));
        assert_eq!(calls.count("refine"), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_slow_plugin() {
        let refine = orchestrator(vec![MockPlugin::new("slow")
            .refining()
            .with_delay(Duration::from_secs(30))]);
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = refine.refine(&[App::new("a")], RefineFlags::DEFAULT, &cancel).await;
        assert_eq!(result, Err(PluginError::Cancelled));
    }

    #[tokio::test]
    async fn test_disabled_plugin_is_never_invoked() {
        let calls = CallLog::new();
        let refine = orchestrator(vec![
            MockPlugin::new("x").refining().with_calls(&calls),
            MockPlugin::new("y").refining().with_calls(&calls),
        ]);
        refine.registry.inner().write().await.disable_plugin("x").unwrap();

        refine
            .refine(&[App::new("a")], RefineFlags::DEFAULT, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(calls.entries(), vec!["refine:y"]);
    }

    #[tokio::test]
    async fn test_addons_are_adopted_and_refined() {
        let calls = CallLog::new();
        let refine = orchestrator(vec![MockPlugin::new("p1")
            .refining_with(|apps, flags| {
                for app in apps {
                    if app.id() == "main" {
                        app.add_addon(App::new("main-plugin"));
                    } else {
                        assert!(!flags.contains(RefineFlags::REQUIRE_ADDONS));
                        app.set_state(AppState::Available);
                    }
                }
                Ok(())
            })
            .with_calls(&calls)]);
        let app = App::new("main");

        refine
            .refine(&[app.clone()], RefineFlags::REQUIRE_ADDONS, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(app.addons(), vec!["main-plugin"]);
        let addon = refine.dedup.resolve("main-plugin").unwrap();
        assert_eq!(addon.state(), AppState::Available);
        assert_eq!(calls.count("refine"), 2);
    }
}
