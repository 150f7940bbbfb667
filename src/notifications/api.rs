//! Public API for the notification system
//!
//! External modules should import from here rather than directly from internal modules.

use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

pub use crate::notifications::error::NotificationError;
pub use crate::notifications::event::{
    Event, EventFilter, LoaderEvent, LoaderEventType, PluginEvent, PluginEventType, SystemEvent,
    SystemEventType,
};
pub use crate::notifications::manager::{AsyncNotificationManager, EventReceiver};

/// Shared handle to a notification manager
pub type SharedNotificationManager = Arc<Mutex<AsyncNotificationManager>>;

/// Global notification service instance
static NOTIFICATION_SERVICE: LazyLock<SharedNotificationManager> = LazyLock::new(|| {
    log::trace!("Initializing notification service");
    Arc::new(Mutex::new(AsyncNotificationManager::new()))
});

/// Access notification service
///
/// Every call returns the same shared instance.
///
/// # Examples
/// ```no_run
/// # use softcenter::notifications::api::{get_notification_service, Event, SystemEvent, SystemEventType};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut manager = get_notification_service().await;
/// let event = Event::System(SystemEvent::new(SystemEventType::Startup));
/// manager.publish(event).await?;
/// # Ok(())
/// # }
/// ```
pub async fn get_notification_service() -> tokio::sync::MutexGuard<'static, AsyncNotificationManager>
{
    NOTIFICATION_SERVICE.lock().await
}

/// Arc handle to the global service, for components that take the manager by injection
pub fn get_notification_service_arc() -> SharedNotificationManager {
    NOTIFICATION_SERVICE.clone()
}

/// Fresh, unshared manager; used where isolation from the global service is wanted
pub fn new_notification_manager() -> SharedNotificationManager {
    Arc::new(Mutex::new(AsyncNotificationManager::new()))
}

/// Publish and log instead of failing; a missing listener never aborts an operation
pub async fn publish_quietly(manager: &SharedNotificationManager, event: Event) {
    let mut manager = manager.lock().await;
    if let Err(e) = manager.publish(event).await {
        log::debug!("Notification not fully delivered: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_global_service_is_shared() {
        let first = get_notification_service_arc();
        let second = get_notification_service_arc();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    #[serial]
    async fn test_publish_quietly_reaches_global_subscriber() {
        let service = get_notification_service_arc();
        let mut receiver = service
            .lock()
            .await
            .subscribe(
                "api-test".to_string(),
                EventFilter::SystemOnly,
                "test".to_string(),
            )
            .unwrap();

        publish_quietly(
            &service,
            Event::System(SystemEvent::new(SystemEventType::Startup)),
        )
        .await;
        assert!(matches!(receiver.try_recv(), Some(Event::System(_))));

        assert!(get_notification_service().await.unsubscribe("api-test"));
    }

    #[tokio::test]
    async fn test_fresh_manager_is_isolated() {
        let fresh = new_notification_manager();
        assert!(!Arc::ptr_eq(&fresh, &get_notification_service_arc()));
        assert_eq!(fresh.lock().await.subscriber_count(), 0);
    }
}
