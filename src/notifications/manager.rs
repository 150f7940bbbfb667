//! AsyncNotificationManager implementation

use crate::notifications::error::NotificationError;
use crate::notifications::event::{Event, EventFilter};
use crate::notifications::traits::SubscriberStatistics;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Queue size at which a subscriber is reported as falling behind
const HIGH_WATER_MARK: usize = 10_000;

struct SubscriberInfo {
    filter: EventFilter,
    source: String,
    sender: UnboundedSender<Event>,
    statistics: Arc<SubscriberStatistics>,
}

/// Receiving end of a subscription
///
/// Keeps the subscriber's queue statistics in step with what has been consumed.
pub struct EventReceiver {
    receiver: UnboundedReceiver<Event>,
    statistics: Arc<SubscriberStatistics>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<Event> {
        let event = self.receiver.recv().await?;
        self.statistics.decrement_queue_size();
        self.statistics.record_message_processed();
        Some(event)
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        let event = self.receiver.try_recv().ok()?;
        self.statistics.decrement_queue_size();
        self.statistics.record_message_processed();
        Some(event)
    }
}

/// True only for the event that brings the queue up to `mark`, so a lagging
/// subscriber is reported once per backlog
fn reached_high_water_mark(statistics: &SubscriberStatistics, mark: usize) -> bool {
    statistics.queue_size() == mark
}

#[derive(Default)]
pub struct AsyncNotificationManager {
    subscribers: HashMap<String, SubscriberInfo>,
}

impl AsyncNotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        subscriber_id: String,
        filter: EventFilter,
        source: String,
    ) -> Result<EventReceiver, NotificationError> {
        let (sender, receiver) = unbounded_channel();
        let statistics = Arc::new(SubscriberStatistics::new());

        let subscriber_info = SubscriberInfo {
            filter,
            source: source.clone(),
            sender,
            statistics: statistics.clone(),
        };

        // Warn if overwriting existing subscriber
        if let Some(existing) = self
            .subscribers
            .insert(subscriber_id.clone(), subscriber_info)
        {
            log::warn!(
                "Subscriber '{}' replaced existing subscription (source: {} -> {})",
                subscriber_id,
                existing.source,
                source
            );
        }

        Ok(EventReceiver {
            receiver,
            statistics,
        })
    }

    pub fn unsubscribe(&mut self, subscriber_id: &str) -> bool {
        self.subscribers.remove(subscriber_id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn has_subscriber(&self, subscriber_id: &str) -> bool {
        self.subscribers.contains_key(subscriber_id)
    }

    pub async fn publish(&mut self, event: Event) -> Result<(), NotificationError> {
        let mut failed_subscribers = Vec::new();
        let event_type = event.kind_name().to_string();

        for (subscriber_id, subscriber_info) in &self.subscribers {
            if !subscriber_info.filter.accepts(&event) {
                continue;
            }
            subscriber_info.statistics.increment_queue_size();
            if subscriber_info.sender.send(event.clone()).is_err() {
                // Receiver dropped, mark for removal
                failed_subscribers.push(subscriber_id.clone());
                continue;
            }
            if reached_high_water_mark(&subscriber_info.statistics, HIGH_WATER_MARK) {
                log::warn!(
                    "Subscriber '{}' is falling behind: {} events queued, {} processed",
                    subscriber_id,
                    subscriber_info.statistics.queue_size(),
                    subscriber_info.statistics.messages_processed()
                );
            }
        }

        for subscriber_id in &failed_subscribers {
            log::debug!("Removing closed subscriber '{}'", subscriber_id);
            self.subscribers.remove(subscriber_id);
        }

        if !failed_subscribers.is_empty() {
            return Err(NotificationError::PublishFailed {
                event_type,
                failed_subscribers,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::event::{
        LoaderEvent, LoaderEventType, PluginEvent, PluginEventType, SystemEvent, SystemEventType,
    };

    #[tokio::test]
    async fn test_subscribe_and_count() {
        let mut manager = AsyncNotificationManager::new();
        assert_eq!(manager.subscriber_count(), 0);

        let _rx = manager
            .subscribe("ui".to_string(), EventFilter::All, "test".to_string())
            .unwrap();
        assert_eq!(manager.subscriber_count(), 1);
        assert!(manager.has_subscriber("ui"));
        assert!(manager.unsubscribe("ui"));
        assert!(!manager.has_subscriber("ui"));
    }

    #[tokio::test]
    async fn test_publish_respects_filters() {
        let mut manager = AsyncNotificationManager::new();
        let mut loader_rx = manager
            .subscribe(
                "loader".to_string(),
                EventFilter::LoaderOnly,
                "test".to_string(),
            )
            .unwrap();
        let mut plugin_rx = manager
            .subscribe(
                "plugin".to_string(),
                EventFilter::PluginOnly,
                "test".to_string(),
            )
            .unwrap();

        manager
            .publish(Event::Loader(LoaderEvent::new(
                LoaderEventType::UpdatesChanged,
            )))
            .await
            .unwrap();

        assert!(matches!(
            loader_rx.try_recv(),
            Some(Event::Loader(LoaderEvent {
                event_type: LoaderEventType::UpdatesChanged,
                ..
            }))
        ));
        assert!(plugin_rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_queue_statistics_track_consumption() {
        let mut manager = AsyncNotificationManager::new();
        let mut rx = manager
            .subscribe("s".to_string(), EventFilter::All, "test".to_string())
            .unwrap();

        for _ in 0..3 {
            manager
                .publish(Event::Plugin(PluginEvent::new(
                    PluginEventType::Registered,
                    "steam".to_string(),
                )))
                .await
                .unwrap();
        }
        let stats = manager.subscribers["s"].statistics.clone();
        assert_eq!(stats.queue_size(), 3);

        rx.recv().await.unwrap();
        assert_eq!(stats.queue_size(), 2);
        assert_eq!(stats.messages_processed(), 1);
    }

    #[test]
    fn test_high_water_mark_is_reported_once() {
        let stats = SubscriberStatistics::new();
        let mut reports = 0;
        for _ in 0..5 {
            stats.increment_queue_size();
            if reached_high_water_mark(&stats, 3) {
                reports += 1;
            }
        }
        assert_eq!(reports, 1);

        // draining below the mark and refilling reports again
        stats.decrement_queue_size();
        stats.decrement_queue_size();
        stats.decrement_queue_size();
        stats.increment_queue_size();
        assert!(reached_high_water_mark(&stats, 3));
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_removed() {
        let mut manager = AsyncNotificationManager::new();
        let rx = manager
            .subscribe("gone".to_string(), EventFilter::All, "test".to_string())
            .unwrap();
        drop(rx);

        let result = manager
            .publish(Event::System(SystemEvent::new(SystemEventType::Shutdown)))
            .await;
        match result {
            Err(NotificationError::PublishFailed {
                failed_subscribers, ..
            }) => assert_eq!(failed_subscribers, vec!["gone".to_string()]),
            other => panic!("expected PublishFailed, got {:?}", other),
        }
        assert_eq!(manager.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_replacing_subscriber_keeps_single_entry() {
        let mut manager = AsyncNotificationManager::new();
        let _first = manager
            .subscribe("dup".to_string(), EventFilter::All, "one".to_string())
            .unwrap();
        let _second = manager
            .subscribe("dup".to_string(), EventFilter::All, "two".to_string())
            .unwrap();
        assert_eq!(manager.subscriber_count(), 1);
    }
}
