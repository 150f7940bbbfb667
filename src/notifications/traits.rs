//! Per-subscriber bookkeeping

use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics tracking for a subscriber
#[derive(Debug, Default)]
pub struct SubscriberStatistics {
    queue_size: AtomicUsize,
    messages_processed: AtomicUsize,
}

impl SubscriberStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size.load(Ordering::Relaxed)
    }

    pub fn increment_queue_size(&self) {
        self.queue_size.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_queue_size(&self) {
        self.queue_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(1))
            })
            .ok();
    }

    pub fn messages_processed(&self) -> usize {
        self.messages_processed.load(Ordering::Relaxed)
    }

    pub fn record_message_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_size_never_underflows() {
        let stats = SubscriberStatistics::new();
        stats.decrement_queue_size();
        assert_eq!(stats.queue_size(), 0);

        stats.increment_queue_size();
        stats.increment_queue_size();
        stats.decrement_queue_size();
        assert_eq!(stats.queue_size(), 1);
    }
}
