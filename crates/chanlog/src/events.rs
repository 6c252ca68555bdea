//! Update notifications for reactive subscribers.

use tokio::sync::broadcast;

use chanlog_core::{ChannelKey, VersionId};

/// What produced a new head version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCause {
    Append,
    Merge,
}

/// A channel gained a new head version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpdated {
    pub key: ChannelKey,
    pub version: VersionId,
    pub cause: UpdateCause,
}

impl ChannelUpdated {
    pub fn channel_id(&self) -> &str {
        &self.key.channel_id
    }
}

/// A broadcast receiver of channel updates.
///
/// A receiver that falls more than the bus capacity behind observes
/// [`broadcast::error::RecvError::Lagged`] and skips ahead.
pub type UpdateStream = broadcast::Receiver<ChannelUpdated>;

/// Fan-out of [`ChannelUpdated`] events to every live subscriber.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChannelUpdated>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> UpdateStream {
        self.sender.subscribe()
    }

    /// Deliver an event. Publishing with no subscribers drops the event.
    pub fn publish(&self, event: ChannelUpdated) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            tracing::trace!(channel = %event.key, "no update subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(channel: &str) -> ChannelUpdated {
        ChannelUpdated {
            key: ChannelKey::new(channel, None),
            version: VersionId::from_bytes([3; 32]),
            cause: UpdateCause::Append,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new(8);
        let mut one = bus.subscribe();
        let mut two = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(event("temps"));

        assert_eq!(one.recv().await.unwrap().channel_id(), "temps");
        assert_eq!(two.recv().await.unwrap(), event("temps"));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(0);
        bus.publish(event("nobody"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new(4);
        bus.publish(event("early"));

        let mut late = bus.subscribe();
        bus.publish(event("late"));
        assert_eq!(late.recv().await.unwrap().channel_id(), "late");
    }
}
