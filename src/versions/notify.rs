//! In-process refresh notifications between workflow sessions.
//!
//! Two independent topics carry a single boolean. Publishing with no
//! subscribers is not an error. A subscription is released when it is
//! dropped.

use tokio::sync::broadcast;

const TOPIC_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTopic {
    /// The set of versions of a parent changed.
    VersionList,
    /// The line items of some version changed.
    VersionLineItems,
}

impl RefreshTopic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VersionList => "version_list",
            Self::VersionLineItems => "version_line_items",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSignal {
    pub refresh: bool,
}

impl RefreshSignal {
    pub const REFRESH: Self = Self { refresh: true };
}

/// Cloneable handle to both topics; every clone publishes to the same
/// subscribers.
#[derive(Debug, Clone)]
pub struct RefreshBus {
    version_list: broadcast::Sender<RefreshSignal>,
    version_line_items: broadcast::Sender<RefreshSignal>,
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshBus {
    pub fn new() -> Self {
        let (version_list, _) = broadcast::channel(TOPIC_CAPACITY);
        let (version_line_items, _) = broadcast::channel(TOPIC_CAPACITY);
        Self {
            version_list,
            version_line_items,
        }
    }

    fn sender(&self, topic: RefreshTopic) -> &broadcast::Sender<RefreshSignal> {
        match topic {
            RefreshTopic::VersionList => &self.version_list,
            RefreshTopic::VersionLineItems => &self.version_line_items,
        }
    }

    /// Publish a refresh signal. Returns how many subscribers received it.
    pub fn publish(&self, topic: RefreshTopic) -> usize {
        let delivered = self.sender(topic).send(RefreshSignal::REFRESH).unwrap_or(0);
        tracing::debug!(topic = topic.as_str(), delivered, "Published refresh signal");
        delivered
    }

    pub fn subscribe(&self, topic: RefreshTopic) -> RefreshSubscription {
        RefreshSubscription {
            topic,
            receiver: self.sender(topic).subscribe(),
        }
    }

    pub fn subscriber_count(&self, topic: RefreshTopic) -> usize {
        self.sender(topic).receiver_count()
    }
}

#[derive(Debug)]
pub struct RefreshSubscription {
    topic: RefreshTopic,
    receiver: broadcast::Receiver<RefreshSignal>,
}

impl RefreshSubscription {
    pub fn topic(&self) -> RefreshTopic {
        self.topic
    }

    /// Wait for the next signal. Missed signals collapse into one refresh.
    /// `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<RefreshSignal> {
        match self.receiver.recv().await {
            Ok(signal) => Some(signal),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(topic = self.topic.as_str(), skipped, "Refresh subscriber lagged");
                Some(RefreshSignal::REFRESH)
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// A pending signal, if any, without waiting.
    pub fn try_recv(&mut self) -> Option<RefreshSignal> {
        match self.receiver.try_recv() {
            Ok(signal) => Some(signal),
            Err(broadcast::error::TryRecvError::Lagged(_)) => Some(RefreshSignal::REFRESH),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn topics_are_independent() {
        let bus = RefreshBus::new();
        let mut list = bus.subscribe(RefreshTopic::VersionList);
        let mut items = bus.subscribe(RefreshTopic::VersionLineItems);

        assert_eq!(bus.publish(RefreshTopic::VersionList), 1);
        assert_eq!(list.recv().await, Some(RefreshSignal::REFRESH));
        assert_eq!(items.try_recv(), None);
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus = RefreshBus::new();
        assert_eq!(bus.publish(RefreshTopic::VersionLineItems), 0);
    }

    #[test]
    fn dropping_a_subscription_releases_it() {
        let bus = RefreshBus::new();
        let sub = bus.subscribe(RefreshTopic::VersionList);
        assert_eq!(bus.subscriber_count(RefreshTopic::VersionList), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(RefreshTopic::VersionList), 0);
    }

    #[tokio::test]
    async fn lagging_collapses_into_one_refresh() {
        let bus = RefreshBus::new();
        let mut sub = bus.subscribe(RefreshTopic::VersionList);
        for _ in 0..(TOPIC_CAPACITY * 2) {
            bus.publish(RefreshTopic::VersionList);
        }
        assert_eq!(sub.recv().await, Some(RefreshSignal::REFRESH));
    }

    #[tokio::test]
    async fn closed_bus_ends_the_subscription() {
        let bus = RefreshBus::new();
        let mut sub = bus.subscribe(RefreshTopic::VersionLineItems);
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }
}
