//! Event Bus - lifecycle notices from the listener registry
//!
//! Fire-and-forget broadcast. Subscribers that lag simply miss notices;
//! nothing in the registry waits on them.

use crate::registry::ListenerId;
use dom::NodeId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Registry notices that can be observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    Started,
    Stopped,
    ListenerAdded {
        node: NodeId,
        event_type: String,
        id: ListenerId,
        capture: bool,
    },
    ListenerRemoved {
        node: NodeId,
        event_type: String,
        id: ListenerId,
    },
    /// A disposed node's entries were dropped
    NodePurged { node: NodeId, listeners: usize },
}

/// Simple event bus using tokio broadcast channel
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RegistryEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: RegistryEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(RegistryEvent::Started);
        bus.publish(RegistryEvent::NodePurged {
            node: 3,
            listeners: 2,
        });

        match rx.recv().await {
            Ok(RegistryEvent::Started) => {}
            other => panic!("Expected Started event, got {:?}", other),
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            RegistryEvent::NodePurged {
                node: 3,
                listeners: 2
            }
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::with_capacity(0);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(RegistryEvent::Stopped);
    }
}
