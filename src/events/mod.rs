use crate::models::SenderKind;
use tokio::sync::broadcast;

/// Lifecycle notifications emitted by the engine. Subscribers (dashboards,
/// notification senders) are informed, never queried: publishing is
/// fire-and-forget and the engine never blocks on delivery.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    ConversationAssigned {
        conversation_id: String,
        admin_id: String,
        timestamp: String, // ISO 8601
    },
    ConversationTransferred {
        conversation_id: String,
        from_admin_id: String,
        to_admin_id: String,
        timestamp: String, // ISO 8601
    },
    ConversationClosed {
        conversation_id: String,
        admin_id: String,
        timestamp: String, // ISO 8601
    },
    ConversationReopened {
        conversation_id: String,
        admin_id: String,
        timestamp: String, // ISO 8601
    },
    ConversationDeleted {
        conversation_id: String,
        admin_id: String,
        timestamp: String, // ISO 8601
    },
    MessageAppended {
        message_id: String,
        conversation_id: String,
        sender_kind: SenderKind,
        timestamp: String, // ISO 8601
    },
}

/// Event bus for publishing and subscribing to system events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SystemEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all subscribers (non-blocking, fire-and-forget)
    pub fn publish(&self, event: SystemEvent) {
        // No subscribers is the normal idle case; just note it and move on
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("Event dropped (no subscribers): {}", e);
        }
    }

    /// Subscribe to events (returns a receiver)
    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(SystemEvent::ConversationAssigned {
            conversation_id: "c1".to_string(),
            admin_id: "a1".to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
        });

        match rx.recv().await.unwrap() {
            SystemEvent::ConversationAssigned {
                conversation_id, ..
            } => assert_eq!(conversation_id, "c1"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(SystemEvent::ConversationClosed {
            conversation_id: "c1".to_string(),
            admin_id: "a1".to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
        });
    }
}
