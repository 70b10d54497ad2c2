use serde_json::Value;
use tokio::sync::broadcast;

/// A server-initiated event pushed to any `GET /events` subscriber.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Notification { method: String, params: Value },
    Ping,
}

/// Fan-out channel for server-initiated events.
///
/// One sender, many subscribers; a subscriber that falls behind silently
/// drops the oldest events rather than blocking the rest of the server (the
/// SSE endpoint has no replay buffer per the transport contract, so lagging
/// subscribers simply reconnect).
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event; returns the number of active subscribers notified.
    /// Returns 0 (not an error) when nobody is listening.
    pub fn publish(&self, event: ServerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(ServerEvent::Ping);
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ServerEvent::Ping));
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_error() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(ServerEvent::Ping), 0);
    }
}
