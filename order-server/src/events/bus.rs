//! Event bus core implementation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      MemoryEventBus                      │
//! │   topic -> broadcast::Sender<EventMessage> (lazy init)   │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//!            ┌─────────────────┼─────────────────┐
//!            ▼                 ▼                 ▼
//!      "order.created"   "payment.failed"  "stock.reserved"
//! ```
//!
//! One topic per event type. Topic handles are created lazily under a
//! double-checked lock: a read-lock lookup first, then a write-lock re-check
//! before insertion. Delivery is at-least-once from the dispatcher's point of
//! view — consumers dedupe on the `message_id` attribute.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared::error::AppResult;
use shared::models::OutboxEvent;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Default capacity of each topic channel
const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// A published message: JSON body plus routing attributes
#[derive(Debug, Clone)]
pub struct EventMessage {
    /// The event payload as written by the aggregate
    pub body: serde_json::Value,
    /// `{event_id, aggregate_type, aggregate_id, event_type, message_id}`
    pub attributes: HashMap<String, String>,
}

impl EventMessage {
    /// Build the wire envelope for an outbox row
    pub fn from_outbox(event: &OutboxEvent) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("event_id".to_string(), event.id.clone());
        attributes.insert("aggregate_type".to_string(), event.aggregate_type.clone());
        attributes.insert("aggregate_id".to_string(), event.aggregate_id.clone());
        attributes.insert("event_type".to_string(), event.event_type.clone());
        attributes.insert("message_id".to_string(), event.dedup_id());
        Self {
            body: event.payload.clone(),
            attributes,
        }
    }

    /// The deduplication id consumers collapse redeliveries on
    pub fn message_id(&self) -> Option<&str> {
        self.attributes.get("message_id").map(String::as_str)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.attributes.get("event_type").map(String::as_str)
    }
}

/// Broker contract: publish to a topic, subscribe to a topic.
///
/// Implementations must be safe for concurrent publishers and must not block
/// on slow subscribers.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, message: EventMessage) -> AppResult<()>;

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<EventMessage>;
}

/// In-process event bus — one broadcast channel per topic
pub struct MemoryEventBus {
    capacity: usize,
    topics: RwLock<HashMap<String, broadcast::Sender<EventMessage>>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Get or lazily create the topic sender (double-checked lock)
    fn topic_sender(&self, topic: &str) -> broadcast::Sender<EventMessage> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.clone();
        }

        let mut topics = self.topics.write();
        // Re-check: another publisher may have created it between the locks
        if let Some(sender) = topics.get(topic) {
            return sender.clone();
        }
        let (sender, _) = broadcast::channel(self.capacity);
        topics.insert(topic.to_string(), sender.clone());
        sender
    }

    /// Number of topics created so far
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, topic: &str, message: EventMessage) -> AppResult<()> {
        let sender = self.topic_sender(topic);
        // A send error only means no subscriber is currently attached; the
        // message is still considered delivered to the broker.
        let receivers = sender.send(message).unwrap_or(0);
        tracing::trace!(topic, receivers, "Published event");
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<EventMessage> {
        self.topic_sender(topic).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> OutboxEvent {
        OutboxEvent::new(
            "order",
            "o1",
            "order.created",
            serde_json::json!({"order_id": "o1"}),
        )
    }

    #[test]
    fn test_envelope_attributes() {
        let event = sample_event();
        let message = EventMessage::from_outbox(&event);
        assert_eq!(message.attributes.get("event_id"), Some(&event.id));
        assert_eq!(
            message.attributes.get("aggregate_type"),
            Some(&"order".to_string())
        );
        assert_eq!(
            message.attributes.get("event_type"),
            Some(&"order.created".to_string())
        );
        assert_eq!(message.message_id(), Some(event.dedup_id().as_str()));
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = MemoryEventBus::new();
        let mut rx = bus.subscribe("order.created");

        let event = sample_event();
        bus.publish("order.created", EventMessage::from_outbox(&event))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), Some("order.created"));
        assert_eq!(received.body, event.payload);
    }

    #[tokio::test]
    async fn test_topics_created_lazily() {
        let bus = MemoryEventBus::new();
        assert_eq!(bus.topic_count(), 0);

        let event = sample_event();
        bus.publish("order.created", EventMessage::from_outbox(&event))
            .await
            .unwrap();
        bus.publish("order.created", EventMessage::from_outbox(&event))
            .await
            .unwrap();
        assert_eq!(bus.topic_count(), 1);

        let _rx = bus.subscribe("payment.failed");
        assert_eq!(bus.topic_count(), 2);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = MemoryEventBus::new();
        let event = sample_event();
        bus.publish("stock.released", EventMessage::from_outbox(&event))
            .await
            .unwrap();
    }
}
