//! Outbox Event Model
//!
//! An outbox row is written in the same transaction as the aggregate change
//! it describes. Once `published` is set the row is immutable.

use serde::{Deserialize, Serialize};

/// Transactional outbox envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: String,
    /// Aggregate kind ("order", "reservation", "payment")
    pub aggregate_type: String,
    pub aggregate_id: String,
    /// Topic name, e.g. "order.created"
    pub event_type: String,
    /// Opaque JSON payload, self-sufficient for downstream consumers
    pub payload: serde_json::Value,
    pub published: bool,
    pub published_at: Option<i64>,
    pub created_at: i64,
}

impl OutboxEvent {
    /// Build a fresh unpublished event
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: crate::util::new_id(),
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            payload,
            published: false,
            published_at: None,
            created_at: crate::util::now_millis(),
        }
    }

    /// Message deduplication id: identical rows yield identical ids across
    /// publish retries, so consumers can collapse redeliveries.
    pub fn dedup_id(&self) -> String {
        crate::util::sha256_hex(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_id_stable_across_retries() {
        let event = OutboxEvent::new("order", "o1", "order.created", serde_json::json!({}));
        assert_eq!(event.dedup_id(), event.dedup_id());
        assert_eq!(event.dedup_id(), crate::util::sha256_hex(&event.id));
    }

    #[test]
    fn test_new_event_is_unpublished() {
        let event = OutboxEvent::new("order", "o1", "order.created", serde_json::json!({}));
        assert!(!event.published);
        assert!(event.published_at.is_none());
    }
}
