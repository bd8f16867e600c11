//! Order Model
//!
//! An order together with its items and its outbox rows forms one
//! aggregate. Items are immutable snapshots taken at order time; later
//! catalog edits never touch historical orders.

use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// Transitions follow a fixed DAG, enforced server-side:
///
/// ```text
/// pending ──▶ confirmed ──▶ paid ──▶ processing ──▶ shipped ──▶ delivered
///    │            │           │           │
///    ▼            ▼           ▼           ▼
/// cancelled   cancelled    refunded   cancelled
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// All statuses an order may move to from `self`
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Paid, Cancelled],
            Paid => &[Processing, Refunded],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            Delivered | Cancelled | Refunded => &[],
        }
    }

    /// Whether `self -> to` is a legal transition
    pub fn can_transition(&self, to: OrderStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Terminal statuses accept no further transitions
    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// The outbox event type derived from a transition into this status
    pub fn event_type(&self) -> &'static str {
        use OrderStatus::*;
        match self {
            Pending => "order.created",
            Confirmed => "order.confirmed",
            Paid => "order.paid",
            Processing => "order.processing",
            Shipped => "order.shipped",
            Delivered => "order.delivered",
            Cancelled => "order.cancelled",
            Refunded => "order.refunded",
        }
    }

    pub fn as_str(&self) -> &'static str {
        use OrderStatus::*;
        match self {
            Pending => "pending",
            Confirmed => "confirmed",
            Paid => "paid",
            Processing => "processing",
            Shipped => "shipped",
            Delivered => "delivered",
            Cancelled => "cancelled",
            Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use OrderStatus::*;
        match s {
            "pending" => Ok(Pending),
            "confirmed" => Ok(Confirmed),
            "paid" => Ok(Paid),
            "processing" => Ok(Processing),
            "shipped" => Ok(Shipped),
            "delivered" => Ok(Delivered),
            "cancelled" => Ok(Cancelled),
            "refunded" => Ok(Refunded),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shipping address (opaque to the core, validated for completeness)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Name of the first empty field, if any
    pub fn first_missing_field(&self) -> Option<&'static str> {
        if self.street.trim().is_empty() {
            Some("street")
        } else if self.city.trim().is_empty() {
            Some("city")
        } else if self.state.trim().is_empty() {
            Some("state")
        } else if self.postal_code.trim().is_empty() {
            Some("postal_code")
        } else if self.country.trim().is_empty() {
            Some("country")
        } else {
            None
        }
    }
}

/// Order line item — a snapshot of the product at order time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    /// Product name at order time
    pub name: String,
    /// Unit price in minor units at order time
    pub unit_price_minor: i64,
    pub currency: String,
    pub quantity: i64,
    /// unit_price_minor * quantity
    pub total_price_minor: i64,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    /// Sum over items of unit_price_minor * quantity
    pub total_minor: i64,
    pub currency: String,
    pub payment_id: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub cancel_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_transition_dag() {
        use OrderStatus::*;
        assert!(Pending.can_transition(Confirmed));
        assert!(Pending.can_transition(Cancelled));
        assert!(Confirmed.can_transition(Paid));
        assert!(Paid.can_transition(Processing));
        assert!(Paid.can_transition(Refunded));
        assert!(Processing.can_transition(Shipped));
        assert!(Processing.can_transition(Cancelled));
        assert!(Shipped.can_transition(Delivered));

        assert!(!Pending.can_transition(Paid));
        assert!(!Shipped.can_transition(Cancelled));
        assert!(!Delivered.can_transition(Refunded));
        assert!(!Cancelled.can_transition(Pending));
        assert!(!Refunded.can_transition(Paid));
    }

    #[test]
    fn test_terminal_states() {
        use OrderStatus::*;
        for s in [Delivered, Cancelled, Refunded] {
            assert!(s.is_terminal());
        }
        for s in [Pending, Confirmed, Paid, Processing, Shipped] {
            assert!(!s.is_terminal());
        }
    }

    #[test]
    fn test_event_types() {
        assert_eq!(OrderStatus::Pending.event_type(), "order.created");
        assert_eq!(OrderStatus::Paid.event_type(), "order.paid");
        assert_eq!(OrderStatus::Cancelled.event_type(), "order.cancelled");
    }

    #[test]
    fn test_status_roundtrip() {
        use OrderStatus::*;
        for s in [
            Pending, Confirmed, Paid, Processing, Shipped, Delivered, Cancelled, Refunded,
        ] {
            assert_eq!(OrderStatus::from_str(s.as_str()).unwrap(), s);
        }
        assert!(OrderStatus::from_str("unknown").is_err());
    }

    #[test]
    fn test_address_missing_field() {
        let mut addr = ShippingAddress {
            street: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            postal_code: "62704".into(),
            country: "US".into(),
        };
        assert_eq!(addr.first_missing_field(), None);
        addr.city = "  ".into();
        assert_eq!(addr.first_missing_field(), Some("city"));
    }
}
