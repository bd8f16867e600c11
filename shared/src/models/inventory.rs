//! Inventory Models
//!
//! One inventory row per product. The row invariant
//! `available + reserved = total` holds at every commit point; `version`
//! strictly increases on every mutation and is the unit of optimistic
//! concurrency.

use serde::{Deserialize, Serialize};

/// Per-product stock counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub product_id: String,
    pub available: i64,
    pub reserved: i64,
    pub total: i64,
    pub version: i64,
    pub updated_at: i64,
}

/// Reservation status
///
/// Exactly one terminal transition per reservation; `committed` and
/// `released` rows are immutable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[default]
    Active,
    Committed,
    Released,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Committed => "committed",
            ReservationStatus::Released => "released",
        }
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ReservationStatus::Active),
            "committed" => Ok(ReservationStatus::Committed),
            "released" => Ok(ReservationStatus::Released),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

/// A time-bounded hold on inventory
///
/// `reservation_id` is externally meaningful (typically the order id); a
/// multi-item reservation is several rows sharing the id, one per product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub status: ReservationStatus,
    pub expires_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_reservation_status_roundtrip() {
        for s in [
            ReservationStatus::Active,
            ReservationStatus::Committed,
            ReservationStatus::Released,
        ] {
            assert_eq!(ReservationStatus::from_str(s.as_str()).unwrap(), s);
        }
    }
}
