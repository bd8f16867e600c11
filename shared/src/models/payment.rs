//! Payment Model

use serde::{Deserialize, Serialize};

/// Payment lifecycle status
///
/// `pending -> processing -> succeeded | failed`; `cancelled` only from
/// `pending`; `refunded` only from `succeeded` via the explicit refund flow.
/// Terminal states are otherwise immutable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Whether `self -> to` is a legal transition
    pub fn can_transition(&self, to: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Succeeded)
                | (Processing, Failed)
                | (Succeeded, Refunded)
        )
    }

    pub fn is_terminal(&self) -> bool {
        use PaymentStatus::*;
        matches!(self, Failed | Cancelled | Refunded)
    }

    pub fn as_str(&self) -> &'static str {
        use PaymentStatus::*;
        match self {
            Pending => "pending",
            Processing => "processing",
            Succeeded => "succeeded",
            Failed => "failed",
            Cancelled => "cancelled",
            Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use PaymentStatus::*;
        match s {
            "pending" => Ok(Pending),
            "processing" => Ok(Processing),
            "succeeded" => Ok(Succeeded),
            "failed" => Ok(Failed),
            "cancelled" => Ok(Cancelled),
            "refunded" => Ok(Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment entity
///
/// References its order by id only; the order references the payment by id
/// only. Neither aggregate holds the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: String,
    pub provider_txn_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
