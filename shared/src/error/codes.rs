//! Unified error codes for the order-processing core
//!
//! This module defines all error codes used across the service and its
//! clients. Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Order errors
//! - 2xxx: Inventory errors
//! - 3xxx: Payment errors
//! - 4xxx: Catalog errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Order ====================
    /// Order not found
    OrderNotFound = 1001,
    /// Order has no items
    OrderEmpty = 1002,
    /// Requested status transition is not allowed by the lifecycle
    InvalidStatusTransition = 1003,
    /// Order is in a terminal state and cannot be cancelled
    OrderNotCancellable = 1004,
    /// Order items carry more than one currency
    CurrencyMismatch = 1005,
    /// Pagination cursor could not be decoded
    InvalidCursor = 1006,
    /// Shipping address is missing required fields
    AddressIncomplete = 1007,

    // ==================== 2xxx: Inventory ====================
    /// No inventory row for the product
    InventoryNotFound = 2001,
    /// Available quantity is lower than the requested quantity
    InsufficientStock = 2002,
    /// Optimistic version check lost against a concurrent writer
    InventoryConflict = 2003,
    /// No active reservation for the id
    ReservationNotFound = 2004,

    // ==================== 3xxx: Payment ====================
    /// Payment not found
    PaymentNotFound = 3001,
    /// Payment is not in the pending state
    PaymentNotPending = 3002,
    /// Provider declined the payment (final business outcome)
    PaymentDeclined = 3003,
    /// Circuit breaker is open, provider was not invoked
    CircuitOpen = 3004,
    /// Payment is not in a refundable state
    PaymentNotRefundable = 3005,

    // ==================== 4xxx: Catalog ====================
    /// Product not found
    ProductNotFound = 4001,
    /// Product has invalid price
    ProductInvalidPrice = 4002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Cache backend error
    CacheError = 9003,
    /// Event publish error
    PublishError = 9004,
    /// Dependency temporarily unavailable, retry later
    Unavailable = 9005,
    /// Operation timeout
    TimeoutError = 9006,
    /// Resource pool exhausted
    ResourceExhausted = 9007,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order has no items",
            ErrorCode::InvalidStatusTransition => "Status transition is not allowed",
            ErrorCode::OrderNotCancellable => "Order cannot be cancelled in its current state",
            ErrorCode::CurrencyMismatch => "Order items carry more than one currency",
            ErrorCode::InvalidCursor => "Pagination cursor is invalid",
            ErrorCode::AddressIncomplete => "Shipping address is incomplete",

            // Inventory
            ErrorCode::InventoryNotFound => "No inventory for product",
            ErrorCode::InsufficientStock => "Insufficient stock",
            ErrorCode::InventoryConflict => "Inventory was modified concurrently, retry",
            ErrorCode::ReservationNotFound => "Reservation not found",

            // Payment
            ErrorCode::PaymentNotFound => "Payment not found",
            ErrorCode::PaymentNotPending => "Payment is not pending",
            ErrorCode::PaymentDeclined => "Payment was declined by the provider",
            ErrorCode::CircuitOpen => "Payment provider circuit is open",
            ErrorCode::PaymentNotRefundable => "Payment is not refundable",

            // Catalog
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductInvalidPrice => "Product has invalid price",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::CacheError => "Cache backend error",
            ErrorCode::PublishError => "Event publish failed",
            ErrorCode::Unavailable => "Service temporarily unavailable",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ResourceExhausted => "Resource pool exhausted",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Order
            1001 => Ok(ErrorCode::OrderNotFound),
            1002 => Ok(ErrorCode::OrderEmpty),
            1003 => Ok(ErrorCode::InvalidStatusTransition),
            1004 => Ok(ErrorCode::OrderNotCancellable),
            1005 => Ok(ErrorCode::CurrencyMismatch),
            1006 => Ok(ErrorCode::InvalidCursor),
            1007 => Ok(ErrorCode::AddressIncomplete),

            // Inventory
            2001 => Ok(ErrorCode::InventoryNotFound),
            2002 => Ok(ErrorCode::InsufficientStock),
            2003 => Ok(ErrorCode::InventoryConflict),
            2004 => Ok(ErrorCode::ReservationNotFound),

            // Payment
            3001 => Ok(ErrorCode::PaymentNotFound),
            3002 => Ok(ErrorCode::PaymentNotPending),
            3003 => Ok(ErrorCode::PaymentDeclined),
            3004 => Ok(ErrorCode::CircuitOpen),
            3005 => Ok(ErrorCode::PaymentNotRefundable),

            // Catalog
            4001 => Ok(ErrorCode::ProductNotFound),
            4002 => Ok(ErrorCode::ProductInvalidPrice),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::CacheError),
            9004 => Ok(ErrorCode::PublishError),
            9005 => Ok(ErrorCode::Unavailable),
            9006 => Ok(ErrorCode::TimeoutError),
            9007 => Ok(ErrorCode::ResourceExhausted),

            other => Err(InvalidErrorCode(other)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for code in [
            ErrorCode::Success,
            ErrorCode::ValidationFailed,
            ErrorCode::OrderNotFound,
            ErrorCode::InsufficientStock,
            ErrorCode::InventoryConflict,
            ErrorCode::CircuitOpen,
            ErrorCode::DatabaseError,
            ErrorCode::ResourceExhausted,
        ] {
            let value = code.code();
            assert_eq!(ErrorCode::try_from(value), Ok(code));
        }
    }

    #[test]
    fn test_invalid_code() {
        assert_eq!(ErrorCode::try_from(7777), Err(InvalidErrorCode(7777)));
    }

    #[test]
    fn test_serde_as_u16() {
        let json = serde_json::to_string(&ErrorCode::InventoryConflict).unwrap();
        assert_eq!(json, "2003");
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::InventoryConflict);
    }
}
