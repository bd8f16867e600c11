//! Shared types for the order-processing core
//!
//! Common types used across crates: domain models, the unified error
//! system, response structures, and small utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Unified error system re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Model re-exports (for convenient access)
pub use models::{
    Order, OrderItem, OrderStatus, OutboxEvent, Payment, PaymentStatus, Product, Reservation,
    ReservationStatus, ShippingAddress,
};
