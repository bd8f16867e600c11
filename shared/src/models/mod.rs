//! Domain models shared across the core

pub mod inventory;
pub mod order;
pub mod outbox;
pub mod payment;
pub mod product;

pub use inventory::{InventoryLevel, Reservation, ReservationStatus};
pub use order::{Order, OrderItem, OrderStatus, ShippingAddress};
pub use outbox::OutboxEvent;
pub use payment::{Payment, PaymentStatus};
pub use product::Product;
