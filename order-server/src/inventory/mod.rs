//! Inventory Module
//!
//! The TTL reaper that returns expired holds to availability. The engine
//! itself lives in `services::inventory_service`.

mod reaper;

pub use reaper::ReservationReaper;
