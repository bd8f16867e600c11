//! Event Bus Module
//!
//! Semantic contract of the message broker plus the in-process
//! implementation used by the dispatcher and tests.

mod bus;

pub use bus::{EventBus, EventMessage, MemoryEventBus};
