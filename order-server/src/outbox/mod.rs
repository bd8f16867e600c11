//! Outbox Module
//!
//! The dispatcher side of the transactional outbox: committed-but-unpublished
//! rows are polled and pushed to the event bus with stable deduplication ids.

mod dispatcher;

pub use dispatcher::OutboxDispatcher;
