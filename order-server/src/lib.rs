//! Order Server — transactional order-processing core
//!
//! # Architecture overview
//!
//! The engine behind order intake for a small commerce platform:
//!
//! - **Order intake** (`services/order_service`): validation, server-side
//!   totals, idempotent creation, lifecycle DAG
//! - **Transactional outbox** (`outbox`): domain events written with the
//!   aggregate and published asynchronously with stable dedup ids
//! - **Inventory engine** (`services/inventory_service`): optimistic
//!   reservations with TTL auto-release
//! - **Payment executor** (`services/payment_service`, `payment`): external
//!   provider behind a circuit breaker
//! - **Catalog cache** (`services/catalog_service`, `cache`): read-through
//!   product reads with explicit write invalidation
//!
//! # Module structure
//!
//! ```text
//! order-server/src/
//! ├── core/          # config, state, server, background tasks
//! ├── api/           # HTTP routes and handlers
//! ├── db/            # SQLite pool + per-table repositories
//! ├── cache/         # KV store contract + in-memory impl
//! ├── events/        # broker contract + in-process bus
//! ├── outbox/        # outbox dispatcher worker
//! ├── inventory/     # reservation TTL reaper
//! ├── payment/       # provider trait, mock, circuit breaker
//! ├── services/      # domain services
//! └── utils/         # logging, error re-exports
//! ```

pub mod api;
pub mod cache;
pub mod core;
pub mod db;
pub mod events;
pub mod inventory;
pub mod outbox;
pub mod payment;
pub mod services;
pub mod utils;

// Re-export common types
pub use crate::core::{BackgroundTasks, Config, Server, ServerState};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_level};
