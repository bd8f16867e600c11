//! HTTP API Module
//!
//! One sub-module per resource, each exposing `router()`. Handlers are
//! thin: extract, call the service, map to JSON; every error funnels
//! through `AppError`'s `IntoResponse`.

pub mod health;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;

use crate::core::ServerState;
use axum::Router;

/// Compose the full API surface
pub fn router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(inventory::router())
        .merge(products::router())
}
