//! Inventory API Module

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Inventory router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/inventory", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/reservations", post(handler::reserve))
        .route("/reservations/{id}", get(handler::get_reservation))
        .route("/reservations/{id}/commit", post(handler::commit))
        .route("/reservations/{id}/release", post(handler::release))
        .route("/{product_id}", get(handler::get_inventory))
        .route("/{product_id}/adjust", post(handler::adjust))
}
