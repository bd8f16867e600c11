//! Inventory API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::core::ServerState;
use crate::services::inventory_service::ReserveItem;
use crate::utils::{AppError, AppResult, ErrorCode};
use shared::models::{InventoryLevel, Reservation};

/// Reserve request body
#[derive(Debug, Deserialize)]
pub struct ReserveBody {
    pub reservation_id: String,
    pub items: Vec<ReserveItem>,
    pub ttl_seconds: Option<i64>,
}

/// Place an all-or-nothing hold on stock
pub async fn reserve(
    State(state): State<ServerState>,
    Json(body): Json<ReserveBody>,
) -> AppResult<Json<Vec<Reservation>>> {
    if body.reservation_id.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            "reservation_id is required",
        ));
    }
    let reservations = state
        .inventory_service
        .reserve(&body.reservation_id, &body.items, body.ttl_seconds)
        .await?;
    Ok(Json(reservations))
}

/// All rows of a reservation, any status
pub async fn get_reservation(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Reservation>>> {
    let reservations = state.inventory_service.get_reservation(&id).await?;
    Ok(Json(reservations))
}

/// Commit a hold — sold goods leave the system
pub async fn commit(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Reservation>>> {
    let reservations = state.inventory_service.commit(&id).await?;
    Ok(Json(reservations))
}

/// Release a hold back to availability
pub async fn release(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Reservation>>> {
    let reservations = state.inventory_service.release(&id).await?;
    Ok(Json(reservations))
}

/// Fresh counters for a product (never cached)
pub async fn get_inventory(
    State(state): State<ServerState>,
    Path(product_id): Path<String>,
) -> AppResult<Json<InventoryLevel>> {
    let level = state.inventory_service.get_inventory(&product_id).await?;
    Ok(Json(level))
}

/// Adjust request body
#[derive(Debug, Deserialize)]
pub struct AdjustBody {
    pub delta: i64,
    pub reason: String,
}

/// Restocking hook: add (or remove) stock
pub async fn adjust(
    State(state): State<ServerState>,
    Path(product_id): Path<String>,
    Json(body): Json<AdjustBody>,
) -> AppResult<Json<InventoryLevel>> {
    let level = state
        .inventory_service
        .adjust(&product_id, body.delta, &body.reason)
        .await?;
    // Stock moved: catalog readers must not see a stale snapshot for long
    state.catalog_service.invalidate_product(&product_id).await;
    Ok(Json(level))
}
