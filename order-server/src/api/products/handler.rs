//! Product API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::core::ServerState;
use crate::services::catalog_service::{ListProductsParams, ProductPage};
use crate::utils::AppResult;
use shared::models::Product;
use shared::models::product::{ProductCreate, ProductUpdate};

/// List products (cached per canonical query)
pub async fn list(
    State(state): State<ServerState>,
    Query(params): Query<ListProductsParams>,
) -> AppResult<Json<ProductPage>> {
    let page = state.catalog_service.list_products(params).await?;
    Ok(Json(page))
}

/// Get product by id (read-through cache)
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Product>> {
    let product = state.catalog_service.get_product(&id).await?;
    Ok(Json(product))
}

/// Create a product
pub async fn create(
    State(state): State<ServerState>,
    Json(body): Json<ProductCreate>,
) -> AppResult<Json<Product>> {
    let product = state.catalog_service.create_product(body).await?;
    Ok(Json(product))
}

/// Update a product
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(body): Json<ProductUpdate>,
) -> AppResult<Json<Product>> {
    let product = state.catalog_service.update_product(&id, body).await?;
    Ok(Json(product))
}

/// Stock update body
#[derive(Debug, Deserialize)]
pub struct UpdateStockBody {
    pub delta: i64,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "restock".to_string()
}

/// Adjust stock through the catalog surface; the inventory engine owns the
/// counters, the catalog only invalidates its snapshot
pub async fn update_stock(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStockBody>,
) -> AppResult<Json<shared::models::InventoryLevel>> {
    let level = state
        .inventory_service
        .adjust(&id, body.delta, &body.reason)
        .await?;
    state.catalog_service.invalidate_product(&id).await;
    Ok(Json(level))
}
