//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::ServerState;
use crate::services::order_service::{
    CreateOrderRequest, ListOrdersParams, NewOrderItem, OrderPage,
};
use crate::utils::{AppError, AppResult, ErrorCode};
use shared::models::{Order, OrderStatus, ShippingAddress};
use std::str::FromStr;

/// CreateOrder request body
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderBody {
    #[validate(length(min = 1, message = "idempotency_key is required"))]
    pub idempotency_key: String,
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<NewOrderItem>,
    pub shipping_address: ShippingAddress,
}

/// CreateOrder response: the order plus whether this was a replay
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: Order,
    pub from_cache: bool,
}

/// Create an order (idempotent on user + idempotency_key)
pub async fn create(
    State(state): State<ServerState>,
    Json(body): Json<CreateOrderBody>,
) -> AppResult<Json<CreateOrderResponse>> {
    body.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let (order, from_cache) = state
        .order_service
        .create_order(CreateOrderRequest {
            user_id: body.user_id,
            items: body.items,
            shipping_address: body.shipping_address,
            idempotency_key: body.idempotency_key,
        })
        .await?;
    Ok(Json(CreateOrderResponse { order, from_cache }))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state.order_service.get_order(&id).await?;
    Ok(Json(order))
}

/// Query params for listing orders
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: String,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// List a user's orders (keyset-paginated, newest first)
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<OrderPage>> {
    let status = query
        .status
        .as_deref()
        .map(OrderStatus::from_str)
        .transpose()
        .map_err(|e| AppError::validation(e))?;
    let page = state
        .order_service
        .list_orders(ListOrdersParams {
            user_id: query.user_id,
            status,
            limit: query.limit,
            cursor: query.cursor,
        })
        .await?;
    Ok(Json(page))
}

/// Cancel request body
#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub reason: String,
}

/// Cancel an order with a reason
pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(body): Json<CancelBody>,
) -> AppResult<Json<Order>> {
    if body.reason.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            "reason is required",
        ));
    }
    let order = state.order_service.cancel_order(&id, &body.reason).await?;
    Ok(Json(order))
}

/// Status update body (admin surface)
#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

/// Drive an order along the lifecycle DAG
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> AppResult<Json<Order>> {
    let status = OrderStatus::from_str(&body.status).map_err(|e| AppError::validation(e))?;
    let order = state.order_service.update_status(&id, status).await?;
    Ok(Json(order))
}
