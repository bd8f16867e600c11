//! Payment API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::ServerState;
use crate::services::payment_service::CreatePaymentRequest;
use crate::utils::{AppError, AppResult};
use shared::models::Payment;

/// CreatePayment request body
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentBody {
    #[validate(length(min = 1, message = "idempotency_key is required"))]
    pub idempotency_key: String,
    #[validate(length(min = 1, message = "order_id is required"))]
    pub order_id: String,
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount_minor: i64,
    #[validate(length(min = 3, max = 3, message = "currency must be ISO 4217"))]
    pub currency: String,
    #[validate(length(min = 1, message = "method is required"))]
    pub method: String,
}

/// CreatePayment response: the payment plus whether this was a replay
#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub payment: Payment,
    pub from_cache: bool,
}

/// Create a pending payment (idempotent on user + idempotency_key)
pub async fn create(
    State(state): State<ServerState>,
    Json(body): Json<CreatePaymentBody>,
) -> AppResult<Json<CreatePaymentResponse>> {
    body.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let (payment, from_cache) = state
        .payment_service
        .create_payment(CreatePaymentRequest {
            order_id: body.order_id,
            user_id: body.user_id,
            amount_minor: body.amount_minor,
            currency: body.currency,
            method: body.method,
            idempotency_key: body.idempotency_key,
        })
        .await?;
    if !from_cache {
        // The order carries the payment by reference only
        state
            .order_service
            .set_payment_ref(&payment.order_id, &payment.id)
            .await?;
    }
    Ok(Json(CreatePaymentResponse {
        payment,
        from_cache,
    }))
}

/// Get payment by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Payment>> {
    let payment = state.payment_service.get_payment(&id).await?;
    Ok(Json(payment))
}

/// Execute the payment through the provider under the circuit breaker.
///
/// A provider decline is a final outcome: the call succeeds and the payload
/// carries `status = "failed"` with the error text.
pub async fn confirm(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Payment>> {
    let payment = state.payment_service.confirm_payment(&id).await?;
    Ok(Json(payment))
}

/// Cancel a pending payment
pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Payment>> {
    let payment = state.payment_service.cancel_payment(&id).await?;
    Ok(Json(payment))
}

/// Refund a succeeded payment
pub async fn refund(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Payment>> {
    let payment = state.payment_service.refund_payment(&id).await?;
    Ok(Json(payment))
}
