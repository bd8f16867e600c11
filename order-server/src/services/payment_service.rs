//! Payment Executor
//!
//! Drives payments through the external provider under the circuit breaker
//! and records the outcome durably. A provider decline is a final business
//! outcome — it is persisted, a `payment.failed` event is emitted, and the
//! call returns the payment rather than an error, so schedulers never retry
//! a settled result.

use crate::db::repository::outbox::OutboxTable;
use crate::db::repository::{outbox as outbox_repo, payment as payment_repo};
use crate::payment::{
    BreakerError, ChargeRequest, CircuitBreaker, PaymentProvider, ProviderError,
};
use crate::services::idempotency::IdempotencyStore;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{OutboxEvent, Payment, PaymentStatus};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;
use std::sync::Arc;

const OPERATION: &str = "create_payment";

/// CreatePayment input
#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub user_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub method: String,
    pub idempotency_key: String,
}

/// Payment execution service
pub struct PaymentService {
    pool: SqlitePool,
    idempotency: Arc<IdempotencyStore>,
    provider: Arc<dyn PaymentProvider>,
    breaker: Arc<CircuitBreaker>,
}

impl PaymentService {
    pub fn new(
        pool: SqlitePool,
        idempotency: Arc<IdempotencyStore>,
        provider: Arc<dyn PaymentProvider>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            pool,
            idempotency,
            provider,
            breaker,
        }
    }

    /// Insert a pending payment, at most once per (user, idempotency key)
    pub async fn create_payment(&self, req: CreatePaymentRequest) -> AppResult<(Payment, bool)> {
        validate_create(&req)?;

        let fingerprint =
            IdempotencyStore::fingerprint(&req.user_id, OPERATION, &req.idempotency_key);
        if let Some(record) = self.idempotency.lookup(&fingerprint).await {
            if let Ok(payment) = serde_json::from_slice::<Payment>(&record.body) {
                return Ok((payment, true));
            }
        }

        let now = now_millis();
        let payment = Payment {
            id: new_id(),
            order_id: req.order_id.clone(),
            user_id: req.user_id.clone(),
            amount_minor: req.amount_minor,
            currency: req.currency.clone(),
            status: PaymentStatus::Pending,
            method: req.method.clone(),
            provider_txn_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.acquire().await?;
        match payment_repo::insert(&mut conn, &payment, &req.idempotency_key).await {
            Ok(()) => {}
            Err(err) if err.is_duplicate() => {
                let existing = payment_repo::find_by_idempotency_key(
                    &mut conn,
                    &req.user_id,
                    &req.idempotency_key,
                )
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| AppError::internal("duplicate payment row vanished"))?;
                return Ok((existing, true));
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            amount_minor = payment.amount_minor,
            "Payment created"
        );

        let canonical = serde_json::to_vec(&payment)
            .map_err(|e| AppError::internal(format!("unserializable payment: {e}")))?;
        self.idempotency.store(&fingerprint, 200, canonical).await;

        Ok((payment, false))
    }

    /// Get a payment by id
    pub async fn get_payment(&self, id: &str) -> AppResult<Payment> {
        let mut conn = self.acquire().await?;
        payment_repo::get(&mut conn, id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::new(ErrorCode::PaymentNotFound).with_detail("id", id))
    }

    /// Execute a pending payment through the provider.
    ///
    /// Idempotent replay: a payment that already left `pending` is returned
    /// unchanged. When the breaker is open the payment reverts to `pending`
    /// and the call surfaces `CircuitOpen` with a retry-after hint — no
    /// provider invocation happened, so a later confirm may retry.
    pub async fn confirm_payment(&self, id: &str) -> AppResult<Payment> {
        let mut conn = self.acquire().await?;

        let payment = payment_repo::get(&mut conn, id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::new(ErrorCode::PaymentNotFound).with_detail("id", id))?;

        if payment.status != PaymentStatus::Pending {
            tracing::debug!(payment_id = %id, status = %payment.status, "ConfirmPayment replay");
            return Ok(payment);
        }

        let claimed = payment_repo::begin_processing(&mut conn, id, now_millis())
            .await
            .map_err(AppError::from)?;
        if claimed == 0 {
            // A concurrent confirm claimed the row first; return its outcome
            return payment_repo::get(&mut conn, id)
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| AppError::new(ErrorCode::PaymentNotFound).with_detail("id", id));
        }
        drop(conn);

        let request = ChargeRequest {
            payment_id: payment.id.clone(),
            order_id: payment.order_id.clone(),
            user_id: payment.user_id.clone(),
            amount_minor: payment.amount_minor,
            currency: payment.currency.clone(),
            method: payment.method.clone(),
        };
        let provider = self.provider.clone();
        let result = self
            .breaker
            .call(|| async move { provider.process_payment(&request).await })
            .await;

        match result {
            Ok(receipt) => self.record_success(&payment, &receipt.transaction_id).await,
            Err(BreakerError::Open { retry_after }) => {
                // No provider call was made; put the row back so a later
                // confirm can run once the circuit recovers.
                let mut conn = self.acquire().await?;
                payment_repo::revert_processing(&mut conn, id, now_millis())
                    .await
                    .map_err(AppError::from)?;
                tracing::warn!(payment_id = %id, "ConfirmPayment rejected, circuit open");
                Err(AppError::circuit_open(retry_after.as_secs().max(1)))
            }
            Err(BreakerError::Timeout) => {
                self.record_failure(&payment, "provider call timed out").await
            }
            Err(BreakerError::Service(err)) => {
                let reason = match &err {
                    ProviderError::Declined(reason) => reason.clone(),
                    ProviderError::Unavailable(reason) => reason.clone(),
                };
                self.record_failure(&payment, &reason).await
            }
        }
    }

    /// Cancel a pending payment
    pub async fn cancel_payment(&self, id: &str) -> AppResult<Payment> {
        let mut conn = self.acquire().await?;
        let payment = payment_repo::get(&mut conn, id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::new(ErrorCode::PaymentNotFound).with_detail("id", id))?;

        let affected = payment_repo::cancel(&mut conn, id, now_millis())
            .await
            .map_err(AppError::from)?;
        if affected == 0 {
            return Err(AppError::new(ErrorCode::PaymentNotPending)
                .with_detail("status", payment.status.as_str()));
        }
        tracing::info!(payment_id = %id, "Payment cancelled");
        self.get_payment(id).await
    }

    /// Refund a succeeded payment through the provider's refund capability
    pub async fn refund_payment(&self, id: &str) -> AppResult<Payment> {
        let mut conn = self.acquire().await?;
        let payment = payment_repo::get(&mut conn, id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::new(ErrorCode::PaymentNotFound).with_detail("id", id))?;
        drop(conn);

        if payment.status != PaymentStatus::Succeeded {
            return Err(AppError::new(ErrorCode::PaymentNotRefundable)
                .with_detail("status", payment.status.as_str()));
        }
        let provider_txn_id = payment
            .provider_txn_id
            .clone()
            .ok_or_else(|| AppError::internal("succeeded payment missing provider txn id"))?;

        let provider = self.provider.clone();
        let amount = payment.amount_minor;
        let result = self
            .breaker
            .call(|| async move { provider.refund_payment(&provider_txn_id, amount).await })
            .await;

        match result {
            Ok(_receipt) => {
                let now = now_millis();
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| AppError::database(e.to_string()))?;
                let affected = payment_repo::refund(&mut tx, id, now)
                    .await
                    .map_err(AppError::from)?;
                if affected == 0 {
                    return Err(AppError::new(ErrorCode::PaymentNotRefundable)
                        .with_detail("id", id));
                }
                let event = OutboxEvent::new(
                    "payment",
                    id.to_string(),
                    "payment.refunded",
                    serde_json::json!({
                        "payment_id": id,
                        "order_id": payment.order_id,
                        "user_id": payment.user_id,
                        "amount_minor": payment.amount_minor,
                        "currency": payment.currency,
                    }),
                );
                outbox_repo::insert(&mut tx, OutboxTable::Payment, &event)
                    .await
                    .map_err(AppError::from)?;
                tx.commit()
                    .await
                    .map_err(|e| AppError::database(e.to_string()))?;

                tracing::info!(payment_id = %id, "Payment refunded");
                self.get_payment(id).await
            }
            Err(BreakerError::Open { retry_after }) => {
                Err(AppError::circuit_open(retry_after.as_secs().max(1)))
            }
            Err(BreakerError::Timeout) => {
                Err(AppError::unavailable("provider refund call timed out"))
            }
            Err(BreakerError::Service(err)) => Err(AppError::unavailable(err.to_string())),
        }
    }

    /// processing -> succeeded + `payment.succeeded` outbox row, one tx
    async fn record_success(&self, payment: &Payment, provider_txn_id: &str) -> AppResult<Payment> {
        let now = now_millis();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let affected = payment_repo::record_success(&mut tx, &payment.id, provider_txn_id, now)
            .await
            .map_err(AppError::from)?;
        if affected == 0 {
            return Err(AppError::internal("payment left processing unexpectedly"));
        }

        let event = OutboxEvent::new(
            "payment",
            payment.id.clone(),
            "payment.succeeded",
            serde_json::json!({
                "payment_id": payment.id,
                "order_id": payment.order_id,
                "user_id": payment.user_id,
                "amount_minor": payment.amount_minor,
                "currency": payment.currency,
                "provider_txn_id": provider_txn_id,
            }),
        );
        outbox_repo::insert(&mut tx, OutboxTable::Payment, &event)
            .await
            .map_err(AppError::from)?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tracing::info!(payment_id = %payment.id, provider_txn_id, "Payment succeeded");
        self.get_payment(&payment.id).await
    }

    /// processing -> failed + `payment.failed` outbox row, one tx.
    ///
    /// The outcome is final: it is returned as a successful call whose
    /// payload records the failure, never re-raised as retryable.
    async fn record_failure(&self, payment: &Payment, reason: &str) -> AppResult<Payment> {
        let now = now_millis();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let affected = payment_repo::record_failure(&mut tx, &payment.id, reason, now)
            .await
            .map_err(AppError::from)?;
        if affected == 0 {
            return Err(AppError::internal("payment left processing unexpectedly"));
        }

        let event = OutboxEvent::new(
            "payment",
            payment.id.clone(),
            "payment.failed",
            serde_json::json!({
                "payment_id": payment.id,
                "order_id": payment.order_id,
                "user_id": payment.user_id,
                "amount_minor": payment.amount_minor,
                "currency": payment.currency,
                "error": reason,
            }),
        );
        outbox_repo::insert(&mut tx, OutboxTable::Payment, &event)
            .await
            .map_err(AppError::from)?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tracing::warn!(payment_id = %payment.id, reason, "Payment failed");
        self.get_payment(&payment.id).await
    }

    async fn acquire(&self) -> AppResult<sqlx::pool::PoolConnection<sqlx::Sqlite>> {
        self.pool.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => {
                AppError::with_message(ErrorCode::ResourceExhausted, "connection pool exhausted")
            }
            other => AppError::database(other.to_string()),
        })
    }
}

fn validate_create(req: &CreatePaymentRequest) -> AppResult<()> {
    if req.order_id.trim().is_empty() || req.user_id.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            "order_id and user_id are required",
        ));
    }
    if req.idempotency_key.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            "idempotency_key is required",
        ));
    }
    if req.amount_minor <= 0 {
        return Err(AppError::validation("amount must be positive"));
    }
    if req.method.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            "method is required",
        ));
    }
    Ok(())
}
