//! Payment Repository
//!
//! Status transitions are guarded in SQL (`UPDATE ... WHERE status = ?`) so
//! concurrent drivers collapse to a single winner; a zero-row update tells
//! the caller the payment already moved on.

use super::{RepoError, RepoResult};
use shared::models::{Payment, PaymentStatus};
use sqlx::SqliteConnection;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: String,
    order_id: String,
    user_id: String,
    amount_minor: i64,
    currency: String,
    status: String,
    method: String,
    provider_txn_id: Option<String>,
    error_message: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl PaymentRow {
    fn into_payment(self) -> RepoResult<Payment> {
        let status = PaymentStatus::from_str(&self.status)
            .map_err(|e| RepoError::Database(format!("corrupt payment row: {e}")))?;
        Ok(Payment {
            id: self.id,
            order_id: self.order_id,
            user_id: self.user_id,
            amount_minor: self.amount_minor,
            currency: self.currency,
            status,
            method: self.method,
            provider_txn_id: self.provider_txn_id,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, order_id, user_id, amount_minor, currency, status, method, provider_txn_id, error_message, created_at, updated_at";

/// Insert a pending payment
pub async fn insert(
    conn: &mut SqliteConnection,
    payment: &Payment,
    idempotency_key: &str,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO payments (id, order_id, user_id, amount_minor, currency, status, method, provider_txn_id, error_message, idempotency_key, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&payment.id)
    .bind(&payment.order_id)
    .bind(&payment.user_id)
    .bind(payment.amount_minor)
    .bind(&payment.currency)
    .bind(payment.status.as_str())
    .bind(&payment.method)
    .bind(&payment.provider_txn_id)
    .bind(&payment.error_message)
    .bind(idempotency_key)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Get a payment by id
pub async fn get(conn: &mut SqliteConnection, id: &str) -> RepoResult<Option<Payment>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM payments WHERE id = ?");
    let row: Option<PaymentRow> = sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;
    row.map(|r| r.into_payment()).transpose()
}

/// Look up a payment by its dedupe key
pub async fn find_by_idempotency_key(
    conn: &mut SqliteConnection,
    user_id: &str,
    idempotency_key: &str,
) -> RepoResult<Option<Payment>> {
    let sql =
        format!("SELECT {SELECT_COLUMNS} FROM payments WHERE user_id = ? AND idempotency_key = ?");
    let row: Option<PaymentRow> = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(idempotency_key)
        .fetch_optional(conn)
        .await?;
    row.map(|r| r.into_payment()).transpose()
}

/// pending -> processing. Returns 0 when the payment was not pending.
pub async fn begin_processing(conn: &mut SqliteConnection, id: &str, now: i64) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE payments SET status = 'processing', updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// processing -> pending. Used when the breaker rejects before any provider
/// call so a later confirm can retry.
pub async fn revert_processing(conn: &mut SqliteConnection, id: &str, now: i64) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE payments SET status = 'pending', updated_at = ? WHERE id = ? AND status = 'processing'",
    )
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// processing -> succeeded, recording the provider transaction id
pub async fn record_success(
    conn: &mut SqliteConnection,
    id: &str,
    provider_txn_id: &str,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE payments SET status = 'succeeded', provider_txn_id = ?, error_message = NULL, updated_at = ? \
         WHERE id = ? AND status = 'processing'",
    )
    .bind(provider_txn_id)
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// processing -> failed, recording the provider error text
pub async fn record_failure(
    conn: &mut SqliteConnection,
    id: &str,
    error_message: &str,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE payments SET status = 'failed', error_message = ?, updated_at = ? \
         WHERE id = ? AND status = 'processing'",
    )
    .bind(error_message)
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// pending -> cancelled
pub async fn cancel(conn: &mut SqliteConnection, id: &str, now: i64) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE payments SET status = 'cancelled', updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// succeeded -> refunded
pub async fn refund(conn: &mut SqliteConnection, id: &str, now: i64) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE payments SET status = 'refunded', updated_at = ? WHERE id = ? AND status = 'succeeded'",
    )
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
