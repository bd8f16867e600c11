//! Reservation Repository
//!
//! Reservation rows share a reservation_id across products; terminal rows
//! (`committed`, `released`) are never updated again.

use super::{RepoError, RepoResult};
use shared::models::{Reservation, ReservationStatus};
use sqlx::SqliteConnection;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct ReservationRow {
    reservation_id: String,
    product_id: String,
    quantity: i64,
    status: String,
    expires_at: i64,
    created_at: i64,
    updated_at: i64,
}

impl ReservationRow {
    fn into_reservation(self) -> RepoResult<Reservation> {
        let status = ReservationStatus::from_str(&self.status)
            .map_err(|e| RepoError::Database(format!("corrupt reservation row: {e}")))?;
        Ok(Reservation {
            reservation_id: self.reservation_id,
            product_id: self.product_id,
            quantity: self.quantity,
            status,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Insert an active hold
pub async fn insert(conn: &mut SqliteConnection, reservation: &Reservation) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO reservations (reservation_id, product_id, quantity, status, expires_at, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&reservation.reservation_id)
    .bind(&reservation.product_id)
    .bind(reservation.quantity)
    .bind(reservation.status.as_str())
    .bind(reservation.expires_at)
    .bind(reservation.created_at)
    .bind(reservation.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// All active rows sharing a reservation id
pub async fn active_by_id(
    conn: &mut SqliteConnection,
    reservation_id: &str,
) -> RepoResult<Vec<Reservation>> {
    let rows: Vec<ReservationRow> = sqlx::query_as(
        "SELECT reservation_id, product_id, quantity, status, expires_at, created_at, updated_at \
         FROM reservations WHERE reservation_id = ? AND status = 'active'",
    )
    .bind(reservation_id)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(|r| r.into_reservation()).collect()
}

/// All rows sharing a reservation id, any status
pub async fn all_by_id(
    conn: &mut SqliteConnection,
    reservation_id: &str,
) -> RepoResult<Vec<Reservation>> {
    let rows: Vec<ReservationRow> = sqlx::query_as(
        "SELECT reservation_id, product_id, quantity, status, expires_at, created_at, updated_at \
         FROM reservations WHERE reservation_id = ? ORDER BY product_id",
    )
    .bind(reservation_id)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(|r| r.into_reservation()).collect()
}

/// Move every active row of a reservation into a terminal status
pub async fn mark_terminal(
    conn: &mut SqliteConnection,
    reservation_id: &str,
    status: ReservationStatus,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE reservations SET status = ?, updated_at = ? \
         WHERE reservation_id = ? AND status = 'active'",
    )
    .bind(status.as_str())
    .bind(now)
    .bind(reservation_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Mark one specific (reservation, product) row terminal — used by the reaper
pub async fn mark_row_terminal(
    conn: &mut SqliteConnection,
    reservation_id: &str,
    product_id: &str,
    status: ReservationStatus,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE reservations SET status = ?, updated_at = ? \
         WHERE reservation_id = ? AND product_id = ? AND status = 'active'",
    )
    .bind(status.as_str())
    .bind(now)
    .bind(reservation_id)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Active rows whose TTL has lapsed, oldest expiry first
pub async fn expired_active(
    conn: &mut SqliteConnection,
    now: i64,
    limit: i64,
) -> RepoResult<Vec<Reservation>> {
    let rows: Vec<ReservationRow> = sqlx::query_as(
        "SELECT reservation_id, product_id, quantity, status, expires_at, created_at, updated_at \
         FROM reservations WHERE status = 'active' AND expires_at < ? \
         ORDER BY expires_at ASC LIMIT ?",
    )
    .bind(now)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(|r| r.into_reservation()).collect()
}
