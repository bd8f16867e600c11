//! Inventory Reservation Engine
//!
//! Serialises concurrent claims on finite stock with optimistic concurrency:
//! each mutation is a version-conditional UPDATE inside a short transaction,
//! and a lost race surfaces as `InventoryConflict` for the caller's retry
//! policy. Multi-item reservations are all-or-nothing.

use crate::db::repository::outbox::OutboxTable;
use crate::db::repository::{
    RepoError, inventory as inventory_repo, outbox as outbox_repo, reservation as reservation_repo,
};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{InventoryLevel, OutboxEvent, Reservation, ReservationStatus};
use shared::util::now_millis;
use sqlx::SqlitePool;

/// Upper bound on rows touched by one reaper pass
const REAPER_BATCH_SIZE: i64 = 200;

/// One line of a reservation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Stock reservation engine
pub struct InventoryService {
    pool: SqlitePool,
    default_ttl_secs: i64,
}

impl InventoryService {
    pub fn new(pool: SqlitePool, default_ttl_secs: i64) -> Self {
        Self {
            pool,
            default_ttl_secs,
        }
    }

    /// Place a time-bounded hold on stock, all items or none.
    ///
    /// Per item: read the row, check availability, then a conditional
    /// `UPDATE ... WHERE version = ?`. Zero affected rows means a concurrent
    /// writer moved the version and the whole reservation aborts with
    /// `InventoryConflict`.
    pub async fn reserve(
        &self,
        reservation_id: &str,
        items: &[ReserveItem],
        ttl_secs: Option<i64>,
    ) -> AppResult<Vec<Reservation>> {
        if items.is_empty() {
            return Err(AppError::validation("reservation needs at least one item"));
        }
        for item in items {
            if item.quantity < 1 {
                return Err(AppError::validation(format!(
                    "quantity must be >= 1 for product {}",
                    item.product_id
                )));
            }
        }

        let now = now_millis();
        let ttl_secs = ttl_secs.unwrap_or(self.default_ttl_secs).max(1);
        let expires_at = now + ttl_secs * 1000;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let mut reservations = Vec::with_capacity(items.len());
        for item in items {
            let level = inventory_repo::get(&mut tx, &item.product_id)
                .await
                .map_err(|e| reserve_error(e, &item.product_id))?
                .ok_or_else(|| {
                    AppError::new(ErrorCode::InventoryNotFound)
                        .with_detail("product_id", item.product_id.clone())
                })?;

            if level.available < item.quantity {
                return Err(AppError::insufficient_stock(
                    &item.product_id,
                    level.available,
                    item.quantity,
                ));
            }

            let affected = inventory_repo::try_reserve(
                &mut tx,
                &item.product_id,
                item.quantity,
                level.version,
                now,
            )
            .await
            .map_err(|e| reserve_error(e, &item.product_id))?;
            if affected == 0 {
                return Err(AppError::inventory_conflict(&item.product_id));
            }

            let reservation = Reservation {
                reservation_id: reservation_id.to_string(),
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                status: ReservationStatus::Active,
                expires_at,
                created_at: now,
                updated_at: now,
            };
            reservation_repo::insert(&mut tx, &reservation)
                .await
                .map_err(|err| match err {
                    RepoError::Duplicate(_) => AppError::already_exists(format!(
                        "reservation {reservation_id}/{}",
                        item.product_id
                    )),
                    other => other.into(),
                })?;
            reservations.push(reservation);
        }

        let event = OutboxEvent::new(
            "reservation",
            reservation_id.to_string(),
            "stock.reserved",
            serde_json::json!({
                "reservation_id": reservation_id,
                "items": items,
                "expires_at": expires_at,
            }),
        );
        outbox_repo::insert(&mut tx, OutboxTable::Order, &event)
            .await
            .map_err(AppError::from)?;

        tx.commit().await.map_err(|e| {
            let msg = e.to_string();
            if msg.to_lowercase().contains("locked") || msg.to_lowercase().contains("busy") {
                AppError::new(ErrorCode::InventoryConflict)
                    .with_detail("reservation_id", reservation_id)
            } else {
                AppError::database(msg)
            }
        })?;

        tracing::info!(
            reservation_id,
            items = items.len(),
            ttl_secs,
            "Stock reserved"
        );
        Ok(reservations)
    }

    /// Commit a hold: sold goods leave the system.
    ///
    /// Idempotent — with no active rows for the id it returns
    /// `ReservationNotFound` and has no side effect.
    pub async fn commit(&self, reservation_id: &str) -> AppResult<Vec<Reservation>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let active = reservation_repo::active_by_id(&mut tx, reservation_id)
            .await
            .map_err(AppError::from)?;
        if active.is_empty() {
            return Err(AppError::new(ErrorCode::ReservationNotFound)
                .with_detail("reservation_id", reservation_id));
        }

        let now = now_millis();
        for reservation in &active {
            let affected = inventory_repo::commit_reserved(
                &mut tx,
                &reservation.product_id,
                reservation.quantity,
                now,
            )
            .await
            .map_err(AppError::from)?;
            if affected == 0 {
                return Err(AppError::internal(format!(
                    "reserved count drifted for product {}",
                    reservation.product_id
                )));
            }
        }
        reservation_repo::mark_terminal(&mut tx, reservation_id, ReservationStatus::Committed, now)
            .await
            .map_err(AppError::from)?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tracing::info!(reservation_id, rows = active.len(), "Reservation committed");
        Ok(active
            .into_iter()
            .map(|mut r| {
                r.status = ReservationStatus::Committed;
                r.updated_at = now;
                r
            })
            .collect())
    }

    /// Release a hold: quantity returns to available
    pub async fn release(&self, reservation_id: &str) -> AppResult<Vec<Reservation>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let active = reservation_repo::active_by_id(&mut tx, reservation_id)
            .await
            .map_err(AppError::from)?;
        if active.is_empty() {
            return Err(AppError::new(ErrorCode::ReservationNotFound)
                .with_detail("reservation_id", reservation_id));
        }

        let now = now_millis();
        for reservation in &active {
            let affected = inventory_repo::release_reserved(
                &mut tx,
                &reservation.product_id,
                reservation.quantity,
                now,
            )
            .await
            .map_err(AppError::from)?;
            if affected == 0 {
                return Err(AppError::internal(format!(
                    "reserved count drifted for product {}",
                    reservation.product_id
                )));
            }
        }
        reservation_repo::mark_terminal(&mut tx, reservation_id, ReservationStatus::Released, now)
            .await
            .map_err(AppError::from)?;

        let event = OutboxEvent::new(
            "reservation",
            reservation_id.to_string(),
            "stock.released",
            serde_json::json!({
                "reservation_id": reservation_id,
                "items": active
                    .iter()
                    .map(|r| serde_json::json!({
                        "product_id": r.product_id,
                        "quantity": r.quantity,
                    }))
                    .collect::<Vec<_>>(),
                "reason": "released",
            }),
        );
        outbox_repo::insert(&mut tx, OutboxTable::Order, &event)
            .await
            .map_err(AppError::from)?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tracing::info!(reservation_id, rows = active.len(), "Reservation released");
        Ok(active
            .into_iter()
            .map(|mut r| {
                r.status = ReservationStatus::Released;
                r.updated_at = now;
                r
            })
            .collect())
    }

    /// Fresh read of the counters — deliberately bypasses every cache
    pub async fn get_inventory(&self, product_id: &str) -> AppResult<InventoryLevel> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        inventory_repo::get(&mut conn, product_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| {
                AppError::new(ErrorCode::InventoryNotFound).with_detail("product_id", product_id)
            })
    }

    /// All rows of a reservation, any status
    pub async fn get_reservation(&self, reservation_id: &str) -> AppResult<Vec<Reservation>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        let rows = reservation_repo::all_by_id(&mut conn, reservation_id)
            .await
            .map_err(AppError::from)?;
        if rows.is_empty() {
            return Err(AppError::new(ErrorCode::ReservationNotFound)
                .with_detail("reservation_id", reservation_id));
        }
        Ok(rows)
    }

    /// Restocking hook: `total += delta`, `available += delta`, version bump
    pub async fn adjust(
        &self,
        product_id: &str,
        delta: i64,
        reason: &str,
    ) -> AppResult<InventoryLevel> {
        if delta == 0 {
            return Err(AppError::validation("delta must be non-zero"));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        if delta < 0 {
            let level = inventory_repo::get(&mut tx, product_id)
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| {
                    AppError::new(ErrorCode::InventoryNotFound)
                        .with_detail("product_id", product_id)
                })?;
            if level.available + delta < 0 {
                return Err(AppError::insufficient_stock(
                    product_id,
                    level.available,
                    -delta,
                ));
            }
        }

        inventory_repo::adjust(&mut tx, product_id, delta, now_millis())
            .await
            .map_err(AppError::from)?;
        let level = inventory_repo::get(&mut tx, product_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::internal("inventory row vanished after upsert"))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tracing::info!(product_id, delta, reason, "Inventory adjusted");
        Ok(level)
    }

    /// Restore every expired active hold. Returns the number of reservation
    /// rows reaped. Runs as one short transaction per batch so the reaper
    /// never blocks order traffic for long.
    pub async fn reap_expired(&self) -> AppResult<usize> {
        let now = now_millis();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let expired = reservation_repo::expired_active(&mut tx, now, REAPER_BATCH_SIZE)
            .await
            .map_err(AppError::from)?;
        if expired.is_empty() {
            return Ok(0);
        }

        for reservation in &expired {
            let affected = inventory_repo::release_reserved(
                &mut tx,
                &reservation.product_id,
                reservation.quantity,
                now,
            )
            .await
            .map_err(AppError::from)?;
            if affected == 0 {
                tracing::error!(
                    reservation_id = %reservation.reservation_id,
                    product_id = %reservation.product_id,
                    "Reaper found drifted reserved count, skipping row"
                );
                continue;
            }
            reservation_repo::mark_row_terminal(
                &mut tx,
                &reservation.reservation_id,
                &reservation.product_id,
                ReservationStatus::Released,
                now,
            )
            .await
            .map_err(AppError::from)?;

            let event = OutboxEvent::new(
                "reservation",
                reservation.reservation_id.clone(),
                "stock.released",
                serde_json::json!({
                    "reservation_id": reservation.reservation_id,
                    "items": [{
                        "product_id": reservation.product_id,
                        "quantity": reservation.quantity,
                    }],
                    "reason": "expired",
                }),
            );
            outbox_repo::insert(&mut tx, OutboxTable::Order, &event)
                .await
                .map_err(AppError::from)?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tracing::info!(reaped = expired.len(), "Expired reservations released");
        Ok(expired.len())
    }
}

/// Errors inside the reserve transaction: writer contention means a
/// concurrent reservation won the row — surface it as the conflict the
/// caller's retry policy expects, not as an internal fault.
fn reserve_error(err: RepoError, product_id: &str) -> AppError {
    if err.is_contention() {
        AppError::inventory_conflict(product_id)
    } else {
        err.into()
    }
}
