//! Inventory Repository
//!
//! Every mutation goes through a version-conditional UPDATE so concurrent
//! writers serialize on the monotonic version column; a zero-row update means
//! the caller lost the race and must surface a conflict.

use super::RepoResult;
use shared::models::InventoryLevel;
use sqlx::SqliteConnection;

#[derive(sqlx::FromRow)]
struct InventoryRow {
    product_id: String,
    available: i64,
    reserved: i64,
    total: i64,
    version: i64,
    updated_at: i64,
}

impl From<InventoryRow> for InventoryLevel {
    fn from(row: InventoryRow) -> Self {
        InventoryLevel {
            product_id: row.product_id,
            available: row.available,
            reserved: row.reserved,
            total: row.total,
            version: row.version,
            updated_at: row.updated_at,
        }
    }
}

/// Read the current counters for a product
pub async fn get(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> RepoResult<Option<InventoryLevel>> {
    let row: Option<InventoryRow> = sqlx::query_as(
        "SELECT product_id, available, reserved, total, version, updated_at \
         FROM inventory WHERE product_id = ?",
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Into::into))
}

/// Move quantity from available to reserved, conditional on the version read
/// by the caller. Returns affected rows; 0 means a concurrent writer won.
pub async fn try_reserve(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    expected_version: i64,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE inventory \
         SET available = available - ?, reserved = reserved + ?, version = version + 1, updated_at = ? \
         WHERE product_id = ? AND version = ? AND available >= ?",
    )
    .bind(quantity)
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .bind(expected_version)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Commit a hold: sold goods leave the system (reserved and total shrink)
pub async fn commit_reserved(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE inventory \
         SET reserved = reserved - ?, total = total - ?, version = version + 1, updated_at = ? \
         WHERE product_id = ? AND reserved >= ?",
    )
    .bind(quantity)
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Release a hold: quantity returns to available
pub async fn release_reserved(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE inventory \
         SET available = available + ?, reserved = reserved - ?, version = version + 1, updated_at = ? \
         WHERE product_id = ? AND reserved >= ?",
    )
    .bind(quantity)
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Restocking hook: upsert the row adding delta to available and total
pub async fn adjust(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
    now: i64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO inventory (product_id, available, reserved, total, version, updated_at) \
         VALUES (?, ?, 0, ?, 1, ?) \
         ON CONFLICT (product_id) DO UPDATE SET \
             available = available + excluded.available, \
             total = total + excluded.total, \
             version = version + 1, \
             updated_at = excluded.updated_at",
    )
    .bind(product_id)
    .bind(delta)
    .bind(delta)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}
