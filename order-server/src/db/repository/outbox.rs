//! Outbox Repository
//!
//! The order/inventory aggregates and the payment aggregate publish through
//! separate tables with identical shape; every function is parameterised by
//! [`OutboxTable`]. Rows are inserted inside the aggregate's transaction and
//! only ever updated by the dispatcher's publish-mark step.

use super::RepoResult;
use shared::models::OutboxEvent;
use sqlx::SqliteConnection;

/// Which physical outbox table to address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxTable {
    Order,
    Payment,
}

impl OutboxTable {
    pub const fn table_name(&self) -> &'static str {
        match self {
            OutboxTable::Order => "outbox",
            OutboxTable::Payment => "payment_outbox",
        }
    }
}

impl std::fmt::Display for OutboxTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: String,
    aggregate_type: String,
    aggregate_id: String,
    event_type: String,
    payload: String,
    published: bool,
    published_at: Option<i64>,
    created_at: i64,
}

impl From<OutboxRow> for OutboxEvent {
    fn from(row: OutboxRow) -> Self {
        OutboxEvent {
            id: row.id,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            event_type: row.event_type,
            payload: serde_json::from_str(&row.payload).unwrap_or(serde_json::Value::Null),
            published: row.published,
            published_at: row.published_at,
            created_at: row.created_at,
        }
    }
}

/// Insert an unpublished event (must run inside the aggregate's transaction)
pub async fn insert(
    conn: &mut SqliteConnection,
    table: OutboxTable,
    event: &OutboxEvent,
) -> RepoResult<()> {
    let sql = format!(
        "INSERT INTO {} (id, aggregate_type, aggregate_id, event_type, payload, published, published_at, created_at) \
         VALUES (?, ?, ?, ?, ?, 0, NULL, ?)",
        table.table_name()
    );
    sqlx::query(&sql)
        .bind(&event.id)
        .bind(&event.aggregate_type)
        .bind(&event.aggregate_id)
        .bind(&event.event_type)
        .bind(event.payload.to_string())
        .bind(event.created_at)
        .execute(conn)
        .await?;
    Ok(())
}

/// Oldest unpublished events, bounded by the dispatcher batch size
pub async fn fetch_unpublished(
    conn: &mut SqliteConnection,
    table: OutboxTable,
    limit: i64,
) -> RepoResult<Vec<OutboxEvent>> {
    let sql = format!(
        "SELECT id, aggregate_type, aggregate_id, event_type, payload, published, published_at, created_at \
         FROM {} WHERE published = 0 ORDER BY created_at ASC, id ASC LIMIT ?",
        table.table_name()
    );
    let rows: Vec<OutboxRow> = sqlx::query_as(&sql).bind(limit).fetch_all(conn).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Mark a row published. A no-op when the row is already marked, which makes
/// racing dispatcher instances safe.
pub async fn mark_published(
    conn: &mut SqliteConnection,
    table: OutboxTable,
    id: &str,
    now: i64,
) -> RepoResult<u64> {
    let sql = format!(
        "UPDATE {} SET published = 1, published_at = ? WHERE id = ? AND published = 0",
        table.table_name()
    );
    let result = sqlx::query(&sql).bind(now).bind(id).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Count unpublished rows (health/backlog introspection)
pub async fn count_unpublished(conn: &mut SqliteConnection, table: OutboxTable) -> RepoResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE published = 0",
        table.table_name()
    );
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(conn).await?;
    Ok(count)
}
