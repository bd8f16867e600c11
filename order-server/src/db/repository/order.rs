//! Order Repository
//!
//! Order header + item snapshot rows. All mutations run inside a caller-owned
//! transaction together with their outbox row.

use super::{RepoError, RepoResult};
use shared::models::{Order, OrderItem, OrderStatus, ShippingAddress};
use sqlx::SqliteConnection;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    status: String,
    total_minor: i64,
    currency: String,
    payment_id: Option<String>,
    shipping_address: String,
    cancel_reason: Option<String>,
    created_at: i64,
    updated_at: i64,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    product_id: String,
    name: String,
    unit_price_minor: i64,
    currency: String,
    quantity: i64,
    total_price_minor: i64,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> RepoResult<Order> {
        let status = OrderStatus::from_str(&self.status)
            .map_err(|e| RepoError::Database(format!("corrupt order row: {e}")))?;
        let shipping_address: ShippingAddress = serde_json::from_str(&self.shipping_address)
            .map_err(|e| RepoError::Database(format!("corrupt shipping address: {e}")))?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            status,
            total_minor: self.total_minor,
            currency: self.currency,
            payment_id: self.payment_id,
            shipping_address,
            items,
            cancel_reason: self.cancel_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        OrderItem {
            product_id: row.product_id,
            name: row.name,
            unit_price_minor: row.unit_price_minor,
            currency: row.currency,
            quantity: row.quantity,
            total_price_minor: row.total_price_minor,
        }
    }
}

/// Insert order header and item snapshots
pub async fn insert(
    conn: &mut SqliteConnection,
    order: &Order,
    idempotency_key: &str,
) -> RepoResult<()> {
    let address_json = serde_json::to_string(&order.shipping_address)
        .map_err(|e| RepoError::Validation(format!("unserializable address: {e}")))?;

    sqlx::query(
        "INSERT INTO orders (id, user_id, status, total_minor, currency, payment_id, shipping_address, idempotency_key, cancel_reason, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(order.status.as_str())
    .bind(order.total_minor)
    .bind(&order.currency)
    .bind(&order.payment_id)
    .bind(&address_json)
    .bind(idempotency_key)
    .bind(&order.cancel_reason)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for item in &order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, name, unit_price_minor, currency, quantity, total_price_minor) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.unit_price_minor)
        .bind(&item.currency)
        .bind(item.quantity)
        .bind(item.total_price_minor)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn load_items(conn: &mut SqliteConnection, order_id: &str) -> RepoResult<Vec<OrderItem>> {
    let rows: Vec<ItemRow> = sqlx::query_as(
        "SELECT product_id, name, unit_price_minor, currency, quantity, total_price_minor \
         FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Get a full order with items
pub async fn get(conn: &mut SqliteConnection, id: &str) -> RepoResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(
        "SELECT id, user_id, status, total_minor, currency, payment_id, shipping_address, cancel_reason, created_at, updated_at \
         FROM orders WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let items = load_items(conn, id).await?;
            Ok(Some(row.into_order(items)?))
        }
        None => Ok(None),
    }
}

/// Look up an order by its definitive dedupe key
pub async fn find_by_idempotency_key(
    conn: &mut SqliteConnection,
    user_id: &str,
    idempotency_key: &str,
) -> RepoResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(
        "SELECT id, user_id, status, total_minor, currency, payment_id, shipping_address, cancel_reason, created_at, updated_at \
         FROM orders WHERE user_id = ? AND idempotency_key = ?",
    )
    .bind(user_id)
    .bind(idempotency_key)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let id = row.id.clone();
            let items = load_items(conn, &id).await?;
            Ok(Some(row.into_order(items)?))
        }
        None => Ok(None),
    }
}

/// Keyset page of orders for a user, newest first.
///
/// `after` is the strict upper bound `(created_at, id)` taken from the last
/// row of the previous page, so pages stay stable under concurrent inserts.
pub async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: &str,
    status: Option<OrderStatus>,
    after: Option<(i64, String)>,
    limit: i64,
) -> RepoResult<Vec<Order>> {
    let mut sql = String::from(
        "SELECT id, user_id, status, total_minor, currency, payment_id, shipping_address, cancel_reason, created_at, updated_at \
         FROM orders WHERE user_id = ?",
    );
    if status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if after.is_some() {
        sql.push_str(" AND (created_at < ? OR (created_at = ? AND id < ?))");
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");

    let mut query = sqlx::query_as::<_, OrderRow>(&sql).bind(user_id);
    if let Some(status) = status {
        query = query.bind(status.as_str());
    }
    if let Some((created_at, id)) = &after {
        query = query.bind(created_at).bind(created_at).bind(id);
    }
    let rows = query.bind(limit).fetch_all(&mut *conn).await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.id.clone();
        let items = load_items(conn, &id).await?;
        orders.push(row.into_order(items)?);
    }
    Ok(orders)
}

/// Update order status (and cancel reason, when provided)
pub async fn update_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: OrderStatus,
    cancel_reason: Option<&str>,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE orders SET status = ?, cancel_reason = COALESCE(?, cancel_reason), updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(cancel_reason)
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Attach a payment reference to an order (by id only, never the row itself)
pub async fn set_payment_ref(
    conn: &mut SqliteConnection,
    order_id: &str,
    payment_id: &str,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query("UPDATE orders SET payment_id = ?, updated_at = ? WHERE id = ?")
        .bind(payment_id)
        .bind(now)
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
