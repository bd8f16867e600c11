//! Order Service
//!
//! Order intake and lifecycle. Every state-changing operation writes the
//! aggregate mutation and exactly one outbox row in a single transaction;
//! the dispatcher publishes the row after commit.

use crate::db::repository::outbox::OutboxTable;
use crate::db::repository::{order as order_repo, outbox as outbox_repo};
use crate::services::idempotency::IdempotencyStore;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Order, OrderItem, OrderStatus, OutboxEvent, ShippingAddress};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Hard cap on page size; requests above it are clamped
pub const MAX_PAGE_SIZE: i64 = 100;
/// Default page size when the caller does not pass one
pub const DEFAULT_PAGE_SIZE: i64 = 20;

const OPERATION: &str = "create_order";

/// Line item draft carrying the price snapshot taken by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub name: String,
    pub unit_price_minor: i64,
    pub currency: String,
    pub quantity: i64,
}

/// CreateOrder input
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<NewOrderItem>,
    pub shipping_address: ShippingAddress,
    pub idempotency_key: String,
}

/// ListOrders input
#[derive(Debug, Clone, Default)]
pub struct ListOrdersParams {
    pub user_id: String,
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// One page of orders plus the cursor for the next page
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub next_cursor: Option<String>,
}

/// Keyset cursor over `(created_at, id)`, consumed with a strict tuple
/// comparison so pages stay stable under concurrent inserts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PageCursor {
    created_at: i64,
    id: String,
}

fn encode_cursor(cursor: &PageCursor) -> String {
    let json = serde_json::to_vec(cursor).expect("cursor serialization is infallible");
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_cursor(encoded: &str) -> AppResult<PageCursor> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| AppError::new(ErrorCode::InvalidCursor))?;
    serde_json::from_slice(&bytes).map_err(|_| AppError::new(ErrorCode::InvalidCursor))
}

/// Order intake and lifecycle service
pub struct OrderService {
    pool: SqlitePool,
    idempotency: Arc<IdempotencyStore>,
}

impl OrderService {
    pub fn new(pool: SqlitePool, idempotency: Arc<IdempotencyStore>) -> Self {
        Self { pool, idempotency }
    }

    /// Create an order, at most once per (user, idempotency key).
    ///
    /// Returns the order and whether it was served from a replay (cached
    /// outcome or the existing row behind the unique constraint).
    pub async fn create_order(&self, req: CreateOrderRequest) -> AppResult<(Order, bool)> {
        validate_create(&req)?;

        // Fast path: replay the canonical outcome without opening a transaction
        let fingerprint =
            IdempotencyStore::fingerprint(&req.user_id, OPERATION, &req.idempotency_key);
        if let Some(record) = self.idempotency.lookup(&fingerprint).await {
            if let Ok(order) = serde_json::from_slice::<Order>(&record.body) {
                tracing::debug!(order_id = %order.id, "CreateOrder replayed from idempotency store");
                return Ok((order, true));
            }
        }

        let now = now_millis();
        let currency = req.items[0].currency.clone();
        let items: Vec<OrderItem> = req
            .items
            .iter()
            .map(|draft| OrderItem {
                product_id: draft.product_id.clone(),
                name: draft.name.clone(),
                unit_price_minor: draft.unit_price_minor,
                currency: draft.currency.clone(),
                quantity: draft.quantity,
                total_price_minor: draft.unit_price_minor * draft.quantity,
            })
            .collect();
        let total_minor = items.iter().map(|i| i.total_price_minor).sum();

        let order = Order {
            id: new_id(),
            user_id: req.user_id.clone(),
            status: OrderStatus::Pending,
            total_minor,
            currency,
            payment_id: None,
            shipping_address: req.shipping_address.clone(),
            items,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        match order_repo::insert(&mut tx, &order, &req.idempotency_key).await {
            Ok(()) => {}
            Err(err) if err.is_duplicate() => {
                // A concurrent request with the same key won the race; the
                // unique constraint is the definitive dedupe point.
                drop(tx);
                let mut conn = self.acquire().await?;
                let existing = order_repo::find_by_idempotency_key(
                    &mut conn,
                    &req.user_id,
                    &req.idempotency_key,
                )
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| AppError::internal("duplicate order row vanished"))?;
                return Ok((existing, true));
            }
            Err(err) => return Err(err.into()),
        }

        let event = OutboxEvent::new(
            "order",
            order.id.clone(),
            OrderStatus::Pending.event_type(),
            serde_json::json!({
                "order_id": order.id,
                "user_id": order.user_id,
                "total_minor": order.total_minor,
                "currency": order.currency,
                "items": order.items,
            }),
        );
        outbox_repo::insert(&mut tx, OutboxTable::Order, &event)
            .await
            .map_err(AppError::from)?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            total_minor = order.total_minor,
            "Order created"
        );

        let canonical = serde_json::to_vec(&order)
            .map_err(|e| AppError::internal(format!("unserializable order: {e}")))?;
        self.idempotency.store(&fingerprint, 200, canonical).await;

        Ok((order, false))
    }

    /// Get an order with its items
    pub async fn get_order(&self, id: &str) -> AppResult<Order> {
        let mut conn = self.acquire().await?;
        order_repo::get(&mut conn, id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound).with_detail("id", id))
    }

    /// Page through a user's orders, newest first
    pub async fn list_orders(&self, params: ListOrdersParams) -> AppResult<OrderPage> {
        if params.user_id.trim().is_empty() {
            return Err(AppError::with_message(
                ErrorCode::RequiredField,
                "user_id is required",
            ));
        }
        let limit = params
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let after = params
            .cursor
            .as_deref()
            .map(decode_cursor)
            .transpose()?
            .map(|c| (c.created_at, c.id));

        let mut conn = self.acquire().await?;
        let orders = order_repo::list_for_user(&mut conn, &params.user_id, params.status, after, limit)
            .await
            .map_err(AppError::from)?;

        let next_cursor = if orders.len() as i64 == limit {
            orders.last().map(|last| {
                encode_cursor(&PageCursor {
                    created_at: last.created_at,
                    id: last.id.clone(),
                })
            })
        } else {
            None
        };

        Ok(OrderPage {
            orders,
            next_cursor,
        })
    }

    /// Cancel an order with a reason. Rejected in terminal states.
    pub async fn cancel_order(&self, id: &str, reason: &str) -> AppResult<Order> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let order = order_repo::get(&mut tx, id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound).with_detail("id", id))?;

        if !order.status.can_transition(OrderStatus::Cancelled) {
            return Err(
                AppError::new(ErrorCode::OrderNotCancellable)
                    .with_detail("status", order.status.as_str()),
            );
        }

        let now = now_millis();
        order_repo::update_status(&mut tx, id, OrderStatus::Cancelled, Some(reason), now)
            .await
            .map_err(AppError::from)?;

        let event = OutboxEvent::new(
            "order",
            id.to_string(),
            OrderStatus::Cancelled.event_type(),
            serde_json::json!({
                "order_id": id,
                "user_id": order.user_id,
                "previous_status": order.status.as_str(),
                "reason": reason,
            }),
        );
        outbox_repo::insert(&mut tx, OutboxTable::Order, &event)
            .await
            .map_err(AppError::from)?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tracing::info!(order_id = %id, reason, "Order cancelled");

        let mut updated = order;
        updated.status = OrderStatus::Cancelled;
        updated.cancel_reason = Some(reason.to_string());
        updated.updated_at = now;
        Ok(updated)
    }

    /// Drive an order along the lifecycle DAG.
    ///
    /// The transition is validated against the current row inside the
    /// transaction, so concurrent drivers are linearised by the database.
    pub async fn update_status(&self, id: &str, new_status: OrderStatus) -> AppResult<Order> {
        if new_status == OrderStatus::Cancelled {
            return self.cancel_order(id, "cancelled by operator").await;
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let order = order_repo::get(&mut tx, id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound).with_detail("id", id))?;

        if !order.status.can_transition(new_status) {
            return Err(AppError::invalid_transition(
                order.status.as_str(),
                new_status.as_str(),
            ));
        }

        let now = now_millis();
        order_repo::update_status(&mut tx, id, new_status, None, now)
            .await
            .map_err(AppError::from)?;

        let event = OutboxEvent::new(
            "order",
            id.to_string(),
            new_status.event_type(),
            serde_json::json!({
                "order_id": id,
                "user_id": order.user_id,
                "status": new_status.as_str(),
                "previous_status": order.status.as_str(),
            }),
        );
        outbox_repo::insert(&mut tx, OutboxTable::Order, &event)
            .await
            .map_err(AppError::from)?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tracing::info!(order_id = %id, from = %order.status, to = %new_status, "Order status updated");

        let mut updated = order;
        updated.status = new_status;
        updated.updated_at = now;
        Ok(updated)
    }

    /// Attach a payment reference to an order (id only, no ownership)
    pub async fn set_payment_ref(&self, order_id: &str, payment_id: &str) -> AppResult<()> {
        let mut conn = self.acquire().await?;
        order_repo::set_payment_ref(&mut conn, order_id, payment_id, now_millis())
            .await
            .map_err(AppError::from)?;
        Ok(())
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

fn validate_create(req: &CreateOrderRequest) -> AppResult<()> {
    if req.user_id.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            "user_id is required",
        ));
    }
    if req.idempotency_key.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            "idempotency_key is required",
        ));
    }
    if req.items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty));
    }
    for item in &req.items {
        if item.quantity < 1 {
            return Err(AppError::validation(format!(
                "quantity must be >= 1 for product {}",
                item.product_id
            )));
        }
        if item.unit_price_minor < 0 {
            return Err(AppError::validation(format!(
                "unit price must be >= 0 for product {}",
                item.product_id
            )));
        }
        if item.currency != req.items[0].currency {
            return Err(AppError::new(ErrorCode::CurrencyMismatch)
                .with_detail("expected", req.items[0].currency.clone())
                .with_detail("got", item.currency.clone()));
        }
    }
    if let Some(field) = req.shipping_address.first_missing_field() {
        return Err(AppError::new(ErrorCode::AddressIncomplete).with_detail("field", field));
    }
    Ok(())
}
