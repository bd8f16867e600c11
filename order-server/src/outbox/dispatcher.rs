//! OutboxDispatcher — background worker publishing committed outbox rows
//!
//! On a fixed cadence it reads up to `batch_size` unpublished rows ordered by
//! created_at, publishes each to the event bus, and marks each published one
//! at a time. Publish and mark run outside the aggregate's transaction and
//! tolerate partial failure:
//!
//! - publish fails -> the row stays unpublished, the next tick retries
//! - publish succeeds, mark fails -> the row is republished next tick and
//!   consumers dedupe on the message id
//!
//! Multiple instances may race on the same rows; the mark-published UPDATE
//! is a no-op when another instance got there first.

use crate::db::repository::outbox::{self as outbox_repo, OutboxTable};
use crate::events::{EventBus, EventMessage};
use shared::util::now_millis;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct OutboxDispatcher {
    pool: SqlitePool,
    bus: Arc<dyn EventBus>,
    table: OutboxTable,
    poll_interval: Duration,
    batch_size: i64,
    shutdown: CancellationToken,
    running: Arc<AtomicBool>,
}

impl OutboxDispatcher {
    pub fn new(
        pool: SqlitePool,
        bus: Arc<dyn EventBus>,
        table: OutboxTable,
        poll_interval: Duration,
        batch_size: i64,
        shutdown: CancellationToken,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pool,
            bus,
            table,
            poll_interval,
            batch_size,
            shutdown,
            running,
        }
    }

    /// Run the dispatch loop until shutdown.
    ///
    /// Cancellation is checked between rows, never mid-publish: an in-flight
    /// row always completes its publish-and-mark step before the worker
    /// exits.
    pub async fn run(self) {
        tracing::info!(
            table = %self.table,
            interval_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            "OutboxDispatcher started"
        );
        self.running.store(true, Ordering::SeqCst);

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(table = %self.table, "OutboxDispatcher shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.drain_once().await;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!(table = %self.table, "OutboxDispatcher stopped");
    }

    /// One poll-publish-mark pass. Returns the number of rows marked
    /// published. Public so tests (and a paused dispatcher) can tick by hand.
    pub async fn drain_once(&self) -> usize {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(table = %self.table, error = %e, "Dispatcher could not get a connection");
                return 0;
            }
        };

        let events = match outbox_repo::fetch_unpublished(&mut conn, self.table, self.batch_size)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(table = %self.table, error = %e, "Failed to fetch unpublished events");
                return 0;
            }
        };
        if events.is_empty() {
            return 0;
        }

        let mut published = 0;
        for event in events {
            // Cancellation is honored between rows only; a row whose publish
            // started always gets its mark-published step
            if self.shutdown.is_cancelled() {
                break;
            }

            let message = EventMessage::from_outbox(&event);
            if let Err(e) = self.bus.publish(&event.event_type, message).await {
                tracing::warn!(
                    table = %self.table,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %e,
                    "Publish failed, row stays unpublished"
                );
                continue;
            }

            match outbox_repo::mark_published(&mut conn, self.table, &event.id, now_millis()).await
            {
                Ok(_) => {
                    published += 1;
                    tracing::debug!(
                        table = %self.table,
                        event_id = %event.id,
                        event_type = %event.event_type,
                        "Event published"
                    );
                }
                Err(e) => {
                    // Published but unmarked: redelivered next tick, consumers
                    // collapse it on the message id
                    tracing::warn!(
                        table = %self.table,
                        event_id = %event.id,
                        error = %e,
                        "Mark-published failed, event will be redelivered"
                    );
                }
            }
        }

        if published > 0 {
            tracing::debug!(table = %self.table, published, "Dispatcher pass complete");
        }
        published
    }
}
