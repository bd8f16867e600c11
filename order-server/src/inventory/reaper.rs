//! ReservationReaper — periodic TTL cleanup for active holds
//!
//! Every interval (default 60s) the reaper restores expired active
//! reservations: quantity back to available, reservation marked released,
//! a `stock.released` row written. Each pass is one short transaction so the
//! reaper never blocks order traffic.

use crate::services::InventoryService;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct ReservationReaper {
    inventory: Arc<InventoryService>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ReservationReaper {
    pub fn new(
        inventory: Arc<InventoryService>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inventory,
            interval,
            shutdown,
        }
    }

    /// Run the reap loop until shutdown
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "ReservationReaper started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The engine already released nothing at t=0; skip the immediate tick
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("ReservationReaper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match self.inventory.reap_expired().await {
                        Ok(0) => {}
                        Ok(reaped) => {
                            tracing::info!(reaped, "Reaper released expired reservations");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Reaper pass failed");
                        }
                    }
                }
            }
        }

        tracing::info!("ReservationReaper stopped");
    }
}
