//! Inventory engine: contended reservations, TTL reaping, conservation under
//! concurrent traffic.

mod common;

use common::{count, test_state};
use order_server::ErrorCode;
use order_server::services::inventory_service::ReserveItem;
use rand::Rng;
use shared::models::ReservationStatus;
use std::time::Duration;

fn items(product_id: &str, quantity: i64) -> Vec<ReserveItem> {
    vec![ReserveItem {
        product_id: product_id.into(),
        quantity,
    }]
}

#[tokio::test]
async fn s3_contended_reservation_has_one_winner() {
    let (state, _dir) = test_state().await;
    state
        .inventory_service
        .adjust("p1", 3, "initial stock")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for reservation_id in ["R1", "R2", "R3"] {
        let service = state.inventory_service.clone();
        handles.push(tokio::spawn(async move {
            service.reserve(reservation_id, &items("p1", 2), None).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => {
                assert!(
                    matches!(
                        err.code,
                        ErrorCode::InventoryConflict | ErrorCode::InsufficientStock
                    ),
                    "losers fail with a retryable conflict, got {:?}",
                    err.code
                );
            }
        }
    }
    assert_eq!(winners, 1, "exactly one contender wins");

    let level = state.inventory_service.get_inventory("p1").await.unwrap();
    assert_eq!(level.available, 1);
    assert_eq!(level.reserved, 2);
    assert_eq!(level.available + level.reserved, level.total);
}

#[tokio::test]
async fn s4_expired_reservation_is_reaped() {
    let (state, _dir) = test_state().await;
    state
        .inventory_service
        .adjust("p1", 5, "initial stock")
        .await
        .unwrap();
    let baseline = state.inventory_service.get_inventory("p1").await.unwrap();

    state
        .inventory_service
        .reserve("R1", &items("p1", 5), Some(1))
        .await
        .unwrap();
    let held = state.inventory_service.get_inventory("p1").await.unwrap();
    assert_eq!(held.available, 0);
    assert_eq!(held.reserved, 5);
    assert_eq!(held.version, baseline.version + 1);

    // Let the TTL lapse, then run a reaper pass
    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert_eq!(state.inventory_service.reap_expired().await.unwrap(), 1);

    let rows = state.inventory_service.get_reservation("R1").await.unwrap();
    assert!(rows
        .iter()
        .all(|r| r.status == ReservationStatus::Released));

    let level = state.inventory_service.get_inventory("p1").await.unwrap();
    assert_eq!(level.available, 5);
    assert_eq!(level.reserved, 0);
    assert_eq!(
        level.version,
        baseline.version + 2,
        "one bump for reserve, one for reap"
    );

    // The lapse is published for downstream consumers
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM outbox WHERE event_type = 'stock.released'"
        )
        .await,
        1
    );
}

#[tokio::test]
async fn commit_shrinks_total_and_is_idempotent() {
    let (state, _dir) = test_state().await;
    state
        .inventory_service
        .adjust("p1", 10, "initial stock")
        .await
        .unwrap();

    state
        .inventory_service
        .reserve("R1", &items("p1", 4), None)
        .await
        .unwrap();
    let committed = state.inventory_service.commit("R1").await.unwrap();
    assert!(committed
        .iter()
        .all(|r| r.status == ReservationStatus::Committed));

    let level = state.inventory_service.get_inventory("p1").await.unwrap();
    assert_eq!(level.available, 6);
    assert_eq!(level.reserved, 0);
    assert_eq!(level.total, 6, "sold goods leave the system");

    // No active rows left: second commit reports not-found, no side effect
    let err = state.inventory_service.commit("R1").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ReservationNotFound);
    let after = state.inventory_service.get_inventory("p1").await.unwrap();
    assert_eq!(after.total, 6);
    assert_eq!(after.version, level.version);
}

#[tokio::test]
async fn release_restores_availability() {
    let (state, _dir) = test_state().await;
    state
        .inventory_service
        .adjust("p1", 10, "initial stock")
        .await
        .unwrap();

    state
        .inventory_service
        .reserve("R1", &items("p1", 4), None)
        .await
        .unwrap();
    state.inventory_service.release("R1").await.unwrap();

    let level = state.inventory_service.get_inventory("p1").await.unwrap();
    assert_eq!(level.available, 10);
    assert_eq!(level.reserved, 0);
    assert_eq!(level.total, 10);

    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM outbox WHERE event_type = 'stock.released'"
        )
        .await,
        1
    );
}

#[tokio::test]
async fn reserve_rejects_insufficient_stock_without_side_effects() {
    let (state, _dir) = test_state().await;
    state
        .inventory_service
        .adjust("p1", 2, "initial stock")
        .await
        .unwrap();
    let before = state.inventory_service.get_inventory("p1").await.unwrap();

    let err = state
        .inventory_service
        .reserve("R1", &items("p1", 3), None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientStock);

    let after = state.inventory_service.get_inventory("p1").await.unwrap();
    assert_eq!(after.available, before.available);
    assert_eq!(after.version, before.version);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM reservations").await, 0);
}

#[tokio::test]
async fn multi_item_reserve_is_all_or_nothing() {
    let (state, _dir) = test_state().await;
    state
        .inventory_service
        .adjust("p1", 5, "initial stock")
        .await
        .unwrap();
    state
        .inventory_service
        .adjust("p2", 1, "initial stock")
        .await
        .unwrap();

    let err = state
        .inventory_service
        .reserve(
            "R1",
            &[
                ReserveItem {
                    product_id: "p1".into(),
                    quantity: 2,
                },
                ReserveItem {
                    product_id: "p2".into(),
                    quantity: 3,
                },
            ],
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientStock);

    // p1 was rolled back with the failing p2
    let p1 = state.inventory_service.get_inventory("p1").await.unwrap();
    assert_eq!(p1.available, 5);
    assert_eq!(p1.reserved, 0);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM reservations").await, 0);
}

#[tokio::test]
async fn adjust_guards_against_negative_availability() {
    let (state, _dir) = test_state().await;
    state
        .inventory_service
        .adjust("p1", 2, "initial stock")
        .await
        .unwrap();

    let err = state
        .inventory_service
        .adjust("p1", -5, "shrinkage")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientStock);

    let err = state
        .inventory_service
        .adjust("ghost", -1, "shrinkage")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InventoryNotFound);

    let level = state
        .inventory_service
        .adjust("p1", -2, "shrinkage")
        .await
        .unwrap();
    assert_eq!(level.available, 0);
    assert_eq!(level.total, 0);
}

#[tokio::test]
async fn conservation_holds_under_concurrent_traffic() {
    let (state, _dir) = test_state().await;
    const INITIAL: i64 = 50;
    state
        .inventory_service
        .adjust("p1", INITIAL, "initial stock")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for worker in 0..8 {
        let service = state.inventory_service.clone();
        handles.push(tokio::spawn(async move {
            for round in 0..5 {
                let reservation_id = format!("w{worker}-r{round}");
                let quantity: i64 = rand::thread_rng().gen_range(1..=3);
                // Jitter so the workers interleave differently every run
                let jitter = rand::thread_rng().gen_range(0..5);
                tokio::time::sleep(Duration::from_millis(jitter)).await;
                match service
                    .reserve(&reservation_id, &items("p1", quantity), None)
                    .await
                {
                    Ok(_) => {
                        // Commit or release the hold at random
                        if rand::thread_rng().gen_bool(0.5) {
                            let _ = service.commit(&reservation_id).await;
                        } else {
                            let _ = service.release(&reservation_id).await;
                        }
                    }
                    Err(err) => {
                        // Conflicts and stock-outs are expected under contention
                        assert!(
                            matches!(
                                err.code,
                                ErrorCode::InventoryConflict | ErrorCode::InsufficientStock
                            ),
                            "unexpected error {:?}",
                            err.code
                        );
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let level = state.inventory_service.get_inventory("p1").await.unwrap();
    assert!(level.available >= 0);
    assert!(level.reserved >= 0);
    assert_eq!(level.available + level.reserved, level.total);

    // No overselling: everything committed plus everything still in the
    // system accounts for exactly the initial stock
    let committed: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM reservations WHERE status = 'committed'",
    )
    .fetch_one(&state.pool)
    .await
    .unwrap();
    assert_eq!(committed + level.total, INITIAL);

    // Non-released holds never exceed the initial stock
    let held: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM reservations WHERE status != 'released'",
    )
    .fetch_one(&state.pool)
    .await
    .unwrap();
    assert!(held <= INITIAL);
}
