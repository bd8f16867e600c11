//! Payment executor: provider outcomes persisted durably, circuit breaker
//! opening and recovery, idempotent confirmation.

mod common;

use common::{count, test_state, test_state_with};
use order_server::ErrorCode;
use order_server::payment::MockPaymentProvider;
use order_server::payment::provider::MockOutcome;
use order_server::services::payment_service::CreatePaymentRequest;
use shared::models::PaymentStatus;
use std::sync::Arc;
use std::time::Duration;

fn request(order: &str, key: &str) -> CreatePaymentRequest {
    CreatePaymentRequest {
        order_id: order.into(),
        user_id: "u1".into(),
        amount_minor: 1000,
        currency: "USD".into(),
        method: "card".into(),
        idempotency_key: key.into(),
    }
}

#[tokio::test]
async fn s5_circuit_opens_after_failures_and_recovers() {
    let provider = Arc::new(MockPaymentProvider::new());
    provider.set_outcome(MockOutcome::Decline("card expired".into()));
    let (state, _dir) = test_state_with(provider.clone(), |config| {
        // Shrink the cool-down so the test can wait it out in real time,
        // but keep it wide enough that the sixth call lands while open
        config.payment_circuit_reset_timeout_ms = 2_000;
    })
    .await;

    // Five distinct payments all fail and the outcome is durable
    for i in 0..5 {
        let (payment, _) = state
            .payment_service
            .create_payment(request(&format!("o{i}"), &format!("k{i}")))
            .await
            .unwrap();
        let confirmed = state
            .payment_service
            .confirm_payment(&payment.id)
            .await
            .unwrap();
        assert_eq!(confirmed.status, PaymentStatus::Failed);
        assert_eq!(confirmed.error_message.as_deref(), Some("card expired"));
    }
    assert_eq!(provider.invocations(), 5);
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM payment_outbox WHERE event_type = 'payment.failed'"
        )
        .await,
        5
    );

    // Sixth call: circuit open, provider never reached, payment retryable
    let (sixth, _) = state
        .payment_service
        .create_payment(request("o6", "k6"))
        .await
        .unwrap();
    let err = state
        .payment_service
        .confirm_payment(&sixth.id)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::CircuitOpen);
    assert!(err.details.unwrap().contains_key("retry_after_secs"));
    assert_eq!(provider.invocations(), 5, "no provider invocation while open");
    assert_eq!(
        state
            .payment_service
            .get_payment(&sixth.id)
            .await
            .unwrap()
            .status,
        PaymentStatus::Pending
    );

    // After the reset window the probe goes through and closes the circuit
    tokio::time::sleep(Duration::from_millis(2_200)).await;
    provider.set_outcome(MockOutcome::Succeed);
    let confirmed = state
        .payment_service
        .confirm_payment(&sixth.id)
        .await
        .unwrap();
    assert_eq!(confirmed.status, PaymentStatus::Succeeded);
    assert!(confirmed.provider_txn_id.is_some());
    assert_eq!(provider.invocations(), 6);
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM payment_outbox WHERE event_type = 'payment.succeeded'"
        )
        .await,
        1
    );
}

#[tokio::test]
async fn confirm_is_idempotent_on_settled_payments() {
    let (state, _dir) = test_state().await;
    let (payment, _) = state
        .payment_service
        .create_payment(request("o1", "k1"))
        .await
        .unwrap();

    let first = state
        .payment_service
        .confirm_payment(&payment.id)
        .await
        .unwrap();
    assert_eq!(first.status, PaymentStatus::Succeeded);

    // Replay returns the settled row without another provider call
    let second = state
        .payment_service
        .confirm_payment(&payment.id)
        .await
        .unwrap();
    assert_eq!(second.status, PaymentStatus::Succeeded);
    assert_eq!(second.provider_txn_id, first.provider_txn_id);
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM payment_outbox WHERE event_type = 'payment.succeeded'"
        )
        .await,
        1
    );
}

#[tokio::test]
async fn create_payment_collapses_on_idempotency_key() {
    let (state, _dir) = test_state().await;
    let (first, from_cache_first) = state
        .payment_service
        .create_payment(request("o1", "k1"))
        .await
        .unwrap();
    assert!(!from_cache_first);

    let (second, from_cache_second) = state
        .payment_service
        .create_payment(request("o1", "k1"))
        .await
        .unwrap();
    assert!(from_cache_second);
    assert_eq!(second.id, first.id);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM payments").await, 1);
}

#[tokio::test]
async fn timeout_is_recorded_as_failure() {
    let provider = Arc::new(MockPaymentProvider::new());
    provider.set_outcome(MockOutcome::Hang);
    let (state, _dir) = test_state_with(provider.clone(), |config| {
        config.payment_circuit_timeout_ms = 100;
    })
    .await;

    let (payment, _) = state
        .payment_service
        .create_payment(request("o1", "k1"))
        .await
        .unwrap();
    let confirmed = state
        .payment_service
        .confirm_payment(&payment.id)
        .await
        .unwrap();
    assert_eq!(confirmed.status, PaymentStatus::Failed);
    assert_eq!(
        confirmed.error_message.as_deref(),
        Some("provider call timed out")
    );
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM payment_outbox WHERE event_type = 'payment.failed'"
        )
        .await,
        1
    );
}

#[tokio::test]
async fn cancel_only_from_pending() {
    let (state, _dir) = test_state().await;
    let (payment, _) = state
        .payment_service
        .create_payment(request("o1", "k1"))
        .await
        .unwrap();

    let cancelled = state
        .payment_service
        .cancel_payment(&payment.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, PaymentStatus::Cancelled);

    // Settled rows replay unchanged through confirm
    let replay = state
        .payment_service
        .confirm_payment(&payment.id)
        .await
        .unwrap();
    assert_eq!(replay.status, PaymentStatus::Cancelled);

    let err = state
        .payment_service
        .cancel_payment(&payment.id)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentNotPending);
}

#[tokio::test]
async fn refund_requires_success_and_emits_event() {
    let (state, _dir) = test_state().await;
    let (payment, _) = state
        .payment_service
        .create_payment(request("o1", "k1"))
        .await
        .unwrap();

    // Refund before settlement is rejected
    let err = state
        .payment_service
        .refund_payment(&payment.id)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentNotRefundable);

    state
        .payment_service
        .confirm_payment(&payment.id)
        .await
        .unwrap();
    let refunded = state
        .payment_service
        .refund_payment(&payment.id)
        .await
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM payment_outbox WHERE event_type = 'payment.refunded'"
        )
        .await,
        1
    );

    // Refund is a one-shot transition
    let err = state
        .payment_service
        .refund_payment(&payment.id)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentNotRefundable);
}

#[tokio::test]
async fn payment_dispatcher_publishes_payment_events() {
    let (state, _dir) = test_state().await;
    let mut rx = state.event_bus.subscribe("payment.succeeded");
    let tasks = state.start_background_tasks();

    let (payment, _) = state
        .payment_service
        .create_payment(request("o1", "k1"))
        .await
        .unwrap();
    state
        .payment_service
        .confirm_payment(&payment.id)
        .await
        .unwrap();

    let message = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("payment event within the poll interval")
        .expect("channel open");
    assert_eq!(message.event_type(), Some("payment.succeeded"));
    assert_eq!(message.attributes.get("aggregate_id"), Some(&payment.id));

    tasks.shutdown().await;
}
