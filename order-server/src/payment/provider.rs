//! Payment provider capability set
//!
//! The core depends on this interface only; the mock provider and any real
//! provider are interchangeable behind `Arc<dyn PaymentProvider>`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Charge request passed to the provider
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub payment_id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub method: String,
}

/// Provider acknowledgement for a settled operation
#[derive(Debug, Clone)]
pub struct ProviderReceipt {
    pub transaction_id: String,
}

/// Provider failure surface
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Final business outcome — the charge was refused
    #[error("declined: {0}")]
    Declined(String),
    /// Transient provider fault
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// External payment provider capability set
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn process_payment(&self, req: &ChargeRequest)
        -> Result<ProviderReceipt, ProviderError>;

    async fn cancel_payment(&self, provider_txn_id: &str) -> Result<(), ProviderError>;

    async fn refund_payment(
        &self,
        provider_txn_id: &str,
        amount_minor: i64,
    ) -> Result<ProviderReceipt, ProviderError>;
}

/// Scripted outcome for the mock provider
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Succeed,
    Decline(String),
    Unavailable(String),
    /// Never resolves — exercises the per-call timeout
    Hang,
}

/// In-process provider used in development and tests.
///
/// The outcome is scripted per instance and an invocation counter records
/// how many times the provider was actually reached (the circuit breaker
/// must reject without reaching it).
pub struct MockPaymentProvider {
    outcome: Mutex<MockOutcome>,
    invocations: AtomicU64,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(MockOutcome::Succeed),
            invocations: AtomicU64::new(0),
        }
    }

    /// Script the outcome of subsequent calls
    pub fn set_outcome(&self, outcome: MockOutcome) {
        *self.outcome.lock() = outcome;
    }

    /// How many times any capability was invoked
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    async fn run(&self, txn_prefix: &str, key: &str) -> Result<ProviderReceipt, ProviderError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcome.lock().clone();
        match outcome {
            MockOutcome::Succeed => Ok(ProviderReceipt {
                transaction_id: format!("{txn_prefix}_{key}"),
            }),
            MockOutcome::Decline(reason) => Err(ProviderError::Declined(reason)),
            MockOutcome::Unavailable(reason) => Err(ProviderError::Unavailable(reason)),
            MockOutcome::Hang => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn process_payment(
        &self,
        req: &ChargeRequest,
    ) -> Result<ProviderReceipt, ProviderError> {
        self.run("txn", &req.payment_id).await
    }

    async fn cancel_payment(&self, provider_txn_id: &str) -> Result<(), ProviderError> {
        self.run("cancel", provider_txn_id).await.map(|_| ())
    }

    async fn refund_payment(
        &self,
        provider_txn_id: &str,
        _amount_minor: i64,
    ) -> Result<ProviderReceipt, ProviderError> {
        self.run("refund", provider_txn_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChargeRequest {
        ChargeRequest {
            payment_id: "pay1".into(),
            order_id: "o1".into(),
            user_id: "u1".into(),
            amount_minor: 1000,
            currency: "USD".into(),
            method: "card".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_succeeds_by_default() {
        let provider = MockPaymentProvider::new();
        let receipt = provider.process_payment(&request()).await.unwrap();
        assert_eq!(receipt.transaction_id, "txn_pay1");
        assert_eq!(provider.invocations(), 1);
    }

    #[tokio::test]
    async fn test_mock_scripted_decline() {
        let provider = MockPaymentProvider::new();
        provider.set_outcome(MockOutcome::Decline("insufficient funds".into()));
        let err = provider.process_payment(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Declined(_)));
    }
}
