//! Payment Module
//!
//! Failure isolation around the external payment provider: the provider
//! capability set as a trait object, and the circuit breaker that guards
//! every call to it.

pub mod circuit_breaker;
pub mod provider;

pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitState};
pub use provider::{
    ChargeRequest, MockPaymentProvider, PaymentProvider, ProviderError, ProviderReceipt,
};
