//! Circuit breaker around the payment provider
//!
//! # State machine
//!
//! ```text
//!          consecutive failures >= max_failures
//! closed ─────────────────────────────────────▶ open
//!   ▲                                            │
//!   │ success                       reset_timeout elapsed
//!   │                                            ▼
//!   └──────────────────────────────────────── half-open
//!                      any failure ──▶ open
//! ```
//!
//! The mutex guards only the small state transitions; it is never held
//! across the wrapped call. An independent per-call timeout enforces forward
//! progress, and a timed-out call counts as a failure.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half-open"),
        }
    }
}

/// Error surface of a guarded call
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The breaker is open; the provider was not invoked
    Open { retry_after: Duration },
    /// The call exceeded the per-call timeout
    Timeout,
    /// The wrapped call itself failed
    Service(E),
}

/// Callback invoked on every state change, outside the state mutex
type StateObserver = Box<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Per-dependency circuit breaker, safe for concurrent callers
pub struct CircuitBreaker {
    name: &'static str,
    max_failures: u32,
    call_timeout: Duration,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
    observers: Mutex<Vec<StateObserver>>,
}

impl CircuitBreaker {
    pub fn new(
        name: &'static str,
        max_failures: u32,
        call_timeout: Duration,
        reset_timeout: Duration,
    ) -> Self {
        Self {
            name,
            max_failures: max_failures.max(1),
            call_timeout,
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Current state (open flips to half-open lazily on the next admission)
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Consecutive failure count since the last success
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Subscribe to state-change notifications
    pub fn on_state_change(&self, observer: impl Fn(CircuitState, CircuitState) + Send + Sync + 'static) {
        self.observers.lock().push(Box::new(observer));
    }

    /// Run `op` under the breaker with the per-call timeout applied
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(retry_after) = self.admit() {
            return Err(BreakerError::Open { retry_after });
        }

        match tokio::time::timeout(self.call_timeout, op()).await {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure();
                Err(BreakerError::Service(err))
            }
            Err(_) => {
                self.record_failure();
                Err(BreakerError::Timeout)
            }
        }
    }

    /// Gate a call. Returns `Some(retry_after)` when the call must be
    /// rejected, `None` when it may proceed.
    fn admit(&self) -> Option<Duration> {
        let mut transition = None;
        let verdict = {
            let mut inner = self.inner.lock();
            match inner.state {
                CircuitState::Closed | CircuitState::HalfOpen => None,
                CircuitState::Open => {
                    let elapsed = inner
                        .opened_at
                        .map(|at| at.elapsed())
                        .unwrap_or(self.reset_timeout);
                    if elapsed >= self.reset_timeout {
                        // Reset window elapsed: admit one probe in half-open
                        transition = Some((inner.state, CircuitState::HalfOpen));
                        inner.state = CircuitState::HalfOpen;
                        None
                    } else {
                        Some(self.reset_timeout - elapsed)
                    }
                }
            }
        };
        if let Some((from, to)) = transition {
            self.notify(from, to);
        }
        verdict
    }

    fn record_success(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            let from = inner.state;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
            inner.state = CircuitState::Closed;
            (from != CircuitState::Closed).then_some((from, CircuitState::Closed))
        };
        if let Some((from, to)) = transition {
            tracing::info!(breaker = self.name, %from, %to, "Circuit closed after success");
            self.notify(from, to);
        }
    }

    fn record_failure(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            let from = inner.state;
            inner.consecutive_failures += 1;
            let should_open = match inner.state {
                // Any failure during the half-open probe re-opens the circuit
                CircuitState::HalfOpen => true,
                CircuitState::Closed => inner.consecutive_failures >= self.max_failures,
                CircuitState::Open => false,
            };
            if should_open {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                Some((from, CircuitState::Open))
            } else {
                None
            }
        };
        if let Some((from, to)) = transition {
            tracing::warn!(
                breaker = self.name,
                %from,
                %to,
                failures = self.failure_count(),
                "Circuit opened"
            );
            self.notify(from, to);
        }
    }

    fn notify(&self, from: CircuitState, to: CircuitState) {
        for observer in self.observers.lock().iter() {
            observer(from, to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            5,
            Duration::from_secs(10),
            Duration::from_secs(30),
        )
    }

    async fn fail(b: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        b.call(|| async { Err::<(), _>("boom") }).await.map(|_| ())
    }

    async fn succeed(b: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        b.call(|| async { Ok::<_, &'static str>(()) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_max_failures() {
        let b = breaker();
        for _ in 0..5 {
            assert!(matches!(fail(&b).await, Err(BreakerError::Service(_))));
        }
        assert_eq!(b.state(), CircuitState::Open);

        // Sixth call is rejected without invoking the closure
        let invoked = Arc::new(AtomicU32::new(0));
        let counter = invoked.clone();
        let result = b
            .call(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, &'static str>(()) }
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let b = breaker();
        for _ in 0..4 {
            let _ = fail(&b).await;
        }
        assert_eq!(b.failure_count(), 4);
        succeed(&b).await.unwrap();
        assert_eq!(b.failure_count(), 0);
        assert_eq!(b.state(), CircuitState::Closed);

        // The window restarts: four more failures stay closed
        for _ in 0..4 {
            let _ = fail(&b).await;
        }
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_then_closed_on_success() {
        let b = breaker();
        for _ in 0..5 {
            let _ = fail(&b).await;
        }
        assert_eq!(b.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(31)).await;
        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_reopens_on_failure() {
        let b = breaker();
        for _ in 0..5 {
            let _ = fail(&b).await;
        }
        tokio::time::advance(Duration::from_secs(31)).await;

        // Probe fails: straight back to open, no threshold counting
        let _ = fail(&b).await;
        assert_eq!(b.state(), CircuitState::Open);
        assert!(matches!(
            succeed(&b).await,
            Err(BreakerError::Open { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let b = CircuitBreaker::new(
            "slow",
            1,
            Duration::from_millis(100),
            Duration::from_secs(30),
        );
        let result = b
            .call(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, &'static str>(())
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Timeout)));
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_shrinks() {
        let b = breaker();
        for _ in 0..5 {
            let _ = fail(&b).await;
        }
        let Err(BreakerError::Open { retry_after }) = succeed(&b).await else {
            panic!("expected open");
        };
        assert!(retry_after <= Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(20)).await;
        let Err(BreakerError::Open { retry_after }) = succeed(&b).await else {
            panic!("expected open");
        };
        assert!(retry_after <= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observers_see_transitions() {
        let b = breaker();
        let transitions = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = transitions.clone();
        b.on_state_change(move |from, to| sink.lock().push((from, to)));

        for _ in 0..5 {
            let _ = fail(&b).await;
        }
        tokio::time::advance(Duration::from_secs(31)).await;
        succeed(&b).await.unwrap();

        let seen = transitions.lock().clone();
        assert_eq!(
            seen,
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }
}
