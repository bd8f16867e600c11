//! Shared test bootstrap: full `ServerState` over a throwaway work dir

use order_server::{Config, ServerState};
use order_server::payment::{MockPaymentProvider, PaymentProvider};
use std::sync::Arc;
use tempfile::TempDir;

/// Fresh state with the default mock provider. The TempDir must stay alive
/// for the duration of the test or SQLite loses its backing file.
pub async fn test_state() -> (ServerState, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let config = Config::with_overrides(dir.path().to_string_lossy(), 0);
    let state = ServerState::initialize(&config)
        .await
        .expect("state init");
    (state, dir)
}

/// Fresh state with a caller-scripted provider and tweakable config
pub async fn test_state_with(
    provider: Arc<MockPaymentProvider>,
    tweak: impl FnOnce(&mut Config),
) -> (ServerState, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let mut config = Config::with_overrides(dir.path().to_string_lossy(), 0);
    tweak(&mut config);
    let state = ServerState::initialize_with_provider(&config, provider as Arc<dyn PaymentProvider>)
        .await
        .expect("state init");
    (state, dir)
}

/// Scalar helper for direct table assertions
pub async fn count(state: &ServerState, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(&state.pool)
        .await
        .expect("count query")
}
