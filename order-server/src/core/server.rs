//! Server Implementation
//!
//! HTTP server startup and graceful shutdown

use crate::api;
use crate::core::{Config, ServerState};
use crate::utils::{AppError, ErrorCode};
use axum::response::IntoResponse;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
    shutdown: CancellationToken,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Create server with existing state (tests share the state directly)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the server and its background tasks when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(&self) -> Result<(), AppError> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        // Workers first: the readiness probe reports the dispatcher state
        let tasks = state.start_background_tasks();

        let app = api::router()
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
        tracing::info!("Order server listening on {addr}");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

        // HTTP drained; stop the workers in reverse order of startup
        tasks.shutdown().await;

        Ok(())
    }
}

/// A panicking handler is caught at the RPC boundary and converted to a
/// clean Internal response. The panic is logged in full; the client never
/// sees partial state or a reset connection.
fn handle_panic(panic_info: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    let panic_msg: String = if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    };
    tracing::error!(
        panic = %panic_msg,
        "Handler panicked! This is a bug that should be reported."
    );

    AppError::new(ErrorCode::InternalError).into_response()
}
