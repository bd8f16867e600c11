//! Order server binary entrypoint
//!
//! Responsible for:
//! - loading the .env file
//! - preparing the working directory
//! - initializing logging
//! - starting the server

use order_server::{Config, Server, ServerState, init_logger_with_level};
use std::path::PathBuf;

/// Prepare the runtime environment (bin layer only)
fn setup_environment() -> Result<PathBuf, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let work_dir = std::env::var("WORK_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));

    if !work_dir.exists() {
        std::fs::create_dir_all(&work_dir)?;
        println!("Created work directory: {}", work_dir.display());
    }

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    init_logger_with_level(Some(&log_level));

    tracing::info!(
        "Environment initialized. WorkDir: {}, LogLevel: {}",
        work_dir.display(),
        log_level
    );

    Ok(work_dir)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let work_dir = setup_environment()?;

    tracing::info!("Order server starting...");
    tracing::debug!("Work directory: {}", work_dir.display());

    let config = Config::from_env();
    let state = ServerState::initialize(&config).await?;

    let server = Server::with_state(config, state);
    let token = server.shutdown_token();

    // ctrl_c and server.run() race; either ending exits the process
    let result = tokio::select! {
        r = server.run() => r.map_err(|e| e.into()),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            token.cancel();
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!("Server error: {}", e);
    }

    result
}
