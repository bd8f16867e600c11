//! Server configuration
//!
//! Every knob can be overridden through an environment variable:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | WORK_DIR | ./data | Working directory (database, logs) |
//! | HTTP_PORT | 3000 | HTTP API port |
//! | ENVIRONMENT | development | development \| staging \| production |
//! | DB_MAX_CONNECTIONS | 25 | SQLite pool size |
//! | OUTBOX_POLL_INTERVAL_MS | 5000 | Dispatcher cadence (floor 1000) |
//! | OUTBOX_BATCH_SIZE | 100 | Rows per dispatcher pass |
//! | RESERVATION_DEFAULT_TTL_SECS | 900 | Hold TTL when the caller omits one |
//! | RESERVATION_REAPER_INTERVAL_SECS | 60 | Reaper cadence |
//! | PAYMENT_CIRCUIT_MAX_FAILURES | 5 | Failures before the circuit opens |
//! | PAYMENT_CIRCUIT_TIMEOUT_MS | 10000 | Per-call provider timeout |
//! | PAYMENT_CIRCUIT_RESET_TIMEOUT_MS | 30000 | Open-state cool-down |
//! | IDEMPOTENCY_TTL_SECS | 86400 | Cached outcome lifetime |
//! | CATALOG_PRODUCT_TTL_SECS | 300 | Per-product cache TTL |
//! | CATALOG_LIST_TTL_SECS | 120 | List cache TTL |

use std::time::Duration;

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for the database and logs
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Runtime environment: development | staging | production
    pub environment: String,

    // === Database ===
    pub db_max_connections: u32,

    // === Outbox dispatcher ===
    pub outbox_poll_interval_ms: u64,
    pub outbox_batch_size: i64,

    // === Reservations ===
    pub reservation_default_ttl_secs: i64,
    pub reservation_reaper_interval_secs: u64,

    // === Payment circuit breaker ===
    pub payment_circuit_max_failures: u32,
    pub payment_circuit_timeout_ms: u64,
    pub payment_circuit_reset_timeout_ms: u64,

    // === Caches ===
    pub idempotency_ttl_secs: u64,
    pub catalog_product_ttl_secs: u64,
    pub catalog_list_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 25),

            // Floor of 1s keeps a misconfigured dispatcher from spinning
            outbox_poll_interval_ms: env_parse("OUTBOX_POLL_INTERVAL_MS", 5000).max(1000),
            outbox_batch_size: env_parse("OUTBOX_BATCH_SIZE", 100),

            reservation_default_ttl_secs: env_parse("RESERVATION_DEFAULT_TTL_SECS", 900),
            reservation_reaper_interval_secs: env_parse("RESERVATION_REAPER_INTERVAL_SECS", 60),

            payment_circuit_max_failures: env_parse("PAYMENT_CIRCUIT_MAX_FAILURES", 5),
            payment_circuit_timeout_ms: env_parse("PAYMENT_CIRCUIT_TIMEOUT_MS", 10_000),
            payment_circuit_reset_timeout_ms: env_parse("PAYMENT_CIRCUIT_RESET_TIMEOUT_MS", 30_000),

            idempotency_ttl_secs: env_parse("IDEMPOTENCY_TTL_SECS", 86_400),
            catalog_product_ttl_secs: env_parse("CATALOG_PRODUCT_TTL_SECS", 300),
            catalog_list_ttl_secs: env_parse("CATALOG_LIST_TTL_SECS", 120),
        }
    }

    /// Override the fields tests care about, keep env/defaults for the rest
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn outbox_poll_interval(&self) -> Duration {
        Duration::from_millis(self.outbox_poll_interval_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reservation_reaper_interval_secs)
    }

    pub fn payment_call_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_circuit_timeout_ms)
    }

    pub fn payment_reset_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_circuit_reset_timeout_ms)
    }

    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }

    pub fn catalog_product_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_product_ttl_secs)
    }

    pub fn catalog_list_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_list_ttl_secs)
    }

    /// Path of the SQLite database file under the working directory
    pub fn database_file(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.work_dir).join("orders.db")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
