//! Server state — the composition root
//!
//! `ServerState` holds shared references to every service and is cloned into
//! axum handlers and background workers. Initialization order follows the
//! dependency graph: database, then the process-wide singletons (event bus,
//! cache, breaker, provider), then the domain services, then the workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::{Cache, MemoryCache};
use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::db::DbService;
use crate::db::repository::outbox::OutboxTable;
use crate::events::{EventBus, MemoryEventBus};
use crate::inventory::ReservationReaper;
use crate::outbox::OutboxDispatcher;
use crate::payment::{CircuitBreaker, MockPaymentProvider, PaymentProvider};
use crate::services::{
    CatalogService, IdempotencyStore, InventoryService, OrderService, PaymentService,
};
use crate::utils::AppError;
use sqlx::SqlitePool;

/// Shared server state — cheap to clone, every field is a handle
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration (immutable after startup)
    pub config: Config,
    /// SQLite connection pool
    pub pool: SqlitePool,
    /// Process-wide event bus (broker contract)
    pub event_bus: Arc<dyn EventBus>,
    /// Process-wide KV cache (store contract)
    pub cache: Arc<dyn Cache>,
    /// Idempotency outcome store
    pub idempotency: Arc<IdempotencyStore>,
    /// Product catalog with read-through caching
    pub catalog_service: Arc<CatalogService>,
    /// Order intake and lifecycle
    pub order_service: Arc<OrderService>,
    /// Stock reservation engine
    pub inventory_service: Arc<InventoryService>,
    /// Payment executor
    pub payment_service: Arc<PaymentService>,
    /// Circuit breaker guarding the payment provider
    pub payment_breaker: Arc<CircuitBreaker>,
    /// Readiness flag flipped by the order outbox dispatcher
    pub dispatcher_running: Arc<AtomicBool>,
    /// Readiness flag flipped by the payment outbox dispatcher
    pub payment_dispatcher_running: Arc<AtomicBool>,
    /// Instance epoch (fresh UUID per process start)
    pub epoch: String,
}

impl ServerState {
    /// Initialize with the default (mock) payment provider
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        Self::initialize_with_provider(config, Arc::new(MockPaymentProvider::new())).await
    }

    /// Initialize with an explicit provider implementation.
    ///
    /// Order: work dir, database + migrations, singletons, services.
    pub async fn initialize_with_provider(
        config: &Config,
        provider: Arc<dyn PaymentProvider>,
    ) -> Result<Self, AppError> {
        // 0. Ensure the working directory exists
        std::fs::create_dir_all(&config.work_dir).map_err(|e| {
            AppError::internal(format!("Failed to create work directory: {e}"))
        })?;

        // 1. Database
        let db_path = config.database_file();
        let db = DbService::new(&db_path.to_string_lossy(), config.db_max_connections).await?;
        let pool = db.pool;

        // 2. Process-wide singletons
        let event_bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new());
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let payment_breaker = Arc::new(CircuitBreaker::new(
            "payment-provider",
            config.payment_circuit_max_failures,
            config.payment_call_timeout(),
            config.payment_reset_timeout(),
        ));

        // 3. Services
        let idempotency = Arc::new(IdempotencyStore::new(
            cache.clone(),
            config.idempotency_ttl(),
        ));
        let catalog_service = Arc::new(CatalogService::new(
            pool.clone(),
            cache.clone(),
            config.catalog_product_ttl(),
            config.catalog_list_ttl(),
        ));
        let order_service = Arc::new(OrderService::new(pool.clone(), idempotency.clone()));
        let inventory_service = Arc::new(InventoryService::new(
            pool.clone(),
            config.reservation_default_ttl_secs,
        ));
        let payment_service = Arc::new(PaymentService::new(
            pool.clone(),
            idempotency.clone(),
            provider,
            payment_breaker.clone(),
        ));

        Ok(Self {
            config: config.clone(),
            pool,
            event_bus,
            cache,
            idempotency,
            catalog_service,
            order_service,
            inventory_service,
            payment_service,
            payment_breaker,
            dispatcher_running: Arc::new(AtomicBool::new(false)),
            payment_dispatcher_running: Arc::new(AtomicBool::new(false)),
            epoch: shared::util::new_id(),
        })
    }

    /// Start the long-lived workers. Must run before `Server::run()`.
    ///
    /// - **Worker**: order outbox dispatcher, payment outbox dispatcher
    /// - **Periodic**: reservation TTL reaper
    ///
    /// Returns the registry used for graceful shutdown.
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        self.register_outbox_dispatcher(
            &mut tasks,
            "outbox_dispatcher",
            OutboxTable::Order,
            self.dispatcher_running.clone(),
        );
        self.register_outbox_dispatcher(
            &mut tasks,
            "payment_outbox_dispatcher",
            OutboxTable::Payment,
            self.payment_dispatcher_running.clone(),
        );
        self.register_reservation_reaper(&mut tasks);

        tasks.log_summary();
        tasks
    }

    fn register_outbox_dispatcher(
        &self,
        tasks: &mut BackgroundTasks,
        name: &'static str,
        table: OutboxTable,
        running: Arc<AtomicBool>,
    ) {
        let dispatcher = OutboxDispatcher::new(
            self.pool.clone(),
            self.event_bus.clone(),
            table,
            self.config.outbox_poll_interval(),
            self.config.outbox_batch_size,
            tasks.shutdown_token(),
            running,
        );
        tasks.spawn(name, TaskKind::Worker, async move {
            dispatcher.run().await;
        });
    }

    fn register_reservation_reaper(&self, tasks: &mut BackgroundTasks) {
        let reaper = ReservationReaper::new(
            self.inventory_service.clone(),
            self.config.reaper_interval(),
            tasks.shutdown_token(),
        );
        tasks.spawn("reservation_reaper", TaskKind::Periodic, async move {
            reaper.run().await;
        });
    }

    /// Readiness: the database answers and the order dispatcher loop is up
    pub fn is_dispatcher_running(&self) -> bool {
        self.dispatcher_running.load(Ordering::SeqCst)
    }
}
