pub mod config;
pub mod controllers;
pub mod error;
pub mod locations;
pub mod middleware;
pub mod models;
pub mod operators;
pub mod services;
pub mod store;

use std::sync::Arc;

use config::Config;
use operators::OperatorRegistry;
use services::{BookingExecutor, FerryAggregator, PaymentReconciler, SessionManager};
use store::{BookingStore, SearchCache, SessionStore};

// Shared state для всего приложения
pub struct AppState {
    pub config: Config,
    pub registry: Arc<OperatorRegistry>,
    pub aggregator: FerryAggregator,
    pub sessions: Arc<SessionManager>,
    pub executor: Arc<BookingExecutor>,
    pub reconciler: Arc<PaymentReconciler>,
    pub search_cache: Arc<dyn SearchCache>,
}

impl AppState {
    /// Сборка состояния из конфигурации и готового реестра адаптеров.
    /// Интеграционные тесты подставляют сюда адаптеры, направленные на
    /// mock-серверы; боевой реестр собирает main.
    pub async fn build(
        config: Config,
        registry: Arc<OperatorRegistry>,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let (session_store, booking_store, search_cache) = build_stores(&config).await?;

        let aggregator = FerryAggregator::new(
            registry.clone(),
            config.circuit_breaker.failure_threshold,
            config.circuit_breaker.timeout_seconds,
            config.ferry.seat_layout_timeout_seconds,
        );
        let sessions = Arc::new(SessionManager::new(
            session_store,
            config.ferry.session_ttl_minutes,
            config.ferry.seat_hold_minutes,
        ));
        let executor = Arc::new(BookingExecutor::new(registry.clone(), booking_store.clone()));
        let reconciler = Arc::new(PaymentReconciler::new(
            booking_store,
            sessions.clone(),
            executor.clone(),
            None,
            config.payment.stale_after_minutes,
        ));

        Ok(Arc::new(Self {
            config,
            registry,
            aggregator,
            sessions,
            executor,
            reconciler,
            search_cache,
        }))
    }
}

type Stores = (
    Arc<dyn SessionStore>,
    Arc<dyn BookingStore>,
    Arc<dyn SearchCache>,
);

/// `APP_STORE=postgres` поднимает Postgres + Redis; любое другое
/// значение даёт процессные in-memory хранилища (dev-режим и тесты).
async fn build_stores(config: &Config) -> Result<Stores, Box<dyn std::error::Error>> {
    match config.app.store.as_str() {
        "postgres" => {
            let db = store::Database::new(&config.database.url, config.database.pool_size).await?;
            db.run_migrations().await?;

            let conn = store::redis::connect(&config.redis.url).await?;
            Ok((
                Arc::new(store::RedisSessionStore::new(conn.clone())),
                Arc::new(store::PgBookingStore::new(db)),
                Arc::new(store::RedisSearchCache::new(conn)),
            ))
        }
        _ => Ok((
            Arc::new(store::MemorySessionStore::new()),
            Arc::new(store::MemoryBookingStore::new()),
            Arc::new(store::MemorySearchCache::new()),
        )),
    }
}
