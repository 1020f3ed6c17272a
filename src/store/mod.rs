//! Хранилища состояния: сессии, платежи, брони, кеш поиска.
//!
//! Сессии и кеш поиска эфемерны и живут в Redis, платежи и брони — это
//! денежный след, он идёт в Postgres. Для локальной разработки и тестов
//! есть in-memory реализации (`APP_STORE=memory`).

pub mod memory;
pub mod postgres;
pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::FerryResult;
use crate::models::{FerryBookingSession, PaymentAttempt, PaymentStatus, ProviderBooking};

pub use memory::{MemoryBookingStore, MemorySearchCache, MemorySessionStore};
pub use postgres::{Database, PgBookingStore};
pub use redis::{RedisSearchCache, RedisSessionStore};

/// Сессии бронирования. `get` возвращает и логически истёкшие сессии —
/// решение о годности принимает вызывающий слой.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session: &FerryBookingSession) -> FerryResult<()>;
    async fn get(&self, session_id: Uuid) -> FerryResult<Option<FerryBookingSession>>;
    async fn delete(&self, session_id: Uuid) -> FerryResult<()>;
}

/// Платёжные попытки и записи о бронях у операторов.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create_payment(&self, payment: &PaymentAttempt) -> FerryResult<()>;

    async fn get_payment(&self, payment_ref: &str) -> FerryResult<Option<PaymentAttempt>>;

    /// Последний платёж сессии, независимо от статуса.
    async fn payment_by_session(&self, session_id: Uuid) -> FerryResult<Option<PaymentAttempt>>;

    /// Условный переход статуса `from` -> `to`. Возвращает true, только
    /// если переход выполнил именно этот вызов. Повторный вебхук и
    /// гонка вебхука со sweeper-ом разрешаются здесь, а не в хэндлерах.
    async fn transition_payment(
        &self,
        payment_ref: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> FerryResult<bool>;

    /// Платежи, зависшие в pending раньше отметки `cutoff`.
    async fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> FerryResult<Vec<PaymentAttempt>>;

    async fn insert_booking(&self, booking: &ProviderBooking) -> FerryResult<()>;

    /// Последняя запись о брони по сессии.
    async fn booking_by_session(&self, session_id: Uuid) -> FerryResult<Option<ProviderBooking>>;
}

/// Кеш агрегированных результатов поиска. Значение хранится готовой
/// JSON-строкой, чтобы на HIT отдавать её без повторной сериализации.
#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get(&self, key: &str) -> FerryResult<Option<String>>;
    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> FerryResult<()>;
}
