//! Postgres: пул соединений, миграции и боевой стор платежей/броней.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::info;
use uuid::Uuid;

use crate::error::{FerryError, FerryResult};
use crate::models::{
    BookingStatus, FerryOperator, PaymentAttempt, PaymentStatus, ProviderBooking,
};

use super::BookingStore;

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }
}

type PaymentRow = (String, Uuid, i64, String, DateTime<Utc>, DateTime<Utc>);

type BookingRow = (
    Uuid,
    Uuid,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<serde_json::Value>,
    Option<String>,
    DateTime<Utc>,
);

pub struct PgBookingStore {
    db: Database,
}

impl PgBookingStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn payment_from_row(row: PaymentRow) -> FerryResult<PaymentAttempt> {
        let (payment_ref, session_id, amount_paise, status, created_at, updated_at) = row;
        let status = PaymentStatus::parse(&status)
            .ok_or_else(|| FerryError::Store(format!("unknown payment status: {status}")))?;

        Ok(PaymentAttempt {
            payment_ref,
            session_id,
            amount_paise,
            status,
            created_at,
            updated_at,
        })
    }

    fn booking_from_row(row: BookingRow) -> FerryResult<ProviderBooking> {
        let (
            id,
            session_id,
            payment_ref,
            operator,
            pnr,
            operator_booking_id,
            status,
            provider_response,
            error_message,
            created_at,
        ) = row;

        let operator = FerryOperator::parse(&operator)
            .ok_or_else(|| FerryError::Store(format!("unknown operator: {operator}")))?;
        let status = BookingStatus::parse(&status)
            .ok_or_else(|| FerryError::Store(format!("unknown booking status: {status}")))?;

        Ok(ProviderBooking {
            id,
            session_id,
            payment_ref,
            operator,
            pnr,
            operator_booking_id,
            status,
            provider_response,
            error_message,
            created_at,
        })
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn create_payment(&self, payment: &PaymentAttempt) -> FerryResult<()> {
        sqlx::query(
            "INSERT INTO ferry_payments (payment_ref, session_id, amount_paise, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&payment.payment_ref)
        .bind(payment.session_id)
        .bind(payment.amount_paise)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.db.pool)
        .await?;

        Ok(())
    }

    async fn get_payment(&self, payment_ref: &str) -> FerryResult<Option<PaymentAttempt>> {
        let row: Option<PaymentRow> = sqlx::query_as(
            "SELECT payment_ref, session_id, amount_paise, status, created_at, updated_at
             FROM ferry_payments
             WHERE payment_ref = $1",
        )
        .bind(payment_ref)
        .fetch_optional(&self.db.pool)
        .await?;

        row.map(Self::payment_from_row).transpose()
    }

    async fn payment_by_session(&self, session_id: Uuid) -> FerryResult<Option<PaymentAttempt>> {
        let row: Option<PaymentRow> = sqlx::query_as(
            "SELECT payment_ref, session_id, amount_paise, status, created_at, updated_at
             FROM ferry_payments
             WHERE session_id = $1
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.db.pool)
        .await?;

        row.map(Self::payment_from_row).transpose()
    }

    async fn transition_payment(
        &self,
        payment_ref: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> FerryResult<bool> {
        // Условный UPDATE вместо SELECT-потом-UPDATE: два конкурентных
        // вебхука не проведут один платёж дважды.
        let result = sqlx::query(
            "UPDATE ferry_payments
             SET status = $1, updated_at = NOW()
             WHERE payment_ref = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(payment_ref)
        .bind(from.as_str())
        .execute(&self.db.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> FerryResult<Vec<PaymentAttempt>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            "SELECT payment_ref, session_id, amount_paise, status, created_at, updated_at
             FROM ferry_payments
             WHERE status = 'pending' AND created_at < $1
             ORDER BY created_at",
        )
        .bind(cutoff)
        .fetch_all(&self.db.pool)
        .await?;

        rows.into_iter().map(Self::payment_from_row).collect()
    }

    async fn insert_booking(&self, booking: &ProviderBooking) -> FerryResult<()> {
        sqlx::query(
            "INSERT INTO ferry_bookings
                 (id, session_id, payment_ref, operator, pnr, operator_booking_id,
                  status, provider_response, error_message, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(booking.id)
        .bind(booking.session_id)
        .bind(&booking.payment_ref)
        .bind(booking.operator.as_str())
        .bind(&booking.pnr)
        .bind(&booking.operator_booking_id)
        .bind(booking.status.as_str())
        .bind(&booking.provider_response)
        .bind(&booking.error_message)
        .bind(booking.created_at)
        .execute(&self.db.pool)
        .await?;

        Ok(())
    }

    async fn booking_by_session(&self, session_id: Uuid) -> FerryResult<Option<ProviderBooking>> {
        let row: Option<BookingRow> = sqlx::query_as(
            "SELECT id, session_id, payment_ref, operator, pnr, operator_booking_id,
                    status, provider_response, error_message, created_at
             FROM ferry_bookings
             WHERE session_id = $1
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.db.pool)
        .await?;

        row.map(Self::booking_from_row).transpose()
    }
}
