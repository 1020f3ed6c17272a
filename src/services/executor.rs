//! Исполнение брони у оператора после подтверждения оплаты.
//!
//! Сюда попадают только платежи, выигравшие условный переход
//! pending -> confirmed, поэтому каждый вызов — ровно одна попытка
//! выкупа. След пишется при любом исходе: деньги уже списаны, и запись
//! со статусом `pending` (исход неизвестен) важнее всего остального —
//! по ней работает ручная сверка с оператором.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{FerryError, FerryResult};
use crate::models::booking::BookingCallOutcome;
use crate::models::{BookingStatus, FerryBookingSession, PaymentAttempt, ProviderBooking};
use crate::operators::OperatorRegistry;
use crate::store::BookingStore;

pub struct BookingExecutor {
    registry: Arc<OperatorRegistry>,
    bookings: Arc<dyn BookingStore>,
}

impl BookingExecutor {
    pub fn new(registry: Arc<OperatorRegistry>, bookings: Arc<dyn BookingStore>) -> Self {
        Self { registry, bookings }
    }

    /// Одна попытка выкупа брони за платёж `payment_ref`.
    ///
    /// Истёкшая сессия и пустой список пассажиров отсекаются до любого
    /// сетевого вызова — в этих случаях записи о брони нет, решение
    /// о возврате денег принимает вызывающая сторона.
    pub async fn execute(
        &self,
        session: &FerryBookingSession,
        payment_ref: &str,
    ) -> FerryResult<ProviderBooking> {
        if session.is_expired_at(Utc::now()) {
            return Err(FerryError::SessionExpired);
        }
        if session.passengers.is_empty() {
            return Err(FerryError::Validation(
                "passenger details are required before booking".into(),
            ));
        }

        let operator = session.selected_ferry.operator;
        let adapter = self.registry.get(operator).ok_or_else(|| {
            FerryError::Validation(format!("operator {} is not configured", operator))
        })?;

        info!(
            session_id = %session.session_id,
            payment_ref,
            operator = %operator,
            amount = session.total_amount,
            "executing provider booking"
        );

        let outcome = adapter.book(session).await;

        let mut record = ProviderBooking {
            id: Uuid::new_v4(),
            session_id: session.session_id,
            payment_ref: payment_ref.to_string(),
            operator,
            pnr: None,
            operator_booking_id: None,
            status: BookingStatus::Failed,
            provider_response: None,
            error_message: None,
            created_at: Utc::now(),
        };

        match outcome {
            BookingCallOutcome::Confirmed {
                pnr,
                operator_booking_id,
                raw_response,
            } => {
                info!(
                    session_id = %session.session_id,
                    operator = %operator,
                    pnr = %pnr,
                    "provider booking confirmed"
                );
                record.pnr = Some(pnr);
                record.operator_booking_id = operator_booking_id;
                record.status = BookingStatus::Confirmed;
                record.provider_response = Some(raw_response);
            }
            BookingCallOutcome::Failed(err) => {
                warn!(
                    session_id = %session.session_id,
                    operator = %operator,
                    error = %err,
                    "provider booking failed, refund workflow required"
                );
                record.status = BookingStatus::Failed;
                record.error_message = Some(err.to_string());
            }
            BookingCallOutcome::Ambiguous(err) => {
                // Запрос мог дойти: у оператора возможно есть живая
                // бронь. Не failed и не confirmed — pending до ручной
                // сверки.
                // TODO: когда у операторов появится эндпоинт проверки
                // статуса брони, разбирать pending-записи автоматически.
                error!(
                    session_id = %session.session_id,
                    operator = %operator,
                    error = %err,
                    "provider booking outcome UNKNOWN, manual reconciliation required"
                );
                record.status = BookingStatus::Pending;
                record.error_message = Some(err.to_string());
            }
        }

        self.bookings.insert_booking(&record).await?;
        Ok(record)
    }

    /// Последняя запись о брони по сессии, для HTTP-выдачи.
    pub async fn booking_for_session(
        &self,
        session_id: Uuid,
    ) -> FerryResult<Option<ProviderBooking>> {
        self.bookings.booking_by_session(session_id).await
    }

    /// Последний платёж сессии. Нужен статусному эндпоинту, чтобы
    /// отличать "ещё не оплачено" от "брони нет и не будет".
    pub async fn payment_for_session(
        &self,
        session_id: Uuid,
    ) -> FerryResult<Option<PaymentAttempt>> {
        self.bookings.payment_by_session(session_id).await
    }
}
