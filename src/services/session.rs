//! Сессии бронирования.
//!
//! Сессия переносит выбор пользователя (рейс, класс, места, пассажиров)
//! между шагами search -> seats -> passengers -> checkout. TTL жёсткий:
//! 30 минут от создания, продление не предусмотрено. Блокировка мест
//! живёт своей жизнью (15 минут) и может истечь раньше сессии — тогда
//! конфликт всплывёт на выкупе как `SeatUnavailable`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::{FerryError, FerryResult};
use crate::models::session::{
    ContactDetails, PassengerDetail, SeatReservation, SelectedClass, SelectedFerry,
};
use crate::models::{FerryBookingSession, SearchParams, UnifiedFerryResult};
use crate::store::SessionStore;

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    session_ttl: Duration,
    seat_hold: Duration,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        session_ttl_minutes: i64,
        seat_hold_minutes: i64,
    ) -> Self {
        Self {
            store,
            session_ttl: Duration::minutes(session_ttl_minutes),
            seat_hold: Duration::minutes(seat_hold_minutes),
        }
    }

    /// Создаёт сессию по выбранному рейсу и классу. `hold_expiry` —
    /// дедлайн блокировки мест, если оператор его сообщил; иначе
    /// действует собственный 15-минутный дедлайн.
    pub async fn create(
        &self,
        params: SearchParams,
        ferry: UnifiedFerryResult,
        class_id: &str,
        seats: Vec<String>,
        hold_expiry: Option<DateTime<Utc>>,
    ) -> FerryResult<FerryBookingSession> {
        let class = ferry.class(class_id).ok_or_else(|| {
            FerryError::Validation(format!("class {} is not offered on {}", class_id, ferry.id))
        })?;

        if !seats.is_empty() && !ferry.features.supports_seat_selection {
            return Err(FerryError::Validation(format!(
                "{} assigns seats automatically, seat selection is not available",
                ferry.operator
            )));
        }

        let now = Utc::now();
        let seat_reservation = if seats.is_empty() {
            None
        } else {
            Some(SeatReservation {
                seats,
                expiry_time: hold_expiry.unwrap_or(now + self.seat_hold),
            })
        };

        let session = FerryBookingSession {
            session_id: Uuid::new_v4(),
            total_amount: class.price * f64::from(params.seated_passengers()),
            selected_class: SelectedClass {
                class_id: class.id.clone(),
                class_name: class.name.clone(),
                price: class.price,
            },
            selected_ferry: SelectedFerry {
                operator: ferry.operator,
                ferry_id: ferry.id.clone(),
                ferry_name: ferry.ferry_name.clone(),
                route_data: ferry.operator_data.original_response,
            },
            search_params: params,
            seat_reservation,
            passengers: Vec::new(),
            contact: None,
            created_at: now,
            expires_at: now + self.session_ttl,
        };

        self.store.put(&session).await?;
        info!(
            session_id = %session.session_id,
            operator = %session.selected_ferry.operator,
            total_amount = session.total_amount,
            "booking session created"
        );
        Ok(session)
    }

    /// Живая сессия или ошибка: `SessionNotFound` для незнакомого id,
    /// `SessionExpired` начиная ровно с `expires_at`.
    pub async fn get_valid(&self, session_id: Uuid) -> FerryResult<FerryBookingSession> {
        let session = self
            .store
            .get(session_id)
            .await?
            .ok_or(FerryError::SessionNotFound)?;

        if session.is_expired_at(Utc::now()) {
            return Err(FerryError::SessionExpired);
        }
        Ok(session)
    }

    /// Чтение без проверки срока. Нужно сверке платежей: опоздавший
    /// вебхук должен увидеть истёкшую сессию, чтобы оформить возврат.
    pub async fn get_any(&self, session_id: Uuid) -> FerryResult<FerryBookingSession> {
        self.store
            .get(session_id)
            .await?
            .ok_or(FerryError::SessionNotFound)
    }

    /// Записывает пассажиров и контакт в сессию. Состав сверяется с
    /// параметрами поиска, TTL сессии не продлевается.
    pub async fn attach_passengers(
        &self,
        session_id: Uuid,
        passengers: Vec<PassengerDetail>,
        contact: ContactDetails,
    ) -> FerryResult<FerryBookingSession> {
        let mut session = self.get_valid(session_id).await?;

        for passenger in &passengers {
            passenger.validate()?;
            if passenger.is_infant && passenger.age > 2 {
                return Err(FerryError::Validation(format!(
                    "{} is {} years old and cannot travel as an infant",
                    passenger.name, passenger.age
                )));
            }
        }
        contact.validate()?;

        let seated = passengers.iter().filter(|p| !p.is_infant).count() as u32;
        let infants = passengers.len() as u32 - seated;
        let params = &session.search_params;
        if seated != params.seated_passengers() || infants != params.infants {
            return Err(FerryError::Validation(format!(
                "expected {} seated passengers and {} infants, got {} and {}",
                params.seated_passengers(),
                params.infants,
                seated,
                infants
            )));
        }

        session.passengers = passengers;
        session.contact = Some(contact);
        self.store.put(&session).await?;
        info!(session_id = %session_id, "passenger details attached");
        Ok(session)
    }

    /// Сессия выкуплена: убираем её, чтобы повторный checkout не создал
    /// второй платёж за уже купленные билеты.
    pub async fn consume(&self, session_id: Uuid) -> FerryResult<()> {
        self.store.delete(session_id).await
    }
}
