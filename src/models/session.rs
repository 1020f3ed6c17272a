use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::ferry::FerryOperator;
use super::search::SearchParams;

/// Сессия бронирования. Живёт в Redis с TTL и переносит контекст выбора
/// (рейс, класс, места, пассажиров) между шагами UI. Любое чтение после
/// `expires_at` считается чтением несуществующей сессии.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FerryBookingSession {
    pub session_id: Uuid,
    pub search_params: SearchParams,
    pub selected_ferry: SelectedFerry,
    pub selected_class: SelectedClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_reservation: Option<SeatReservation>,
    #[serde(default)]
    pub passengers: Vec<PassengerDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactDetails>,
    /// INR. Места занимают взрослые и дети, младенцы бесплатно.
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl FerryBookingSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn seat_numbers(&self) -> &[String] {
        self.seat_reservation
            .as_ref()
            .map(|r| r.seats.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedFerry {
    pub operator: FerryOperator,
    pub ferry_id: String,
    pub ferry_name: String,
    /// Исходный ответ оператора по рейсу. Адаптер на шаге покупки
    /// вынимает отсюда свои ship_id/route_id/schedule_id, повторный
    /// поиск не нужен.
    pub route_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedClass {
    pub class_id: String,
    pub class_name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatReservation {
    pub seats: Vec<String>,
    pub expiry_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PassengerDetail {
    #[validate(length(min = 2, max = 60))]
    pub name: String,
    #[validate(range(max = 120))]
    pub age: u32,
    pub gender: Gender,
    #[validate(length(min = 2, max = 40))]
    pub nationality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport: Option<String>,
    #[serde(default)]
    pub is_infant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 7, max = 16))]
    pub phone: String,
}
