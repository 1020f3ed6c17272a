use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ferry::FerryOperator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Selected,
    Booked,
    Blocked,
}

/// Палуба Sealink: B — нижняя (Royal), P — верхняя (Luxury).
/// У Green Ocean палуба одна, tier отсутствует.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatTier {
    B,
    P,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: String,
    pub number: String,
    pub display_number: String,
    pub status: SeatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<SeatTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Ни один из операторов пока не размечает места для маломобильных
    /// пассажиров, флаг заполняется false.
    #[serde(default)]
    pub is_accessible: bool,
    pub is_premium: bool,
}

impl Seat {
    pub fn is_free(&self) -> bool {
        self.status == SeatStatus::Available
    }
}

/// Результат запроса схемы мест. `AutoAssignOnly` — легальный ответ
/// оператора без выбора мест (Makruzz сажает сам), а не ошибка.
#[derive(Debug, Clone)]
pub enum SeatLayout {
    Manual { seats: Vec<Seat> },
    AutoAssignOnly,
}

impl SeatLayout {
    pub fn supports_manual_selection(&self) -> bool {
        matches!(self, SeatLayout::Manual { .. })
    }
}

/// Запрос схемы мест. `ferry_id` и `class_id` — идентификаторы из
/// результата поиска; `route_id` нужен только Green Ocean.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SeatLayoutRequest {
    pub operator: FerryOperator,
    #[validate(length(min = 1, max = 40))]
    pub ferry_id: String,
    #[validate(length(min = 1, max = 40))]
    pub class_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,
    pub travel_date: NaiveDate,
    #[validate(length(min = 1, max = 40))]
    pub from: String,
    #[validate(length(min = 1, max = 40))]
    pub to: String,
}
