use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OperatorError;

use super::ferry::FerryOperator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Исход вызова оператора неизвестен (таймаут после отправки).
    /// Требует ручной сверки, автоматом не перезапускается.
    Pending,
    Confirmed,
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "failed" => Some(BookingStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Failed,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "confirmed" => Some(PaymentStatus::Confirmed),
            "failed" => Some(PaymentStatus::Failed),
            "expired" => Some(PaymentStatus::Expired),
            _ => None,
        }
    }
}

/// Платёжная попытка, создаётся на checkout до редиректа в шлюз.
/// Переходы статуса строго pending -> confirmed|failed|expired,
/// выполняются условным UPDATE — повторный вебхук не пройдёт.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttempt {
    pub payment_ref: String,
    pub session_id: Uuid,
    pub amount_paise: i64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Запись об исходе вызова оператора. Пишется и при успехе, и при
/// провале, и при неопределённости: деньги уже списаны, поэтому след
/// для ручного разбора обязателен.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderBooking {
    pub id: Uuid,
    pub session_id: Uuid,
    pub payment_ref: String,
    pub operator: FerryOperator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_booking_id: Option<String>,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Трёхзначный исход вызова бронирования. `Ambiguous` — отдельный
/// случай: запрос мог дойти, ответ не получен, у оператора возможно
/// существует живая бронь. Приравнивать его к `Failed` нельзя.
#[derive(Debug, Clone)]
pub enum BookingCallOutcome {
    Confirmed {
        pnr: String,
        operator_booking_id: Option<String>,
        raw_response: serde_json::Value,
    },
    Failed(OperatorError),
    Ambiguous(OperatorError),
}
