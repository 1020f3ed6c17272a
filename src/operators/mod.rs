//! Адаптеры внешних паромных операторов.
//!
//! Каждый адаптер прячет за общим трейтом свой протокол целиком:
//! аутентификацию (статический токен, логин с кэшем, подпись SHA-512),
//! форматы дат, коды локаций и разбор ответов. Наружу выходят только
//! канонические модели и `OperatorError`.

pub mod greenocean;
pub mod makruzz;
pub mod sealink;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{OperatorError, OperatorErrorKind};
use crate::models::booking::BookingCallOutcome;
use crate::models::ferry::FerryOperator;
use crate::models::search::SearchParams;
use crate::models::seat::{SeatLayout, SeatLayoutRequest};
use crate::models::session::{FerryBookingSession, SelectedFerry};
use crate::models::UnifiedFerryResult;

pub use greenocean::GreenOceanAdapter;
pub use makruzz::MakruzzAdapter;
pub use sealink::SealinkAdapter;

#[async_trait]
pub trait OperatorAdapter: Send + Sync {
    fn operator(&self) -> FerryOperator;

    /// Поиск рейсов на дату. Транзиентные сбои ретраятся внутри.
    async fn search(&self, params: &SearchParams) -> Result<Vec<UnifiedFerryResult>, OperatorError>;

    /// Схема мест выбранного класса. Для операторов с автопосадкой
    /// возвращает `SeatLayout::AutoAssignOnly` без похода в сеть.
    async fn seat_layout(&self, request: &SeatLayoutRequest) -> Result<SeatLayout, OperatorError>;

    /// Временная блокировка мест до оплаты. Поддерживает только
    /// Green Ocean; остальные возвращают `None` — место арбитрирует
    /// сам оператор в момент выкупа.
    async fn hold_seats(
        &self,
        _ferry: &SelectedFerry,
        _class_id: &str,
        _seats: &[String],
        _params: &SearchParams,
    ) -> Result<Option<DateTime<Utc>>, OperatorError> {
        Ok(None)
    }

    /// Выкуп брони. Никогда не ретраится: таймаут здесь означает
    /// `Ambiguous`, а не ошибку.
    async fn book(&self, session: &FerryBookingSession) -> BookingCallOutcome;
}

/* ---------- registry ---------- */

pub struct OperatorRegistry {
    adapters: HashMap<FerryOperator, Arc<dyn OperatorAdapter>>,
}

impl OperatorRegistry {
    pub fn new(adapters: Vec<Arc<dyn OperatorAdapter>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|a| (a.operator(), a))
            .collect();
        Self { adapters }
    }

    pub fn get(&self, operator: FerryOperator) -> Option<Arc<dyn OperatorAdapter>> {
        self.adapters.get(&operator).cloned()
    }

    /// Зарегистрированные операторы в стабильном порядке.
    pub fn operators(&self) -> Vec<FerryOperator> {
        FerryOperator::ALL
            .into_iter()
            .filter(|op| self.adapters.contains_key(op))
            .collect()
    }
}

/* ---------- shared helpers ---------- */

/// Ретрай с экспоненциальной паузой: 250ms, 500ms, ...
/// Неретраябельные ошибки (авторизация, занятые места, валидация)
/// отдаются сразу.
pub(crate) async fn call_with_retry<T, F, Fut>(
    operator: FerryOperator,
    what: &'static str,
    extra_attempts: u32,
    mut call: F,
) -> Result<T, OperatorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OperatorError>>,
{
    let mut delay = Duration::from_millis(250);
    let mut attempt = 0u32;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.retryable() && attempt < extra_attempts => {
                attempt += 1;
                tracing::warn!(
                    operator = %operator,
                    what,
                    attempt,
                    error = %err,
                    "operator call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Переводит текст отказа оператора в типизированную ошибку.
/// Список подстрок намеренно короткий: всё неопознанное считается
/// транзиентным `Upstream` и может быть повторено.
pub(crate) fn classify_operator_failure(
    operator: FerryOperator,
    message: impl Into<String>,
) -> OperatorError {
    const AUTH: &[&str] = &[
        "unauthorized",
        "invalid hash",
        "invalid token",
        "invalid credentials",
        "authentication failed",
    ];
    const SEATS: &[&str] = &[
        "already booked",
        "seat not available",
        "seats not available",
        "no longer available",
        "sold out",
    ];
    const VALIDATION: &[&str] = &["validation", "invalid request", "invalid parameter", "missing parameter"];

    let message = message.into();
    let lower = message.to_lowercase();

    let kind = if AUTH.iter().any(|needle| lower.contains(needle)) {
        OperatorErrorKind::Auth
    } else if SEATS.iter().any(|needle| lower.contains(needle)) {
        OperatorErrorKind::SeatUnavailable
    } else if VALIDATION.iter().any(|needle| lower.contains(needle)) {
        OperatorErrorKind::Validation
    } else {
        OperatorErrorKind::Upstream
    };

    OperatorError::new(operator, kind, message)
}

pub(crate) fn map_transport_error(
    operator: FerryOperator,
    context: &str,
    err: reqwest::Error,
) -> OperatorError {
    if err.is_timeout() {
        OperatorError::timeout(operator, format!("{context}: request timed out"))
    } else {
        OperatorError::upstream(operator, format!("{context}: {err}"))
    }
}

pub(crate) fn map_http_status(
    operator: FerryOperator,
    context: &str,
    status: reqwest::StatusCode,
) -> OperatorError {
    let kind = if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        OperatorErrorKind::Auth
    } else if status.is_client_error() {
        OperatorErrorKind::Validation
    } else {
        OperatorErrorKind::Upstream
    };
    OperatorError::new(operator, kind, format!("{context}: HTTP {status}"))
}

/// Sealink принимает даты как `d-m-yyyy` без ведущих нулей:
/// 2025-08-05 -> "5-8-2025".
pub(crate) fn sealink_date(date: NaiveDate) -> String {
    use chrono::Datelike;
    format!("{}-{}-{}", date.day(), date.month(), date.year())
}

/// Green Ocean ждёт `dd-mm-yyyy` с нулями: 2025-08-05 -> "05-08-2025".
pub(crate) fn green_ocean_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

pub(crate) fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .ok()
        .or_else(|| NaiveTime::parse_from_str(raw, "%H:%M").ok())
}

pub(crate) fn format_duration(departure: NaiveTime, arrival: NaiveTime) -> String {
    let mut minutes = (arrival - departure).num_minutes();
    if minutes < 0 {
        minutes += 24 * 60;
    }
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

/// Флаги вида `true`/`1` у операторов взаимозаменяемы.
pub(crate) fn truthy(value: &serde_json::Value) -> bool {
    value
        .as_bool()
        .unwrap_or_else(|| value.as_i64() == Some(1))
}

/// Идентификаторы (booking_id, pnr) приходят то строкой, то числом.
pub(crate) fn value_to_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/* ---------- lenient JSON numbers ---------- */
// PHP-бэкенды операторов отдают числа то числом, то строкой.

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

pub(crate) fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_f64(deserializer).map(|n| n.max(0.0) as u32)
}

pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_f64(deserializer).map(|n| n as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealink_dates_have_no_leading_zeros() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 5).unwrap();
        assert_eq!(sealink_date(date), "5-8-2025");
        let nov = NaiveDate::from_ymd_opt(2025, 11, 21).unwrap();
        assert_eq!(sealink_date(nov), "21-11-2025");
    }

    #[test]
    fn green_ocean_dates_are_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 5).unwrap();
        assert_eq!(green_ocean_date(date), "05-08-2025");
        let dec = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        assert_eq!(green_ocean_date(dec), "25-12-2024");
    }

    #[test]
    fn duration_handles_plain_and_overnight_legs() {
        let dep = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let arr = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        assert_eq!(format_duration(dep, arr), "1h 30m");

        let late = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        let early = NaiveTime::from_hms_opt(1, 0, 0).unwrap();
        assert_eq!(format_duration(late, early), "1h 30m");
    }

    #[test]
    fn classification_covers_known_refusals() {
        let auth = classify_operator_failure(FerryOperator::Greenocean, "Invalid hash supplied");
        assert_eq!(auth.kind, OperatorErrorKind::Auth);
        assert!(!auth.retryable());

        let seats =
            classify_operator_failure(FerryOperator::Sealink, "Seat A4 already booked by another agent");
        assert_eq!(seats.kind, OperatorErrorKind::SeatUnavailable);

        let validation = classify_operator_failure(FerryOperator::Makruzz, "Validation error: bad date");
        assert_eq!(validation.kind, OperatorErrorKind::Validation);

        let unknown = classify_operator_failure(FerryOperator::Makruzz, "Internal server error");
        assert_eq!(unknown.kind, OperatorErrorKind::Upstream);
        assert!(unknown.retryable());
    }

    #[test]
    fn lenient_numbers_accept_strings() {
        #[derive(Deserialize)]
        struct Fare {
            #[serde(deserialize_with = "super::lenient_f64")]
            total: f64,
            #[serde(deserialize_with = "super::lenient_u32")]
            seats: u32,
        }

        let typed: Fare = serde_json::from_str(r#"{"total": 1550.0, "seats": 12}"#).unwrap();
        assert_eq!(typed.total, 1550.0);
        assert_eq!(typed.seats, 12);

        let stringy: Fare = serde_json::from_str(r#"{"total": "1550", "seats": "12"}"#).unwrap();
        assert_eq!(stringy.total, 1550.0);
        assert_eq!(stringy.seats, 12);
    }

    #[test]
    fn parses_both_time_shapes() {
        assert_eq!(
            parse_hhmm("08:30").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
        assert_eq!(
            parse_hhmm("14:15:00").unwrap(),
            NaiveTime::from_hms_opt(14, 15, 0).unwrap()
        );
        assert!(parse_hhmm("half past nine").is_none());
    }
}
