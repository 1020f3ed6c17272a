//! Классификация ошибок ферри-шлюза.
//!
//! Два уровня: `OperatorError` описывает сбой одного внешнего оператора
//! (таймаут, авторизация, занятые места), `FerryError` — ошибку уровня
//! сервиса, которую видит HTTP-слой. Ошибка одного оператора при поиске
//! не фатальна и остаётся внутри агрегированного ответа.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::models::ferry::FerryOperator;

/* ---------- operator-level errors ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorErrorKind {
    /// Оператор не ответил в отведённый таймаут. Для бронирования это
    /// НЕ означает, что брони нет.
    Timeout,
    /// Неверные креды / протухший токен / неверный hash_string.
    Auth,
    /// Оператор отверг сам запрос (неверные параметры).
    Validation,
    /// Места заняты или уже выкуплены.
    SeatUnavailable,
    /// Circuit breaker оператора открыт, вызов не выполнялся.
    CircuitOpen,
    /// 5xx, сетевые сбои, нечитаемые ответы.
    Upstream,
}

impl OperatorErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorErrorKind::Timeout => "timeout",
            OperatorErrorKind::Auth => "auth",
            OperatorErrorKind::Validation => "validation",
            OperatorErrorKind::SeatUnavailable => "seat_unavailable",
            OperatorErrorKind::CircuitOpen => "circuit_open",
            OperatorErrorKind::Upstream => "upstream",
        }
    }
}

impl std::fmt::Display for OperatorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{operator} operator {kind}: {message}")]
pub struct OperatorError {
    pub operator: FerryOperator,
    pub kind: OperatorErrorKind,
    pub message: String,
}

impl OperatorError {
    pub fn new(operator: FerryOperator, kind: OperatorErrorKind, message: impl Into<String>) -> Self {
        Self {
            operator,
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(operator: FerryOperator, message: impl Into<String>) -> Self {
        Self::new(operator, OperatorErrorKind::Timeout, message)
    }

    pub fn upstream(operator: FerryOperator, message: impl Into<String>) -> Self {
        Self::new(operator, OperatorErrorKind::Upstream, message)
    }

    pub fn circuit_open(operator: FerryOperator) -> Self {
        Self::new(
            operator,
            OperatorErrorKind::CircuitOpen,
            "circuit breaker is open, operator temporarily disabled",
        )
    }

    /// Повторять имеет смысл только transient-сбои. Отказы авторизации,
    /// валидации и занятые места при ретрае не исчезнут.
    pub fn retryable(&self) -> bool {
        matches!(
            self.kind,
            OperatorErrorKind::Timeout | OperatorErrorKind::Upstream
        )
    }
}

/* ---------- service-level errors ---------- */

#[derive(Debug, thiserror::Error)]
pub enum FerryError {
    #[error("unknown location: {0}")]
    LocationNotFound(String),

    #[error("route {from} -> {to} is not served by {operator}")]
    RouteNotSupported {
        operator: FerryOperator,
        from: String,
        to: String,
    },

    #[error("booking session not found")]
    SessionNotFound,

    #[error("booking session has expired")]
    SessionExpired,

    #[error("selected seats are no longer available: {0}")]
    SeatUnavailable(String),

    #[error("payment is not confirmed for session {0}")]
    PaymentNotConfirmed(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error("store error: {0}")]
    Store(String),
}

pub type FerryResult<T> = Result<T, FerryError>;

impl From<sqlx::Error> for FerryError {
    fn from(err: sqlx::Error) -> Self {
        FerryError::Store(err.to_string())
    }
}

impl From<redis::RedisError> for FerryError {
    fn from(err: redis::RedisError) -> Self {
        FerryError::Store(err.to_string())
    }
}

impl From<validator::ValidationErrors> for FerryError {
    fn from(err: validator::ValidationErrors) -> Self {
        FerryError::Validation(err.to_string())
    }
}

/* ---------- HTTP mapping ---------- */

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<FerryOperator>,
}

impl FerryError {
    fn status_code(&self) -> StatusCode {
        match self {
            FerryError::LocationNotFound(_) => StatusCode::BAD_REQUEST,
            FerryError::RouteNotSupported { .. } => StatusCode::BAD_REQUEST,
            FerryError::SessionNotFound => StatusCode::NOT_FOUND,
            FerryError::SessionExpired => StatusCode::GONE,
            FerryError::SeatUnavailable(_) => StatusCode::CONFLICT,
            FerryError::PaymentNotConfirmed(_) => StatusCode::PAYMENT_REQUIRED,
            FerryError::Validation(_) => StatusCode::BAD_REQUEST,
            FerryError::Operator(err) => match err.kind {
                OperatorErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                OperatorErrorKind::SeatUnavailable => StatusCode::CONFLICT,
                OperatorErrorKind::Validation => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            },
            FerryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FerryError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let operator = match &self {
            FerryError::Operator(err) => Some(err.operator),
            FerryError::RouteNotSupported { operator, .. } => Some(*operator),
            _ => None,
        };

        let body = ApiError {
            success: false,
            message: self.to_string(),
            operator,
        };

        (status, Json(body)).into_response()
    }
}
