use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::FerryError;
use crate::middleware;
use crate::models::PaymentStatus;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ferry/sessions/{session_id}/checkout", post(checkout))
        .route("/ferry/bookings/{session_id}", get(booking_status))
        .route("/webhook/payment", post(payment_webhook))
}

/// POST /api/ferry/sessions/{session_id}/checkout
///
/// Создаёт pending-платёж по заполненной сессии и отдаёт клиенту
/// paymentRef и сумму в пайсах для платёжного шлюза.
async fn checkout(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, FerryError> {
    let session = state.sessions.get_valid(session_id).await?;
    let payment = state.reconciler.create_payment(&session).await?;
    Ok((StatusCode::OK, Json(payment)))
}

/// POST /api/webhook/payment
///
/// Подпись X-Verify сверяется до какой-либо работы с состоянием;
/// тело с плохой подписью получает 401 и не декодируется. Незнакомый
/// paymentRef и повторные доставки подтверждаются как no-op.
async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(envelope): Json<middleware::WebhookEnvelope>,
) -> Result<impl IntoResponse, FerryError> {
    let signature = headers
        .get("X-Verify")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !middleware::verify_signature(
        &envelope.response,
        &state.config.payment.webhook_secret,
        signature,
    ) {
        tracing::warn!("webhook signature mismatch, rejecting");
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "message": "invalid signature"})),
        ));
    }

    let payload = middleware::decode_payload(&envelope.response)?;
    tracing::info!(
        payment_ref = %payload.payment_ref,
        status = %payload.status,
        "payment webhook received"
    );

    state
        .reconciler
        .handle_gateway_event(&payload.payment_ref, &payload.status)
        .await?;

    Ok((StatusCode::OK, Json(json!({"received": true}))))
}

/// GET /api/ferry/bookings/{session_id}
async fn booking_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<axum::response::Response, FerryError> {
    if let Some(booking) = state.executor.booking_for_session(session_id).await? {
        return Ok((StatusCode::OK, Json(booking)).into_response());
    }

    // брони нет; платёж в pending означает "оплата ещё идёт"
    if let Some(payment) = state.executor.payment_for_session(session_id).await? {
        if payment.status == PaymentStatus::Pending {
            return Err(FerryError::PaymentNotConfirmed(session_id));
        }
    }

    Ok((
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "message": "no booking recorded for this session"})),
    )
        .into_response())
}
