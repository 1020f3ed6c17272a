use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::FerryError;
use crate::models::session::{ContactDetails, PassengerDetail, SelectedFerry};
use crate::models::{SearchParams, UnifiedFerryResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ferry/sessions", post(create_session))
        .route("/ferry/sessions/{session_id}", get(get_session))
        .route(
            "/ferry/sessions/{session_id}/passengers",
            post(attach_passengers),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub ferry: UnifiedFerryResult,
    pub class_id: String,
    #[serde(default)]
    pub seats: Vec<String>,
    pub search_params: SearchParams,
}

// POST /api/ferry/sessions
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, FerryError> {
    req.search_params.validate()?;

    // Блокировка мест у оператора — до записи сессии, чтобы дедлайн
    // оператора попал в seat_reservation. Умеет только Green Ocean,
    // остальные отвечают None и живут своим 15-минутным дедлайном.
    let hold_expiry = if req.seats.is_empty() {
        None
    } else {
        let adapter = state.registry.get(req.ferry.operator).ok_or_else(|| {
            FerryError::Validation(format!("operator {} is not configured", req.ferry.operator))
        })?;
        let selected = SelectedFerry {
            operator: req.ferry.operator,
            ferry_id: req.ferry.id.clone(),
            ferry_name: req.ferry.ferry_name.clone(),
            route_data: req.ferry.operator_data.original_response.clone(),
        };
        adapter
            .hold_seats(&selected, &req.class_id, &req.seats, &req.search_params)
            .await?
    };

    let session = state
        .sessions
        .create(req.search_params, req.ferry, &req.class_id, req.seats, hold_expiry)
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

// GET /api/ferry/sessions/{session_id}
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, FerryError> {
    let session = state.sessions.get_valid(session_id).await?;
    Ok((StatusCode::OK, Json(session)))
}

#[derive(Debug, Deserialize)]
pub struct AttachPassengersRequest {
    pub passengers: Vec<PassengerDetail>,
    pub contact: ContactDetails,
}

// POST /api/ferry/sessions/{session_id}/passengers
async fn attach_passengers(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AttachPassengersRequest>,
) -> Result<impl IntoResponse, FerryError> {
    let session = state
        .sessions
        .attach_passengers(session_id, req.passengers, req.contact)
        .await?;
    Ok((StatusCode::OK, Json(session)))
}
