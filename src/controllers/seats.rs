use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::FerryError;
use crate::models::seat::{SeatLayout, SeatLayoutRequest};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ferry/seat-layout", post(seat_layout))
}

/// POST /api/ferry/seat-layout
///
/// Для операторов с автопосадкой отвечает пустой схемой и флагом
/// `supportsManualSelection: false`, без похода к оператору.
pub async fn seat_layout(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SeatLayoutRequest>,
) -> Result<impl IntoResponse, FerryError> {
    request.validate()?;

    let layout = state.aggregator.seat_layout(&request).await?;
    let (supports_manual, seats) = match layout {
        SeatLayout::Manual { seats } => (true, seats),
        SeatLayout::AutoAssignOnly => (false, Vec::new()),
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "operator": request.operator,
            "supportsManualSelection": supports_manual,
            "seats": seats,
        })),
    ))
}
