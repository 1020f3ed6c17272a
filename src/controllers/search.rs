use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::FerryError;
use crate::models::SearchParams;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ferry/search", post(search_ferries))
}

fn cache_key(params: &SearchParams) -> String {
    format!(
        "ferry:search:{}:{}:{}:a{}c{}i{}",
        params.from, params.to, params.date, params.adults, params.children, params.infants
    )
}

/// POST /api/ferry/search
///
/// 200 — все опрошенные операторы ответили; 207 — часть ответила,
/// часть упала (результаты частичные, подробности в meta);
/// 503 — не ответил никто либо маршрут не обслуживается.
pub async fn search_ferries(
    State(state): State<Arc<AppState>>,
    Json(params): Json<SearchParams>,
) -> Response {
    if let Err(e) = params.validate() {
        return FerryError::from(e).into_response();
    }

    let cache_key = cache_key(&params);

    // Кеш отдаёт только полные ответы, частичные туда не попадают.
    if let Ok(Some(cached_json)) = state.search_cache.get(&cache_key).await {
        return Response::builder()
            .header("Content-Type", "application/json")
            .header("X-Cache", "HIT")
            .body(Body::from(cached_json))
            .unwrap();
    }

    let aggregated = match state.aggregator.search_all(&params).await {
        Ok(aggregated) => aggregated,
        Err(e) => return e.into_response(),
    };

    let route_unserved = aggregated.attempted.is_empty();
    let status = if route_unserved || aggregated.all_failed() {
        StatusCode::SERVICE_UNAVAILABLE
    } else if aggregated.errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };

    let failed: Vec<_> = aggregated.errors.iter().map(|e| e.operator).collect();
    let body = json!({
        "success": status != StatusCode::SERVICE_UNAVAILABLE,
        "results": aggregated.results,
        "meta": {
            "operatorErrors": aggregated.errors,
            "availableOperators": aggregated.succeeded(),
            "failedOperators": failed,
        }
    });

    if status == StatusCode::OK {
        if let Ok(json_str) = serde_json::to_string(&body) {
            let ttl = state.config.ferry.search_cache_ttl_seconds;
            if let Err(e) = state.search_cache.put(&cache_key, &json_str, ttl).await {
                tracing::warn!(error = %e, "failed to cache search result");
            }

            return Response::builder()
                .header("Content-Type", "application/json")
                .header("X-Cache", "MISS")
                .body(Body::from(json_str))
                .unwrap();
        }
    }

    (status, Json(body)).into_response()
}
