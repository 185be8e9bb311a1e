pub mod drivers;
pub mod trips;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the caller identity issued by the auth layer.
pub const RIDER_ID_HEADER: &str = "x-rider-id";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(drivers::router())
        .merge(trips::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub(crate) fn rider_id(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let raw = headers
        .get(RIDER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{RIDER_ID_HEADER} header is required")))?;

    Uuid::parse_str(raw)
        .map_err(|_| AppError::Validation(format!("{RIDER_ID_HEADER} must be a uuid")))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    drivers: usize,
    trips: usize,
    active_simulations: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        drivers: state.registry.len(),
        trips: state.repository.count_trips().await?,
        active_simulations: state.simulator.active(),
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
