use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::rider_id;
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::trip::Trip;
use crate::repository::clamp_page;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips", post(request_trip).get(list_trips))
        .route("/trips/:id", get(get_trip))
        .route("/trips/:id/cancel", post(cancel_trip))
        .route("/trips/:id/complete", post(complete_trip))
}

#[derive(Deserialize)]
pub struct RequestTripRequest {
    pub pickup: GeoPoint,
    #[serde(alias = "dropoff")]
    pub destination: GeoPoint,
}

#[derive(Deserialize)]
pub struct ListTripsQuery {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

async fn request_trip(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RequestTripRequest>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let rider_id = rider_id(&headers)?;
    let trip = state
        .dispatch
        .request_trip(rider_id, payload.pickup, payload.destination)
        .await?;

    Ok((StatusCode::CREATED, Json(trip)))
}

async fn list_trips(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListTripsQuery>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let rider_id = rider_id(&headers)?;
    let (limit, skip) = clamp_page(query.limit, query.skip);
    let trips = state.dispatch.list_trips(rider_id, limit, skip).await?;

    Ok(Json(trips))
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let rider_id = rider_id(&headers)?;
    Ok(Json(state.dispatch.get_trip(id, rider_id).await?))
}

async fn cancel_trip(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let rider_id = rider_id(&headers)?;
    Ok(Json(state.dispatch.cancel_trip(id, rider_id).await?))
}

async fn complete_trip(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let rider_id = rider_id(&headers)?;
    Ok(Json(state.dispatch.complete_trip(id, rider_id).await?))
}
