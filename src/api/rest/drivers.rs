use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::driver::{Driver, DriverStatus, Vehicle};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/location", patch(update_driver_location))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub vehicle: Vehicle,
    pub status: Option<DriverStatus>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DriverStatus,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    payload.location.validate("location")?;

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name,
        status: payload.status.unwrap_or(DriverStatus::Idle),
        location: payload.location,
        vehicle: payload.vehicle,
        updated_at: Utc::now(),
    };

    Ok(Json(state.register_driver(driver).await?))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    let mut drivers = state.registry.list();
    drivers.sort_by_key(|driver| driver.id);
    Json(drivers)
}

async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    let current = state.registry.get(id)?;

    if current.status == DriverStatus::OnTrip || payload.status == DriverStatus::OnTrip {
        return Err(AppError::Validation(
            "on_trip is set and cleared by dispatch only".to_string(),
        ));
    }
    if !state.registry.set_status(id, payload.status) {
        return Err(AppError::Validation(format!(
            "driver {id} cannot move from {:?} to {:?}",
            current.status, payload.status
        )));
    }
    state.registry.persist(state.repository.as_ref(), id).await;

    Ok(Json(state.registry.get(id)?))
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    payload.location.validate("location")?;

    let driver = state.registry.set_location(id, payload.location)?;
    state.registry.persist(state.repository.as_ref(), id).await;

    Ok(Json(driver))
}
