pub mod osrm;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DispatchSettings;
use crate::error::AppError;
use crate::geo::{haversine_km, GeoPoint};
use crate::models::trip::Route;

pub use osrm::OsrmRouteOracle;

const STRAIGHT_LINE_SPEED_KMH: f64 = 40.0;

#[async_trait]
pub trait RouteOracle: Send + Sync {
    async fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, AppError>;
}

pub struct StraightLineRouteOracle;

#[async_trait]
impl RouteOracle for StraightLineRouteOracle {
    async fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, AppError> {
        let distance_km = haversine_km(&origin, &destination);
        Ok(Route {
            distance_meters: distance_km * 1_000.0,
            duration_seconds: (distance_km / STRAIGHT_LINE_SPEED_KMH) * 3_600.0,
            geometry: None,
        })
    }
}

pub fn from_settings(settings: &DispatchSettings) -> Result<Arc<dyn RouteOracle>, AppError> {
    if settings.routing_base_url.trim().is_empty() {
        return Ok(Arc::new(StraightLineRouteOracle));
    }

    Ok(Arc::new(OsrmRouteOracle::new(
        &settings.routing_base_url,
        settings.routing_timeout,
    )?))
}
