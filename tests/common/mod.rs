#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use ride_dispatch::config::{
    Config, DispatchSettings, PricingSettings, SimulationSettings,
};
use ride_dispatch::error::AppError;
use ride_dispatch::geo::GeoPoint;
use ride_dispatch::models::driver::{Driver, DriverStatus, Vehicle};
use ride_dispatch::models::trip::Route;
use ride_dispatch::repository::InMemoryRepository;
use ride_dispatch::routing::RouteOracle;
use ride_dispatch::state::AppState;

pub const PICKUP: GeoPoint = GeoPoint {
    lat: 37.7749,
    lng: -122.4194,
};

pub const DROPOFF: GeoPoint = GeoPoint {
    lat: 37.7840,
    lng: -122.4090,
};

pub const TICK: Duration = Duration::from_millis(1_200);

/// Answers every request with the same route after an optional delay.
pub struct FixedRouteOracle {
    pub route: Route,
    pub delay: Duration,
}

impl FixedRouteOracle {
    pub fn meters(distance_meters: f64) -> Self {
        Self {
            route: Route {
                distance_meters,
                duration_seconds: 600.0,
                geometry: Some("encoded".to_string()),
            },
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl RouteOracle for FixedRouteOracle {
    async fn route(&self, _origin: GeoPoint, _destination: GeoPoint) -> Result<Route, AppError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.route.clone())
    }
}

pub struct FailingRouteOracle;

#[async_trait]
impl RouteOracle for FailingRouteOracle {
    async fn route(&self, _origin: GeoPoint, _destination: GeoPoint) -> Result<Route, AppError> {
        Err(AppError::RoutingUnavailable("backend down".to_string()))
    }
}

/// Never answers within any reasonable timeout.
pub struct HangingRouteOracle;

#[async_trait]
impl RouteOracle for HangingRouteOracle {
    async fn route(&self, _origin: GeoPoint, _destination: GeoPoint) -> Result<Route, AppError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Err(AppError::RoutingUnavailable("unreachable".to_string()))
    }
}

pub fn test_config() -> Config {
    Config {
        http_port: 0,
        log_level: "warn".to_string(),
        event_buffer_size: 256,
        seed_drivers: false,
        dispatch: DispatchSettings {
            radius_meters: 10_000.0,
            routing_base_url: String::new(),
            routing_timeout: Duration::from_millis(500),
        },
        pricing: PricingSettings::default(),
        simulation: SimulationSettings {
            tick: TICK,
            ..SimulationSettings::default()
        },
    }
}

pub fn app_state(router: impl RouteOracle + 'static) -> Arc<AppState> {
    Arc::new(AppState::new(
        &test_config(),
        Arc::new(InMemoryRepository::new()),
        Arc::new(router),
    ))
}

pub fn driver(name: &str, location: GeoPoint) -> Driver {
    Driver {
        id: Uuid::new_v4(),
        name: name.to_string(),
        status: DriverStatus::Idle,
        location,
        vehicle: Vehicle {
            make: Some("Toyota".to_string()),
            model: Some("Prius".to_string()),
            plate: Some("DEV-100".to_string()),
        },
        updated_at: Utc::now(),
    }
}

pub async fn add_driver(state: &AppState, name: &str, location: GeoPoint) -> Uuid {
    state
        .register_driver(driver(name, location))
        .await
        .unwrap()
        .id
}
