use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::dispatch::DispatchService;
use crate::engine::registry::DriverRegistry;
use crate::engine::simulator::MotionSimulator;
use crate::engine::trip_state::TripStateMachine;
use crate::error::AppError;
use crate::events::EventBus;
use crate::geo::{GeoIndex, GeoPoint};
use crate::models::driver::{Driver, DriverStatus, Vehicle};
use crate::observability::metrics::Metrics;
use crate::repository::Repository;
use crate::routing::RouteOracle;

pub struct AppState {
    pub registry: Arc<DriverRegistry>,
    pub trips: Arc<TripStateMachine>,
    pub repository: Arc<dyn Repository>,
    pub simulator: Arc<MotionSimulator>,
    pub dispatch: DispatchService,
    pub bus: EventBus,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: &Config,
        repository: Arc<dyn Repository>,
        router: Arc<dyn RouteOracle>,
    ) -> Self {
        let metrics = Metrics::new();
        let bus = EventBus::new(config.event_buffer_size);
        let registry = Arc::new(DriverRegistry::new(Arc::new(GeoIndex::new())));
        let trips = Arc::new(TripStateMachine::new(repository.clone(), metrics.clone()));
        let simulator = Arc::new(MotionSimulator::new(
            registry.clone(),
            trips.clone(),
            bus.clone(),
            config.simulation.clone(),
            metrics.clone(),
        ));
        let dispatch = DispatchService::new(
            registry.clone(),
            trips.clone(),
            repository.clone(),
            router,
            simulator.clone(),
            bus.clone(),
            config.dispatch.clone(),
            config.pricing.clone(),
            metrics.clone(),
        );

        Self {
            registry,
            trips,
            repository,
            simulator,
            dispatch,
            bus,
            metrics,
        }
    }

    pub async fn register_driver(&self, driver: Driver) -> Result<Driver, AppError> {
        let driver = self.repository.create_driver(driver).await?;
        self.registry.register(driver.clone());
        Ok(driver)
    }

    pub async fn hydrate(&self) -> Result<usize, AppError> {
        let drivers = self.repository.list_drivers().await?;
        let count = drivers.len();
        for driver in drivers {
            self.registry.register(driver);
        }
        Ok(count)
    }

    /// Four idle demo drivers around central San Francisco.
    pub async fn seed_demo_drivers(&self) -> Result<(), AppError> {
        let centers = [
            (37.7749, -122.4194),
            (37.7840, -122.4090),
            (37.7739, -122.4313),
            (37.7900, -122.4058),
        ];

        for (idx, (lat, lng)) in centers.into_iter().enumerate() {
            self.register_driver(Driver {
                id: Uuid::new_v4(),
                name: format!("Demo Driver {}", idx + 1),
                status: DriverStatus::Idle,
                location: GeoPoint::new(lat, lng),
                vehicle: Vehicle {
                    make: Some("Toyota".to_string()),
                    model: Some("Prius".to_string()),
                    plate: Some(format!("DEV-{}", 100 + idx)),
                },
                updated_at: Utc::now(),
            })
            .await?;
        }

        info!(drivers = centers.len(), "seeded demo drivers");
        Ok(())
    }
}
