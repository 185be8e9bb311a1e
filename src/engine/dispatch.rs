use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{DispatchSettings, PricingSettings};
use crate::engine::pricing::quote;
use crate::engine::registry::DriverRegistry;
use crate::engine::simulator::{MotionPlan, MotionSimulator};
use crate::engine::trip_state::TripStateMachine;
use crate::error::AppError;
use crate::events::{trip_topic, user_topic, EventBus};
use crate::geo::GeoPoint;
use crate::models::driver::DriverSummary;
use crate::models::event::{BusEvent, TripUpdate};
use crate::models::trip::{Route, Trip, TripStatus};
use crate::observability::metrics::Metrics;
use crate::repository::Repository;
use crate::routing::RouteOracle;

/// Claims attempted per request: the nearest idle driver plus one retry.
const MAX_CLAIM_ATTEMPTS: usize = 2;

pub struct DispatchService {
    registry: Arc<DriverRegistry>,
    trips: Arc<TripStateMachine>,
    repository: Arc<dyn Repository>,
    router: Arc<dyn RouteOracle>,
    simulator: Arc<MotionSimulator>,
    bus: EventBus,
    dispatch: DispatchSettings,
    pricing: PricingSettings,
    metrics: Metrics,
}

impl DispatchService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<DriverRegistry>,
        trips: Arc<TripStateMachine>,
        repository: Arc<dyn Repository>,
        router: Arc<dyn RouteOracle>,
        simulator: Arc<MotionSimulator>,
        bus: EventBus,
        dispatch: DispatchSettings,
        pricing: PricingSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            registry,
            trips,
            repository,
            router,
            simulator,
            bus,
            dispatch,
            pricing,
            metrics,
        }
    }

    pub async fn request_trip(
        &self,
        rider_id: Uuid,
        pickup: GeoPoint,
        dropoff: GeoPoint,
    ) -> Result<Trip, AppError> {
        pickup.validate("pickup")?;
        dropoff.validate("destination")?;

        let start = Instant::now();
        let candidate = self
            .registry
            .nearest_idle(&pickup, self.dispatch.radius_meters, &[]);

        let route = self.fetch_route(pickup, dropoff).await;
        let price = quote(route.as_ref(), &self.pricing);

        let now = Utc::now();
        let trip = self
            .repository
            .create_trip(Trip {
                id: Uuid::new_v4(),
                rider_id,
                driver_id: None,
                pickup,
                dropoff,
                status: TripStatus::Requested,
                route,
                price,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(trip_id = %trip.id, rider_id = %rider_id, price, "trip requested");

        let result = match candidate {
            Some(driver_id) => self.assign(trip, driver_id).await,
            None => {
                warn!(trip_id = %trip.id, error = %AppError::NoDriverAvailable, "trip left unassigned");
                Ok(trip)
            }
        };

        let outcome = match &result {
            Ok(trip) if trip.driver_id.is_some() => "assigned",
            Ok(_) => "unassigned",
            Err(_) => "error",
        };
        self.metrics
            .trips_requested_total
            .with_label_values(&[outcome])
            .inc();
        self.metrics
            .dispatch_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn fetch_route(&self, pickup: GeoPoint, dropoff: GeoPoint) -> Option<Route> {
        let err = match timeout(self.dispatch.routing_timeout, self.router.route(pickup, dropoff)).await {
            Ok(Ok(route)) => return Some(route),
            Ok(Err(err)) => err,
            Err(_) => AppError::RoutingUnavailable("routing oracle timed out".to_string()),
        };

        self.metrics.routing_failures_total.inc();
        warn!(error = %err, "using fallback fare");
        None
    }

    async fn assign(&self, trip: Trip, first_candidate: Uuid) -> Result<Trip, AppError> {
        let mut tried = Vec::with_capacity(MAX_CLAIM_ATTEMPTS);
        let mut candidate = Some(first_candidate);

        while let Some(driver_id) = candidate {
            tried.push(driver_id);

            match self.claim(driver_id, trip.id) {
                Ok(()) => return self.start_trip(trip, driver_id).await,
                Err(err) => {
                    self.metrics.driver_claim_conflicts_total.inc();
                    warn!(trip_id = %trip.id, driver_id = %driver_id, error = %err, "driver claim lost");
                }
            }

            candidate = if tried.len() < MAX_CLAIM_ATTEMPTS {
                self.registry
                    .nearest_idle(&trip.pickup, self.dispatch.radius_meters, &tried)
            } else {
                None
            };
        }

        warn!(trip_id = %trip.id, "no claimable driver; trip left unassigned");
        Ok(trip)
    }

    fn claim(&self, driver_id: Uuid, trip_id: Uuid) -> Result<(), AppError> {
        if self.registry.claim(driver_id, trip_id) {
            Ok(())
        } else {
            Err(AppError::ConcurrentAssignmentConflict)
        }
    }

    async fn start_trip(&self, trip: Trip, driver_id: Uuid) -> Result<Trip, AppError> {
        let summary = match self.registry.get(driver_id) {
            Ok(driver) => DriverSummary::from(&driver),
            Err(err) => {
                self.release_driver(driver_id, trip.id).await;
                return Err(err);
            }
        };

        let bus = &self.bus;
        let assigned = self
            .trips
            .assign(trip.id, driver_id, |assigned| {
                let event = BusEvent::TripUpdate(TripUpdate {
                    driver: Some(summary),
                    ..TripUpdate::status(assigned.id, TripStatus::Assigned)
                });
                bus.publish(&trip_topic(assigned.id), event.clone());
                bus.publish(&user_topic(assigned.rider_id), event);
            })
            .await;

        let assigned = match assigned {
            Ok(assigned) => assigned,
            Err(AppError::AlreadyFinalized(status)) => {
                self.release_driver(driver_id, trip.id).await;
                info!(trip_id = %trip.id, %status, "trip finalized before assignment");
                return self.trips.current(trip.id).await;
            }
            Err(err) => {
                self.release_driver(driver_id, trip.id).await;
                return Err(err);
            }
        };
        self.persist_driver(driver_id).await;

        info!(trip_id = %assigned.id, driver_id = %driver_id, "trip assigned");

        // A rider finalize that ran since the assignment has released the driver.
        if self.registry.claimed_by(&driver_id) != Some(assigned.id) {
            return self.trips.current(assigned.id).await;
        }

        self.simulator
            .start(MotionPlan {
                trip_id: assigned.id,
                driver_id,
                pickup: assigned.pickup,
                dropoff: assigned.dropoff,
            })
            .await;

        Ok(assigned)
    }

    pub async fn cancel_trip(&self, trip_id: Uuid, rider_id: Uuid) -> Result<Trip, AppError> {
        self.finalize(trip_id, rider_id, TripStatus::Cancelled).await
    }

    pub async fn complete_trip(&self, trip_id: Uuid, rider_id: Uuid) -> Result<Trip, AppError> {
        self.finalize(trip_id, rider_id, TripStatus::Completed).await
    }

    // The simulation is stopped before the write, so it cannot complete a cancelled trip.
    async fn finalize(
        &self,
        trip_id: Uuid,
        rider_id: Uuid,
        target: TripStatus,
    ) -> Result<Trip, AppError> {
        let trip = self.get_trip(trip_id, rider_id).await?;
        if trip.status.is_terminal() {
            return Err(AppError::AlreadyFinalized(trip.status));
        }
        if !trip.status.can_transition_to(target) {
            return Err(AppError::InvalidTransition {
                from: trip.status,
                to: target,
            });
        }

        self.simulator.stop(trip_id).await;

        let updated = self.trips.transition(trip_id, target).await?;

        if let Some(driver_id) = updated.driver_id {
            self.release_driver(driver_id, trip_id).await;
        }

        let event = BusEvent::TripUpdate(TripUpdate {
            eta_seconds: (target == TripStatus::Completed).then_some(0),
            ..TripUpdate::status(trip_id, target)
        });
        self.bus.publish(&trip_topic(trip_id), event.clone());
        self.bus.publish(&user_topic(rider_id), event);

        info!(trip_id = %trip_id, status = %target, "trip finalized by rider");
        Ok(updated)
    }

    pub async fn get_trip(&self, trip_id: Uuid, rider_id: Uuid) -> Result<Trip, AppError> {
        self.repository
            .find_rider_trip(trip_id, rider_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))
    }

    pub async fn list_trips(
        &self,
        rider_id: Uuid,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<Trip>, AppError> {
        self.repository.list_trips(rider_id, limit, skip).await
    }

    async fn release_driver(&self, driver_id: Uuid, trip_id: Uuid) {
        if !self.registry.release(driver_id, trip_id) {
            warn!(driver_id = %driver_id, trip_id = %trip_id, "driver not held by trip");
        }
        self.persist_driver(driver_id).await;
    }

    async fn persist_driver(&self, driver_id: Uuid) {
        self.registry
            .persist(self.repository.as_ref(), driver_id)
            .await;
    }
}
