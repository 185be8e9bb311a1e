use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SimulationSettings;
use crate::engine::registry::DriverRegistry;
use crate::engine::trip_state::TripStateMachine;
use crate::error::AppError;
use crate::events::{trip_topic, user_topic, EventBus};
use crate::geo::{interpolate, GeoPoint};
use crate::models::event::{BusEvent, TripUpdate};
use crate::models::trip::TripStatus;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Copy)]
pub struct MotionPlan {
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
}

struct SimulationHandle {
    generation: u64,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct MotionSimulator {
    registry: Arc<DriverRegistry>,
    trips: Arc<TripStateMachine>,
    bus: EventBus,
    settings: SimulationSettings,
    metrics: Metrics,
    tasks: DashMap<Uuid, SimulationHandle>,
    generation: AtomicU64,
}

impl MotionSimulator {
    pub fn new(
        registry: Arc<DriverRegistry>,
        trips: Arc<TripStateMachine>,
        bus: EventBus,
        settings: SimulationSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            registry,
            trips,
            bus,
            settings,
            metrics,
            tasks: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn active(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_running(&self, trip_id: &Uuid) -> bool {
        self.tasks.contains_key(trip_id)
    }

    pub async fn start(self: &Arc<Self>, plan: MotionPlan) {
        self.stop(plan.trip_id).await;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let (cancel, cancel_rx) = watch::channel(false);

        self.metrics.active_simulations.inc();

        // Spawn under the entry guard: the task's own cleanup cannot run
        // before its handle is recorded.
        let slot = self.tasks.entry(plan.trip_id);
        let handle = SimulationHandle {
            generation,
            cancel,
            task: tokio::spawn(self.clone().run(plan, generation, cancel_rx)),
        };
        let replaced = match slot {
            Entry::Occupied(mut slot) => Some(slot.insert(handle)),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                None
            }
        };

        if let Some(stale) = replaced {
            let _ = stale.cancel.send(true);
        }

        info!(trip_id = %plan.trip_id, driver_id = %plan.driver_id, "simulation started");
    }

    /// Waits for the task to exit. `false` when none was running.
    pub async fn stop(&self, trip_id: Uuid) -> bool {
        let Some((_, handle)) = self.tasks.remove(&trip_id) else {
            return false;
        };

        let _ = handle.cancel.send(true);
        if let Err(err) = handle.task.await {
            warn!(trip_id = %trip_id, error = %err, "simulation task ended abnormally");
        }

        info!(trip_id = %trip_id, "simulation stopped");
        true
    }

    async fn run(self: Arc<Self>, plan: MotionPlan, generation: u64, mut cancel: watch::Receiver<bool>) {
        match self.drive(&plan, &mut cancel).await {
            Ok(true) => self.finish(&plan, &cancel).await,
            Ok(false) => debug!(trip_id = %plan.trip_id, "simulation cancelled"),
            Err(err) => warn!(trip_id = %plan.trip_id, error = %err, "simulation aborted"),
        }

        self.tasks
            .remove_if(&plan.trip_id, |_, handle| handle.generation == generation);
        self.metrics.active_simulations.dec();
    }

    async fn drive(
        &self,
        plan: &MotionPlan,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<bool, AppError> {
        let start = self.registry.get(plan.driver_id)?.location;

        if *cancel.borrow() {
            return Ok(false);
        }
        match self.trips.transition(plan.trip_id, TripStatus::Enroute).await {
            Ok(_) => {}
            Err(AppError::AlreadyFinalized(_)) => return Ok(false),
            Err(err) => return Err(err),
        }

        let phases = [
            (start, plan.pickup, self.settings.pickup_steps),
            (plan.pickup, plan.dropoff, self.settings.dropoff_steps),
        ];
        let total_steps = self.settings.total_steps();
        let topic = trip_topic(plan.trip_id);
        let mut step = 0u32;

        for (from, to, steps) in phases {
            for i in 1..=steps {
                if *cancel.borrow() {
                    return Ok(false);
                }

                step += 1;
                let location = interpolate(&from, &to, i as f64 / steps as f64);
                self.registry.set_location(plan.driver_id, location)?;

                let remaining = u64::from(total_steps - step);
                self.bus.publish(
                    &topic,
                    BusEvent::TripUpdate(TripUpdate {
                        location: Some(location),
                        eta_seconds: Some(remaining * self.settings.eta_seconds_per_step),
                        step: Some(step),
                        ..TripUpdate::status(plan.trip_id, TripStatus::Enroute)
                    }),
                );

                tokio::select! {
                    biased;
                    _ = cancel.changed() => return Ok(false),
                    _ = sleep(self.settings.tick) => {}
                }
            }
        }

        Ok(true)
    }

    async fn finish(&self, plan: &MotionPlan, cancel: &watch::Receiver<bool>) {
        if *cancel.borrow() {
            return;
        }

        let trip = match self.trips.transition(plan.trip_id, TripStatus::Completed).await {
            Ok(trip) => trip,
            Err(AppError::AlreadyFinalized(status)) => {
                debug!(trip_id = %plan.trip_id, %status, "trip finalized externally");
                return;
            }
            Err(err) => {
                warn!(trip_id = %plan.trip_id, error = %err, "failed to complete trip");
                return;
            }
        };

        if !self.registry.release(plan.driver_id, plan.trip_id) {
            warn!(driver_id = %plan.driver_id, trip_id = %plan.trip_id, "driver not held by trip at completion");
        }
        self.registry
            .persist(self.trips.repository().as_ref(), plan.driver_id)
            .await;

        let completed = BusEvent::TripUpdate(TripUpdate {
            eta_seconds: Some(0),
            ..TripUpdate::status(plan.trip_id, TripStatus::Completed)
        });
        self.bus.publish(&trip_topic(plan.trip_id), completed.clone());
        self.bus.publish(&user_topic(trip.rider_id), completed);

        info!(trip_id = %plan.trip_id, driver_id = %plan.driver_id, "trip completed by simulation");
    }
}
