use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{GeoIndex, GeoPoint};
use crate::models::driver::{Driver, DriverPatch, DriverStatus};
use crate::repository::Repository;

pub struct DriverRegistry {
    drivers: DashMap<Uuid, Driver>,
    // driver id -> trip holding the driver; present exactly while `on_trip`
    claims: DashMap<Uuid, Uuid>,
    index: Arc<GeoIndex>,
}

impl DriverRegistry {
    pub fn new(index: Arc<GeoIndex>) -> Self {
        Self {
            drivers: DashMap::new(),
            claims: DashMap::new(),
            index,
        }
    }

    pub fn index(&self) -> &GeoIndex {
        &self.index
    }

    pub fn register(&self, driver: Driver) {
        self.index.upsert(driver.id, driver.location);
        self.drivers.insert(driver.id, driver);
    }

    pub fn get(&self, driver_id: Uuid) -> Result<Driver, AppError> {
        self.drivers
            .get(&driver_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))
    }

    pub fn status(&self, driver_id: &Uuid) -> Option<DriverStatus> {
        self.drivers.get(driver_id).map(|entry| entry.status)
    }

    pub fn list(&self) -> Vec<Driver> {
        self.drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn claimed_by(&self, driver_id: &Uuid) -> Option<Uuid> {
        self.claims.get(driver_id).map(|entry| *entry.value())
    }

    pub fn set_status(&self, driver_id: Uuid, next: DriverStatus) -> bool {
        let Some(mut driver) = self.drivers.get_mut(&driver_id) else {
            return false;
        };

        if driver.status == DriverStatus::OnTrip
            || next == DriverStatus::OnTrip
            || !driver.status.can_transition_to(next)
        {
            return false;
        }

        driver.status = next;
        driver.updated_at = Utc::now();
        true
    }

    // Check and write happen under the entry lock.
    pub fn claim(&self, driver_id: Uuid, trip_id: Uuid) -> bool {
        let Some(mut driver) = self.drivers.get_mut(&driver_id) else {
            return false;
        };

        if !driver.status.can_transition_to(DriverStatus::OnTrip) {
            return false;
        }

        driver.status = DriverStatus::OnTrip;
        driver.updated_at = Utc::now();
        self.claims.insert(driver_id, trip_id);
        true
    }

    /// No-op unless `trip_id` still holds the driver.
    pub fn release(&self, driver_id: Uuid, trip_id: Uuid) -> bool {
        let Some(mut driver) = self.drivers.get_mut(&driver_id) else {
            return false;
        };

        if driver.status != DriverStatus::OnTrip
            || self.claims.remove_if(&driver_id, |_, holder| *holder == trip_id).is_none()
        {
            return false;
        }

        driver.status = DriverStatus::Idle;
        driver.updated_at = Utc::now();
        true
    }

    pub fn set_location(&self, driver_id: Uuid, point: GeoPoint) -> Result<Driver, AppError> {
        let mut driver = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        driver.location = point;
        driver.updated_at = Utc::now();
        // Still under the entry lock: index and registry move together.
        self.index.upsert(driver_id, point);

        Ok(driver.clone())
    }

    pub async fn persist(&self, repository: &dyn Repository, driver_id: Uuid) {
        let Ok(driver) = self.get(driver_id) else {
            return;
        };

        let patch = DriverPatch {
            status: Some(driver.status),
            location: Some(driver.location),
        };
        if let Err(err) = repository.update_driver_fields(driver_id, patch).await {
            warn!(driver_id = %driver_id, error = %err, "failed to persist driver");
        }
    }

    pub fn nearest_idle(
        &self,
        point: &GeoPoint,
        max_distance_meters: f64,
        exclude: &[Uuid],
    ) -> Option<Uuid> {
        self.index.nearest(point, max_distance_meters, |driver_id| {
            !exclude.contains(driver_id) && self.status(driver_id) == Some(DriverStatus::Idle)
        })
    }
}
