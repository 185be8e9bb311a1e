use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Offline,
    Idle,
    Enroute,
    OnTrip,
}

impl DriverStatus {
    /// Whether `self` may move to `next`. Same-status writes are not transitions.
    pub fn can_transition_to(self, next: DriverStatus) -> bool {
        use DriverStatus::*;

        matches!(
            (self, next),
            (Offline, Idle)
                | (Idle, Offline)
                | (Idle, Enroute)
                | (Idle, OnTrip)
                | (Enroute, OnTrip)
                | (Enroute, Idle)
                | (OnTrip, Idle)
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub plate: Option<String>,
}

impl Vehicle {
    pub fn describe(&self) -> String {
        format!(
            "{} {}",
            self.make.as_deref().unwrap_or("Car"),
            self.model.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub status: DriverStatus,
    pub location: GeoPoint,
    pub vehicle: Vehicle,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DriverPatch {
    pub status: Option<DriverStatus>,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverSummary {
    pub id: Uuid,
    pub name: String,
    pub vehicle: String,
    pub location: GeoPoint,
}

impl From<&Driver> for DriverSummary {
    fn from(driver: &Driver) -> Self {
        Self {
            id: driver.id,
            name: driver.name.clone(),
            vehicle: driver.vehicle.describe(),
            location: driver.location,
        }
    }
}
