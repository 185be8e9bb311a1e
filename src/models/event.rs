use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::driver::DriverSummary;
use crate::models::trip::TripStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripUpdate {
    pub trip_id: Uuid,
    pub status: TripStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    /// 1-based simulation step, present on motion updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
}

impl TripUpdate {
    pub fn status(trip_id: Uuid, status: TripStatus) -> Self {
        Self {
            trip_id,
            status,
            driver: None,
            location: None,
            eta_seconds: None,
            step: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum BusEvent {
    #[serde(rename = "trip:update")]
    TripUpdate(TripUpdate),
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::{BusEvent, TripUpdate};
    use crate::geo::GeoPoint;
    use crate::models::trip::TripStatus;

    #[test]
    fn trip_update_serializes_with_event_name() {
        let trip_id = Uuid::from_u128(1);
        let event = BusEvent::TripUpdate(TripUpdate {
            location: Some(GeoPoint::new(37.0, -122.0)),
            eta_seconds: Some(120),
            step: Some(3),
            ..TripUpdate::status(trip_id, TripStatus::Enroute)
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "trip:update",
                "data": {
                    "trip_id": trip_id.to_string(),
                    "status": "enroute",
                    "location": { "lat": 37.0, "lng": -122.0 },
                    "eta_seconds": 120,
                    "step": 3
                }
            })
        );
    }
}
