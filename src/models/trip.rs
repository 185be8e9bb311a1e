use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Requested,
    Assigned,
    Enroute,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: TripStatus) -> bool {
        use TripStatus::*;

        matches!(
            (self, next),
            (Requested, Assigned)
                | (Requested, Cancelled)
                | (Assigned, Enroute)
                | (Assigned, Cancelled)
                | (Enroute, Completed)
                | (Enroute, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TripStatus::Requested => "requested",
            TripStatus::Assigned => "assigned",
            TripStatus::Enroute => "enroute",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    /// Encoded polyline (precision 6) when the routing backend provides one.
    pub geometry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub status: TripStatus,
    pub route: Option<Route>,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TripPatch {
    pub status: Option<TripStatus>,
    pub driver_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::TripStatus::{self, *};

    const ALL: [TripStatus; 5] = [Requested, Assigned, Enroute, Completed, Cancelled];

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in [Completed, Cancelled] {
            assert!(from.is_terminal());
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn transitions_never_move_backward() {
        assert!(!Assigned.can_transition_to(Requested));
        assert!(!Enroute.can_transition_to(Assigned));
        assert!(!Enroute.can_transition_to(Requested));
    }

    #[test]
    fn completion_requires_enroute() {
        assert!(Enroute.can_transition_to(Completed));
        assert!(!Requested.can_transition_to(Completed));
        assert!(!Assigned.can_transition_to(Completed));
    }

    #[test]
    fn cancel_is_allowed_from_every_live_state() {
        for from in [Requested, Assigned, Enroute] {
            assert!(from.can_transition_to(Cancelled));
        }
    }
}
