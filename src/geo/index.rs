use dashmap::DashMap;
use uuid::Uuid;

use crate::geo::{haversine_meters, GeoPoint};

#[derive(Debug, Default)]
pub struct GeoIndex {
    positions: DashMap<Uuid, GeoPoint>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, driver_id: Uuid, point: GeoPoint) {
        self.positions.insert(driver_id, point);
    }

    pub fn position(&self, driver_id: &Uuid) -> Option<GeoPoint> {
        self.positions.get(driver_id).map(|entry| *entry.value())
    }

    /// Equal distances resolve to the smallest driver id.
    pub fn nearest<F>(&self, point: &GeoPoint, max_distance_meters: f64, filter: F) -> Option<Uuid>
    where
        F: Fn(&Uuid) -> bool,
    {
        // Snapshot first so the filter never runs while a shard lock is held.
        let snapshot: Vec<(Uuid, GeoPoint)> = self
            .positions
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();

        snapshot
            .into_iter()
            .filter_map(|(driver_id, position)| {
                let distance = haversine_meters(point, &position);
                (distance <= max_distance_meters).then_some((driver_id, distance))
            })
            .filter(|(driver_id, _)| filter(driver_id))
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
            .map(|(driver_id, _)| driver_id)
    }
}
