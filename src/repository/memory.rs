use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{Driver, DriverPatch};
use crate::models::trip::{Trip, TripPatch};
use crate::repository::Repository;

#[derive(Default)]
pub struct InMemoryRepository {
    trips: DashMap<Uuid, Trip>,
    drivers: DashMap<Uuid, Driver>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_trip(&self, trip: Trip) -> Result<Trip, AppError> {
        if self.trips.contains_key(&trip.id) {
            return Err(AppError::Internal(format!("trip {} already exists", trip.id)));
        }
        self.trips.insert(trip.id, trip.clone());
        Ok(trip)
    }

    async fn find_trip(&self, id: Uuid) -> Result<Option<Trip>, AppError> {
        Ok(self.trips.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_rider_trip(&self, id: Uuid, rider_id: Uuid) -> Result<Option<Trip>, AppError> {
        Ok(self
            .trips
            .get(&id)
            .filter(|entry| entry.rider_id == rider_id)
            .map(|entry| entry.value().clone()))
    }

    async fn list_trips(
        &self,
        rider_id: Uuid,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<Trip>, AppError> {
        let mut trips: Vec<Trip> = self
            .trips
            .iter()
            .filter(|entry| entry.rider_id == rider_id)
            .map(|entry| entry.value().clone())
            .collect();

        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(trips.into_iter().skip(skip).take(limit).collect())
    }

    async fn update_trip_fields(&self, id: Uuid, patch: TripPatch) -> Result<Trip, AppError> {
        let mut trip = self
            .trips
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("trip {id} not found")))?;

        if let Some(status) = patch.status {
            trip.status = status;
        }
        if let Some(driver_id) = patch.driver_id {
            trip.driver_id = Some(driver_id);
        }
        trip.updated_at = Utc::now();

        Ok(trip.clone())
    }

    async fn count_trips(&self) -> Result<usize, AppError> {
        Ok(self.trips.len())
    }

    async fn create_driver(&self, driver: Driver) -> Result<Driver, AppError> {
        self.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, AppError> {
        Ok(self.drivers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError> {
        Ok(self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_driver_fields(&self, id: Uuid, patch: DriverPatch) -> Result<Driver, AppError> {
        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

        if let Some(status) = patch.status {
            driver.status = status;
        }
        if let Some(location) = patch.location {
            driver.location = location;
        }
        driver.updated_at = Utc::now();

        Ok(driver.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::InMemoryRepository;
    use crate::geo::GeoPoint;
    use crate::models::trip::{Trip, TripPatch, TripStatus};
    use crate::repository::Repository;

    fn trip(rider_id: Uuid, minutes_ago: i64) -> Trip {
        let created_at = Utc::now() - Duration::minutes(minutes_ago);
        Trip {
            id: Uuid::new_v4(),
            rider_id,
            driver_id: None,
            pickup: GeoPoint::new(37.7749, -122.4194),
            dropoff: GeoPoint::new(37.7840, -122.4090),
            status: TripStatus::Requested,
            route: None,
            price: 8.0,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn rider_trip_lookup_enforces_ownership() {
        let repo = InMemoryRepository::new();
        let owner = Uuid::new_v4();
        let created = repo.create_trip(trip(owner, 0)).await.unwrap();

        assert!(repo.find_rider_trip(created.id, owner).await.unwrap().is_some());
        assert!(
            repo.find_rider_trip(created.id, Uuid::new_v4())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginated() {
        let repo = InMemoryRepository::new();
        let rider = Uuid::new_v4();
        let oldest = repo.create_trip(trip(rider, 30)).await.unwrap();
        let middle = repo.create_trip(trip(rider, 20)).await.unwrap();
        let newest = repo.create_trip(trip(rider, 10)).await.unwrap();
        repo.create_trip(trip(Uuid::new_v4(), 0)).await.unwrap();

        let page = repo.list_trips(rider, 2, 0).await.unwrap();
        let ids: Vec<Uuid> = page.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![newest.id, middle.id]);

        let page = repo.list_trips(rider, 2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, oldest.id);
    }

    #[tokio::test]
    async fn update_of_missing_trip_is_not_found() {
        let repo = InMemoryRepository::new();
        let result = repo
            .update_trip_fields(
                Uuid::new_v4(),
                TripPatch {
                    status: Some(TripStatus::Cancelled),
                    driver_id: None,
                },
            )
            .await;
        assert!(result.is_err());
    }
}
