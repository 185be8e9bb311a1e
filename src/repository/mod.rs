pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{Driver, DriverPatch};
use crate::models::trip::{Trip, TripPatch};

pub use memory::InMemoryRepository;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_trip(&self, trip: Trip) -> Result<Trip, AppError>;

    async fn find_trip(&self, id: Uuid) -> Result<Option<Trip>, AppError>;

    /// Returns the trip only when it belongs to `rider_id`.
    async fn find_rider_trip(&self, id: Uuid, rider_id: Uuid) -> Result<Option<Trip>, AppError>;

    async fn list_trips(&self, rider_id: Uuid, limit: usize, skip: usize)
    -> Result<Vec<Trip>, AppError>;

    async fn update_trip_fields(&self, id: Uuid, patch: TripPatch) -> Result<Trip, AppError>;

    async fn count_trips(&self) -> Result<usize, AppError>;

    async fn create_driver(&self, driver: Driver) -> Result<Driver, AppError>;

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, AppError>;

    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError>;

    async fn update_driver_fields(&self, id: Uuid, patch: DriverPatch) -> Result<Driver, AppError>;
}

pub fn clamp_page(limit: Option<usize>, skip: Option<usize>) -> (usize, usize) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (limit, skip.unwrap_or(0))
}
