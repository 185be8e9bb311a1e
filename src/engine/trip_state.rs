use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::trip::{Trip, TripPatch, TripStatus};
use crate::observability::metrics::Metrics;
use crate::repository::Repository;

pub struct TripStateMachine {
    repository: Arc<dyn Repository>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    metrics: Metrics,
}

impl TripStateMachine {
    pub fn new(repository: Arc<dyn Repository>, metrics: Metrics) -> Self {
        Self {
            repository,
            locks: DashMap::new(),
            metrics,
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    pub async fn current(&self, trip_id: Uuid) -> Result<Trip, AppError> {
        self.repository
            .find_trip(trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))
    }

    /// `announce` runs while the trip lock is still held.
    pub async fn assign<F>(
        &self,
        trip_id: Uuid,
        driver_id: Uuid,
        announce: F,
    ) -> Result<Trip, AppError>
    where
        F: FnOnce(&Trip) + Send,
    {
        self.apply(trip_id, TripStatus::Assigned, Some(driver_id), announce)
            .await
    }

    pub async fn transition(&self, trip_id: Uuid, next: TripStatus) -> Result<Trip, AppError> {
        self.apply(trip_id, next, None, |_| {}).await
    }

    async fn apply<F>(
        &self,
        trip_id: Uuid,
        next: TripStatus,
        driver_id: Option<Uuid>,
        announce: F,
    ) -> Result<Trip, AppError>
    where
        F: FnOnce(&Trip) + Send,
    {
        let lock = self
            .locks
            .entry(trip_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let trip = self.current(trip_id).await?;
        check_edge(trip.status, next, driver_id.is_some())?;

        let updated = self
            .repository
            .update_trip_fields(
                trip_id,
                TripPatch {
                    status: Some(next),
                    driver_id,
                },
            )
            .await?;

        announce(&updated);

        if next.is_terminal() {
            self.locks.remove(&trip_id);
        }

        self.metrics
            .trip_transitions_total
            .with_label_values(&[next.as_str()])
            .inc();
        debug!(trip_id = %trip_id, from = %trip.status, to = %next, "trip transitioned");

        Ok(updated)
    }
}

// Only the `assigned` edge carries a driver.
fn check_edge(from: TripStatus, to: TripStatus, with_driver: bool) -> Result<(), AppError> {
    if from.is_terminal() {
        return Err(AppError::AlreadyFinalized(from));
    }

    let driver_ok = (to == TripStatus::Assigned) == with_driver;
    if !from.can_transition_to(to) || !driver_ok {
        return Err(AppError::InvalidTransition { from, to });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use super::TripStateMachine;
    use crate::error::AppError;
    use crate::geo::GeoPoint;
    use crate::models::trip::{Trip, TripStatus};
    use crate::observability::metrics::Metrics;
    use crate::repository::{InMemoryRepository, Repository};

    async fn machine_with_trip() -> (TripStateMachine, Uuid) {
        let repo = Arc::new(InMemoryRepository::new());
        let now = Utc::now();
        let trip = Trip {
            id: Uuid::new_v4(),
            rider_id: Uuid::new_v4(),
            driver_id: None,
            pickup: GeoPoint::new(37.7749, -122.4194),
            dropoff: GeoPoint::new(37.7840, -122.4090),
            status: TripStatus::Requested,
            route: None,
            price: 8.0,
            created_at: now,
            updated_at: now,
        };
        let id = trip.id;
        repo.create_trip(trip).await.unwrap();
        (TripStateMachine::new(repo, Metrics::new()), id)
    }

    #[tokio::test]
    async fn happy_path_reaches_completed() {
        let (machine, id) = machine_with_trip().await;
        let driver = Uuid::new_v4();

        let trip = machine.assign(id, driver, |_| {}).await.unwrap();
        assert_eq!(trip.status, TripStatus::Assigned);
        assert_eq!(trip.driver_id, Some(driver));

        machine.transition(id, TripStatus::Enroute).await.unwrap();
        let trip = machine.transition(id, TripStatus::Completed).await.unwrap();
        assert_eq!(trip.status, TripStatus::Completed);
    }

    #[tokio::test]
    async fn announce_runs_only_when_assignment_lands() {
        let (machine, id) = machine_with_trip().await;
        machine.transition(id, TripStatus::Cancelled).await.unwrap();

        let mut announced = false;
        let err = machine
            .assign(id, Uuid::new_v4(), |_| announced = true)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AlreadyFinalized(TripStatus::Cancelled)));
        assert!(!announced);
    }

    #[tokio::test]
    async fn cancelling_twice_reports_already_finalized() {
        let (machine, id) = machine_with_trip().await;

        machine.transition(id, TripStatus::Cancelled).await.unwrap();
        let err = machine
            .transition(id, TripStatus::Cancelled)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AlreadyFinalized(TripStatus::Cancelled)));
    }

    #[tokio::test]
    async fn terminal_trip_rejects_every_transition() {
        let (machine, id) = machine_with_trip().await;
        machine.transition(id, TripStatus::Cancelled).await.unwrap();

        for next in [
            TripStatus::Requested,
            TripStatus::Enroute,
            TripStatus::Completed,
            TripStatus::Cancelled,
        ] {
            let err = machine.transition(id, next).await.unwrap_err();
            assert!(matches!(err, AppError::AlreadyFinalized(_)), "{next}");
        }
        let err = machine.assign(id, Uuid::new_v4(), |_| {}).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyFinalized(_)));
        assert_eq!(machine.current(id).await.unwrap().status, TripStatus::Cancelled);
    }

    #[tokio::test]
    async fn unlisted_edge_is_invalid() {
        let (machine, id) = machine_with_trip().await;

        let err = machine
            .transition(id, TripStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: TripStatus::Requested,
                to: TripStatus::Completed
            }
        ));
    }

    #[tokio::test]
    async fn assignment_requires_a_driver() {
        let (machine, id) = machine_with_trip().await;

        let err = machine
            .transition(id, TripStatus::Assigned)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn racing_terminal_requests_have_one_winner() {
        let (machine, id) = machine_with_trip().await;
        let machine = Arc::new(machine);
        machine.assign(id, Uuid::new_v4(), |_| {}).await.unwrap();
        machine.transition(id, TripStatus::Enroute).await.unwrap();

        let cancel = tokio::spawn({
            let machine = machine.clone();
            async move { machine.transition(id, TripStatus::Cancelled).await }
        });
        let complete = tokio::spawn({
            let machine = machine.clone();
            async move { machine.transition(id, TripStatus::Completed).await }
        });

        let results = [cancel.await.unwrap(), complete.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(AppError::AlreadyFinalized(_))))
        );
    }

    #[tokio::test]
    async fn missing_trip_is_not_found() {
        let (machine, _) = machine_with_trip().await;
        let err = machine
            .transition(Uuid::new_v4(), TripStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
