//! Approved-seat counter of a ride.
//!
//! Both operations take the ride's row lock first, so concurrent callers on
//! the same ride are serialized and `0 <= approved_seat_count <= max_seats`
//! holds after every commit. They run inside the caller's transaction.

use tracing::{debug, warn};

use crate::domain::Ride;
use crate::errors::ServiceError;
use crate::metrics;
use crate::store::StoreTx;

/// Take one seat. Fails with `CapacityExceeded` when the ride is full and
/// with `InvalidTransition` when it is cancelled.
pub async fn try_increment<T: StoreTx>(tx: &mut T, ride_id: i32) -> Result<Ride, ServiceError> {
    let mut ride = tx.lock_ride(ride_id).await?.ok_or_else(|| ServiceError::not_found("ride", ride_id))?;
    if ride.cancelled {
        return Err(ServiceError::invalid_transition(format!("ride {ride_id} is cancelled")));
    }
    if ride.approved_seat_count >= ride.max_seats {
        metrics::CAPACITY_REJECTED_TOTAL.inc();
        return Err(ServiceError::CapacityExceeded { ride_id });
    }
    ride.approved_seat_count += 1;
    tx.set_approved_seat_count(ride_id, ride.approved_seat_count).await?;
    debug!(ride_id, approved = ride.approved_seat_count, max = ride.max_seats, "seat taken");
    Ok(ride)
}

/// Give one seat back, never going below zero. A cancelled ride keeps the
/// count it had when it was cancelled.
pub async fn decrement<T: StoreTx>(tx: &mut T, ride_id: i32) -> Result<Ride, ServiceError> {
    let mut ride = tx.lock_ride(ride_id).await?.ok_or_else(|| ServiceError::not_found("ride", ride_id))?;
    if ride.cancelled {
        return Ok(ride);
    }
    if ride.approved_seat_count <= 0 {
        warn!(ride_id, approved = ride.approved_seat_count, "seat release on empty ride ignored");
        return Ok(ride);
    }
    ride.approved_seat_count -= 1;
    tx.set_approved_seat_count(ride_id, ride.approved_seat_count).await?;
    debug!(ride_id, approved = ride.approved_seat_count, "seat released");
    Ok(ride)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::store::{MemoryStore, RideStore};
    use crate::test_support::{draft, seed_account, seed_ride};

    async fn ride_with_seats(max_seats: i32) -> (Arc<MemoryStore>, Ride) {
        let store = Arc::new(MemoryStore::new());
        let driver = seed_account(&store, "driver@example.com").await;
        let ride = seed_ride(&store, driver.id, &crate::domain::RideDraft { max_seats, ..draft() }).await;
        (store, ride)
    }

    #[tokio::test]
    async fn increments_until_full() {
        let (store, ride) = ride_with_seats(2).await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(try_increment(&mut tx, ride.id).await.unwrap().approved_seat_count, 1);
        assert_eq!(try_increment(&mut tx, ride.id).await.unwrap().approved_seat_count, 2);
        let err = try_increment(&mut tx, ride.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::CapacityExceeded { ride_id } if ride_id == ride.id));
        tx.commit().await.unwrap();
        assert_eq!(store.ride(ride.id).await.unwrap().unwrap().approved_seat_count, 2);
    }

    #[tokio::test]
    async fn decrement_floors_at_zero() {
        let (store, ride) = ride_with_seats(3).await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(decrement(&mut tx, ride.id).await.unwrap().approved_seat_count, 0);
        try_increment(&mut tx, ride.id).await.unwrap();
        assert_eq!(decrement(&mut tx, ride.id).await.unwrap().approved_seat_count, 0);
        assert_eq!(decrement(&mut tx, ride.id).await.unwrap().approved_seat_count, 0);
    }

    #[tokio::test]
    async fn cancelled_ride_is_frozen() {
        let (store, ride) = ride_with_seats(3).await;
        let mut tx = store.begin().await.unwrap();
        try_increment(&mut tx, ride.id).await.unwrap();
        tx.mark_rides_cancelled(&[ride.id]).await.unwrap();
        assert!(matches!(try_increment(&mut tx, ride.id).await, Err(ServiceError::InvalidTransition(_))));
        assert_eq!(decrement(&mut tx, ride.id).await.unwrap().approved_seat_count, 1);
    }

    #[tokio::test]
    async fn overfilled_row_is_rejected_and_left_alone() {
        let (store, ride) = ride_with_seats(2).await;
        store.force_ride(Ride { approved_seat_count: 3, ..ride.clone() }).await;
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(try_increment(&mut tx, ride.id).await, Err(ServiceError::CapacityExceeded { .. })));
        drop(tx);
        assert_eq!(store.ride(ride.id).await.unwrap().unwrap().approved_seat_count, 3);
    }

    #[tokio::test]
    async fn unknown_ride_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(try_increment(&mut tx, 99).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn dropped_transaction_keeps_count() {
        let (store, ride) = ride_with_seats(1).await;
        {
            let mut tx = store.begin().await.unwrap();
            try_increment(&mut tx, ride.id).await.unwrap();
        }
        assert_eq!(store.ride(ride.id).await.unwrap().unwrap().approved_seat_count, 0);
    }
}
