//! Ride publication and cancellation.

use std::sync::Arc;

use chrono::Utc;
use models::ride::validate_new_ride;
use models::validation::into_result;
use tracing::{info, instrument};

use crate::domain::{Caller, Reservation, ReservationStatus, Ride, RideDraft};
use crate::errors::ServiceError;
use crate::metrics;
use crate::notify::{self, Notification, Notifier};
use crate::route_cache::RouteLookup;
use crate::store::{RideStore, StoreTx};

/// Cancel the given rides and every active reservation on them, inside the
/// caller's transaction. Already-cancelled rides and terminal reservations
/// are left as they are. Returns the reservations that were cancelled and
/// the number of rides that changed state.
pub(crate) async fn cascade_cancel<T: StoreTx>(tx: &mut T, ride_ids: &[i32]) -> Result<(Vec<Reservation>, u64), ServiceError> {
    let cancelled = tx.cancel_active_reservations(ride_ids, ReservationStatus::CancelledByDriver).await?;
    let rides = tx.mark_rides_cancelled(ride_ids).await?;
    Ok((cancelled, rides))
}

pub struct RideService<S: RideStore> {
    store: Arc<S>,
    routes: RouteLookup<S>,
    notifier: Arc<dyn Notifier>,
}

impl<S: RideStore> RideService<S> {
    pub fn new(store: Arc<S>, routes: RouteLookup<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, routes, notifier }
    }

    /// Publish a ride owned by the caller, attaching route data when it can
    /// be reused or fetched.
    #[instrument(skip(self, draft), fields(user_id = caller.user_id))]
    pub async fn publish(&self, caller: &Caller, draft: RideDraft) -> Result<Ride, ServiceError> {
        let mut new_ride = draft.into_new_ride(caller.user_id, None);
        into_result(validate_new_ride(&new_ride, Utc::now()))?;

        let resolved = self.routes.resolve(new_ride.departure, new_ride.arrival).await?;
        new_ride.route = resolved.route;

        let mut tx = self.store.begin().await?;
        if tx.account(caller.user_id).await?.is_none() {
            return Err(ServiceError::not_found("account", caller.user_id));
        }
        let ride = tx.insert_ride(&new_ride).await?;
        tx.commit().await?;

        info!(ride_id = ride.id, driver_id = ride.driver_id, source = ?resolved.source, distance_km = resolved.distance_km, "ride_published");
        Ok(ride)
    }

    /// Cancel a ride and its active reservations. Cancelling a cancelled
    /// ride succeeds without changing anything.
    #[instrument(skip(self), fields(user_id = caller.user_id))]
    pub async fn cancel(&self, caller: &Caller, ride_id: i32) -> Result<Ride, ServiceError> {
        let mut tx = self.store.begin().await?;
        let ride = tx.lock_ride(ride_id).await?.ok_or_else(|| ServiceError::not_found("ride", ride_id))?;
        if ride.driver_id != caller.user_id {
            return Err(ServiceError::unauthorized(format!("only the driver of ride {ride_id} may cancel it")));
        }
        if ride.cancelled {
            return Ok(ride);
        }
        let (affected, _) = cascade_cancel(&mut tx, &[ride_id]).await?;
        tx.commit().await?;

        metrics::RIDES_CANCELLED_TOTAL.inc();
        info!(ride_id, reservations = affected.len(), "ride_cancelled");
        for r in &affected {
            notify::deliver(self.notifier.as_ref(), r.passenger_id, Notification::RideCancelled { ride_id }).await;
        }
        Ok(Ride { cancelled: true, ..ride })
    }
}
