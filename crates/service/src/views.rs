//! Read models for "my rides", "my reservations", ride detail and roster.
//!
//! Unlike search these show full and cancelled rides.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Caller, Reservation, ReservationStatus, Ride};
use crate::errors::ServiceError;
use crate::pricing::{PricingCalculator, Quote};
use crate::search::statuses_for;
use crate::store::RideStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideDetail {
    pub ride: Ride,
    pub quote: Quote,
    pub seats_left: i32,
    pub my_status: Option<ReservationStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassengerReservation {
    pub reservation: Reservation,
    pub ride: Ride,
}

pub struct ViewService<S: RideStore> {
    store: Arc<S>,
    pricing: PricingCalculator,
}

impl<S: RideStore> ViewService<S> {
    pub fn new(store: Arc<S>, pricing: PricingCalculator) -> Self { Self { store, pricing } }

    pub async fn ride_detail(&self, caller: Option<&Caller>, ride_id: i32) -> Result<RideDetail, ServiceError> {
        let ride = self.store.ride(ride_id).await?.ok_or_else(|| ServiceError::not_found("ride", ride_id))?;
        let quote = self.pricing.quote_ride(&ride)?;
        let my_status = statuses_for(self.store.as_ref(), caller).await?.get(&ride_id).copied();
        Ok(RideDetail { seats_left: ride.seats_left(), ride, quote, my_status })
    }

    /// Rides the caller drives, soonest first.
    pub async fn driver_rides(&self, caller: &Caller) -> Result<Vec<Ride>, ServiceError> {
        let mut rides = self.store.rides_by_driver(caller.user_id).await?;
        rides.sort_by(|a, b| a.departure_at.cmp(&b.departure_at).then(a.id.cmp(&b.id)));
        Ok(rides)
    }

    /// Reservations the caller holds with their rides, soonest first.
    pub async fn passenger_reservations(&self, caller: &Caller) -> Result<Vec<PassengerReservation>, ServiceError> {
        let reservations = self.store.reservations_by_passenger(caller.user_id).await?;
        let ride_ids: Vec<i32> = reservations.iter().map(|r| r.ride_id).collect();
        let rides = self.store.rides_by_ids(&ride_ids).await?;
        let mut out: Vec<PassengerReservation> = reservations
            .into_iter()
            .filter_map(|reservation| {
                let ride = rides.iter().find(|r| r.id == reservation.ride_id)?.clone();
                Some(PassengerReservation { reservation, ride })
            })
            .collect();
        out.sort_by(|a, b| a.ride.departure_at.cmp(&b.ride.departure_at).then(a.reservation.id.cmp(&b.reservation.id)));
        Ok(out)
    }

    /// Every reservation on a ride. Driver only.
    pub async fn roster(&self, caller: &Caller, ride_id: i32) -> Result<Vec<Reservation>, ServiceError> {
        let ride = self.store.ride(ride_id).await?.ok_or_else(|| ServiceError::not_found("ride", ride_id))?;
        if ride.driver_id != caller.user_id && !caller.is_admin() {
            return Err(ServiceError::unauthorized(format!("only the driver of ride {ride_id} may see its roster")));
        }
        self.store.reservations_for_ride(ride_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RideDraft;
    use crate::store::{MemoryStore, StoreTx};
    use crate::test_support::{draft, seed_account, seed_ride};
    use configs::PricingConfig;

    #[tokio::test]
    async fn full_and_cancelled_rides_stay_visible_to_their_people() {
        let store = Arc::new(MemoryStore::new());
        let driver = Caller::user(seed_account(&store, "driver@example.com").await.id);
        let passenger = Caller::user(seed_account(&store, "p@example.com").await.id);
        let full = seed_ride(&store, driver.user_id, &RideDraft { max_seats: 1, ..draft() }).await;
        let cancelled = seed_ride(&store, driver.user_id, &draft()).await;

        let mut tx = store.begin().await.unwrap();
        let r1 = tx.insert_reservation(passenger.user_id, full.id).await.unwrap();
        tx.set_reservation_status(r1.id, ReservationStatus::Approved).await.unwrap();
        tx.set_approved_seat_count(full.id, 1).await.unwrap();
        tx.insert_reservation(passenger.user_id, cancelled.id).await.unwrap();
        tx.mark_rides_cancelled(&[cancelled.id]).await.unwrap();
        tx.commit().await.unwrap();

        let views = ViewService::new(store.clone(), PricingCalculator::new(PricingConfig::default()));
        assert_eq!(views.driver_rides(&driver).await.unwrap().len(), 2);
        let mine = views.passenger_reservations(&passenger).await.unwrap();
        assert_eq!(mine.len(), 2);

        let detail = views.ride_detail(Some(&passenger), full.id).await.unwrap();
        assert_eq!(detail.seats_left, 0);
        assert_eq!(detail.my_status, Some(ReservationStatus::Approved));
        assert!(views.ride_detail(None, cancelled.id).await.unwrap().ride.cancelled);
    }

    #[tokio::test]
    async fn roster_is_for_the_driver() {
        let store = Arc::new(MemoryStore::new());
        let driver = Caller::user(seed_account(&store, "driver@example.com").await.id);
        let other = Caller::user(seed_account(&store, "o@example.com").await.id);
        let ride = seed_ride(&store, driver.user_id, &draft()).await;
        let views = ViewService::new(store.clone(), PricingCalculator::new(PricingConfig::default()));
        assert!(views.roster(&driver, ride.id).await.unwrap().is_empty());
        assert!(matches!(views.roster(&other, ride.id).await, Err(ServiceError::Unauthorized(_))));
        assert!(matches!(views.ride_detail(None, 404).await, Err(ServiceError::NotFound(_))));
    }
}
