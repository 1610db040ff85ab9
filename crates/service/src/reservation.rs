//! Reservation state machine.
//!
//! ```text
//! waiting ──approve──▶ approved ──withdraw──▶ cancelled_by_passenger
//!    │ ╲                  ╲
//!    │  refuse──▶ refused   ride cancelled──▶ cancelled_by_driver
//!    └──withdraw / ride cancelled
//! ```
//!
//! Every transition locks the ride row before reading the reservation, so
//! transitions on reservations of the same ride are serialized.

use std::fmt;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::{Caller, Reservation, ReservationStatus, Ride};
use crate::errors::ServiceError;
use crate::metrics;
use crate::notify::{self, Notification, Notifier};
use crate::seat_ledger;
use crate::store::{RideStore, StoreTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Approve,
    Refuse,
    Withdraw,
    /// Cascade from the ride being cancelled.
    DriverCancel,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Approve => "approve",
            Action::Refuse => "refuse",
            Action::Withdraw => "withdraw",
            Action::DriverCancel => "cancel",
        })
    }
}

/// Status after applying `action`, or `InvalidTransition`.
pub fn next_status(current: ReservationStatus, action: Action) -> Result<ReservationStatus, ServiceError> {
    use ReservationStatus::*;
    match (current, action) {
        (Waiting, Action::Approve) => Ok(Approved),
        (Waiting, Action::Refuse) => Ok(Refused),
        (Waiting | Approved, Action::Withdraw) => Ok(CancelledByPassenger),
        (Waiting | Approved, Action::DriverCancel) => Ok(CancelledByDriver),
        (status, action) => Err(ServiceError::invalid_transition(format!("cannot {action} a {status} reservation"))),
    }
}

pub struct ReservationService<S: RideStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
}

impl<S: RideStore> ReservationService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self { Self { store, notifier } }

    /// Ask for a seat on a ride. The reservation starts `waiting`; capacity
    /// is only checked on approval.
    #[instrument(skip(self), fields(user_id = caller.user_id))]
    pub async fn request(&self, caller: &Caller, ride_id: i32) -> Result<Reservation, ServiceError> {
        let mut tx = self.store.begin().await?;
        let ride = tx.lock_ride(ride_id).await?.ok_or_else(|| ServiceError::not_found("ride", ride_id))?;
        if ride.cancelled {
            return Err(ServiceError::invalid_transition(format!("ride {ride_id} is cancelled")));
        }
        if ride.driver_id == caller.user_id {
            return Err(ServiceError::unauthorized("drivers cannot book their own ride"));
        }
        if tx.account(caller.user_id).await?.is_none() {
            return Err(ServiceError::not_found("account", caller.user_id));
        }
        if let Some(existing) = tx.live_reservation(caller.user_id, ride_id).await? {
            return Err(ServiceError::invalid_transition(format!(
                "ride {ride_id} already has a {} reservation from this passenger",
                existing.status
            )));
        }
        let reservation = tx.insert_reservation(caller.user_id, ride_id).await?;
        tx.commit().await?;

        metrics::RESERVATIONS_REQUESTED_TOTAL.inc();
        info!(reservation_id = reservation.id, ride_id, passenger_id = caller.user_id, "seat_requested");
        notify::deliver(
            self.notifier.as_ref(),
            ride.driver_id,
            Notification::SeatRequested { ride_id, reservation_id: reservation.id, passenger_id: caller.user_id },
        )
        .await;
        Ok(reservation)
    }

    /// Driver accepts a waiting request, taking one seat. A full ride
    /// leaves the reservation `waiting` and returns `CapacityExceeded`.
    #[instrument(skip(self), fields(user_id = caller.user_id))]
    pub async fn approve(&self, caller: &Caller, reservation_id: i32) -> Result<Reservation, ServiceError> {
        let mut tx = self.store.begin().await?;
        let (reservation, ride) = lock_for_update(&mut tx, reservation_id).await?;
        ensure_driver(caller, &ride)?;
        let status = next_status(reservation.status, Action::Approve)?;
        seat_ledger::try_increment(&mut tx, ride.id).await?;
        tx.set_reservation_status(reservation_id, status).await?;
        tx.commit().await?;

        metrics::SEATS_APPROVED_TOTAL.inc();
        info!(reservation_id, ride_id = ride.id, passenger_id = reservation.passenger_id, "seat_approved");
        notify::deliver(
            self.notifier.as_ref(),
            reservation.passenger_id,
            Notification::SeatApproved { ride_id: ride.id, reservation_id },
        )
        .await;
        Ok(Reservation { status, ..reservation })
    }

    #[instrument(skip(self), fields(user_id = caller.user_id))]
    pub async fn refuse(&self, caller: &Caller, reservation_id: i32) -> Result<Reservation, ServiceError> {
        let mut tx = self.store.begin().await?;
        let (reservation, ride) = lock_for_update(&mut tx, reservation_id).await?;
        ensure_driver(caller, &ride)?;
        let status = next_status(reservation.status, Action::Refuse)?;
        tx.set_reservation_status(reservation_id, status).await?;
        tx.commit().await?;

        info!(reservation_id, ride_id = ride.id, passenger_id = reservation.passenger_id, "seat_refused");
        notify::deliver(
            self.notifier.as_ref(),
            reservation.passenger_id,
            Notification::SeatRefused { ride_id: ride.id, reservation_id },
        )
        .await;
        Ok(Reservation { status, ..reservation })
    }

    /// Passenger gives up a waiting or approved reservation; an approved
    /// one hands its seat back.
    #[instrument(skip(self), fields(user_id = caller.user_id))]
    pub async fn withdraw(&self, caller: &Caller, reservation_id: i32) -> Result<Reservation, ServiceError> {
        let mut tx = self.store.begin().await?;
        let (reservation, ride) = lock_for_update(&mut tx, reservation_id).await?;
        if reservation.passenger_id != caller.user_id {
            return Err(ServiceError::unauthorized("only the passenger may withdraw a reservation"));
        }
        let status = next_status(reservation.status, Action::Withdraw)?;
        if reservation.status.holds_seat() {
            seat_ledger::decrement(&mut tx, ride.id).await?;
        }
        tx.set_reservation_status(reservation_id, status).await?;
        tx.commit().await?;

        info!(reservation_id, ride_id = ride.id, released_seat = reservation.status.holds_seat(), "reservation_withdrawn");
        notify::deliver(
            self.notifier.as_ref(),
            ride.driver_id,
            Notification::ReservationWithdrawn { ride_id: ride.id, reservation_id, passenger_id: caller.user_id },
        )
        .await;
        Ok(Reservation { status, ..reservation })
    }
}

fn ensure_driver(caller: &Caller, ride: &Ride) -> Result<(), ServiceError> {
    if ride.driver_id != caller.user_id {
        return Err(ServiceError::unauthorized(format!("only the driver of ride {} may moderate it", ride.id)));
    }
    Ok(())
}

/// Lock the reservation's ride, then read the reservation under that lock.
async fn lock_for_update<T: StoreTx>(tx: &mut T, reservation_id: i32) -> Result<(Reservation, Ride), ServiceError> {
    let not_found = || ServiceError::not_found("reservation", reservation_id);
    let ride_id = tx.reservation(reservation_id).await?.ok_or_else(not_found)?.ride_id;
    let ride = tx.lock_ride(ride_id).await?.ok_or_else(|| ServiceError::not_found("ride", ride_id))?;
    let reservation = tx.reservation(reservation_id).await?.ok_or_else(not_found)?;
    Ok((reservation, ride))
}
