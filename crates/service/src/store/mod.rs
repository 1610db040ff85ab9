//! Persistence seam for the engine.
//!
//! `RideStore` serves the read side and opens units of work; every mutation
//! goes through a `StoreTx`, which is discarded unless `commit` is called.
//! Implementations must give `lock_ride`/`lock_rides` row-lock semantics: a
//! second transaction locking the same ride waits until the first finishes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::GeoPoint;
use models::ride::NewRide;
use models::user::NewUser;

use crate::domain::{Account, Reservation, ReservationStatus, Ride, RouteData};
use crate::errors::ServiceError;

pub mod memory;
pub mod seaorm;

pub use memory::MemoryStore;
pub use seaorm::SeaOrmStore;

#[async_trait]
pub trait RideStore: Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, ServiceError>;

    async fn ride(&self, id: i32) -> Result<Option<Ride>, ServiceError>;
    async fn rides_by_ids(&self, ids: &[i32]) -> Result<Vec<Ride>, ServiceError>;
    async fn rides_by_driver(&self, driver_id: i32) -> Result<Vec<Ride>, ServiceError>;
    /// Non-cancelled rides whose departure falls in `[from, to)`.
    async fn rides_departing_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Ride>, ServiceError>;
    /// Route of the most recently created ride whose endpoints both lie
    /// within `tolerance_m` of the given points.
    async fn latest_route_near(&self, departure: GeoPoint, arrival: GeoPoint, tolerance_m: f64) -> Result<Option<RouteData>, ServiceError>;

    async fn reservations_for_ride(&self, ride_id: i32) -> Result<Vec<Reservation>, ServiceError>;
    async fn reservations_by_passenger(&self, passenger_id: i32) -> Result<Vec<Reservation>, ServiceError>;

    async fn account(&self, id: i32) -> Result<Option<Account>, ServiceError>;
    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Read a ride and hold its row lock until the transaction ends.
    async fn lock_ride(&mut self, id: i32) -> Result<Option<Ride>, ServiceError>;
    /// Lock several rides in ascending id order.
    async fn lock_rides(&mut self, ids: &[i32]) -> Result<Vec<Ride>, ServiceError>;
    async fn set_approved_seat_count(&mut self, ride_id: i32, count: i32) -> Result<(), ServiceError>;
    async fn insert_ride(&mut self, ride: &NewRide) -> Result<Ride, ServiceError>;
    async fn ride_ids_by_driver(&mut self, driver_id: i32) -> Result<Vec<i32>, ServiceError>;
    async fn mark_rides_cancelled(&mut self, ride_ids: &[i32]) -> Result<u64, ServiceError>;
    async fn reassign_rides(&mut self, ride_ids: &[i32], driver_id: i32) -> Result<u64, ServiceError>;

    async fn reservation(&mut self, id: i32) -> Result<Option<Reservation>, ServiceError>;
    /// The non-anonymized reservation for a passenger/ride pair, if any.
    async fn live_reservation(&mut self, passenger_id: i32, ride_id: i32) -> Result<Option<Reservation>, ServiceError>;
    /// Insert a `waiting` reservation; a live duplicate pair is an
    /// `IntegrityViolation`.
    async fn insert_reservation(&mut self, passenger_id: i32, ride_id: i32) -> Result<Reservation, ServiceError>;
    async fn set_reservation_status(&mut self, id: i32, status: ReservationStatus) -> Result<(), ServiceError>;
    /// Set `status` on every `waiting`/`approved` reservation of the given
    /// rides, returning the rewritten rows.
    async fn cancel_active_reservations(&mut self, ride_ids: &[i32], status: ReservationStatus) -> Result<Vec<Reservation>, ServiceError>;
    async fn reservations_by_passenger(&mut self, passenger_id: i32) -> Result<Vec<Reservation>, ServiceError>;
    /// Re-own every reservation of `passenger_id` to `sentinel_id`, mark them
    /// anonymized, and move active ones to `cancelled_by_passenger`.
    async fn anonymize_reservations(&mut self, passenger_id: i32, sentinel_id: i32) -> Result<u64, ServiceError>;

    async fn account(&mut self, id: i32) -> Result<Option<Account>, ServiceError>;
    async fn account_by_email(&mut self, email: &str) -> Result<Option<Account>, ServiceError>;
    /// Insert an account; an existing email is an `IntegrityViolation`.
    async fn insert_account(&mut self, user: &NewUser) -> Result<Account, ServiceError>;
    /// Insert unless the email already exists, then return the stored row.
    async fn insert_account_if_absent(&mut self, user: &NewUser) -> Result<Account, ServiceError>;
    async fn delete_account(&mut self, id: i32) -> Result<(), ServiceError>;

    async fn commit(self) -> Result<(), ServiceError>;
    async fn rollback(self) -> Result<(), ServiceError>;
}
