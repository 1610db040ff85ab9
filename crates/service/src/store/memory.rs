//! In-memory store for tests, benches and doc examples.
//!
//! A transaction holds the single state lock for its whole lifetime and
//! works on a copy, so transactions are serialized and a dropped or failed
//! transaction leaves nothing behind. Uniqueness, seat bounds and
//! foreign-key restrictions are checked the way the database does.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::GeoPoint;
use common::utils::geo::within_radius_m;
use models::ride::NewRide;
use models::user::{normalize_email, NewUser};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{RideStore, StoreTx};
use crate::domain::{Account, Reservation, ReservationStatus, Ride, RouteData};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Default)]
struct State {
    accounts: BTreeMap<i32, Account>,
    password_hashes: BTreeMap<i32, String>,
    rides: BTreeMap<i32, Ride>,
    reservations: BTreeMap<i32, Reservation>,
    next_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    fail_points: Arc<std::sync::Mutex<HashSet<&'static str>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Make the next transactional call of the named operation fail with a
    /// database error (e.g. `"cancel_active_reservations"`).
    pub fn fail_on(&self, op: &'static str) {
        self.fail_points.lock().unwrap_or_else(|p| p.into_inner()).insert(op);
    }

    /// Password hash stored for an account.
    pub async fn password_hash(&self, account_id: i32) -> Option<String> {
        self.state.lock().await.password_hashes.get(&account_id).cloned()
    }

    /// Overwrite a ride row directly, bypassing every check. Lets tests
    /// reproduce states that only a corrupted database could reach.
    pub async fn force_ride(&self, ride: Ride) {
        self.state.lock().await.rides.insert(ride.id, ride);
    }

    pub async fn all_rides(&self) -> Vec<Ride> {
        self.state.lock().await.rides.values().cloned().collect()
    }

    pub async fn all_reservations(&self) -> Vec<Reservation> {
        self.state.lock().await.reservations.values().cloned().collect()
    }
}

#[async_trait]
impl RideStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, ServiceError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work, fail_points: self.fail_points.clone() })
    }

    async fn ride(&self, id: i32) -> Result<Option<Ride>, ServiceError> {
        Ok(self.state.lock().await.rides.get(&id).cloned())
    }

    async fn rides_by_ids(&self, ids: &[i32]) -> Result<Vec<Ride>, ServiceError> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.rides.get(id).cloned()).collect())
    }

    async fn rides_by_driver(&self, driver_id: i32) -> Result<Vec<Ride>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.rides.values().filter(|r| r.driver_id == driver_id).cloned().collect())
    }

    async fn rides_departing_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Ride>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state
            .rides
            .values()
            .filter(|r| !r.cancelled && r.departure_at >= from && r.departure_at < to)
            .cloned()
            .collect())
    }

    async fn latest_route_near(&self, departure: GeoPoint, arrival: GeoPoint, tolerance_m: f64) -> Result<Option<RouteData>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state
            .rides
            .values()
            .filter(|r| r.route.is_some())
            .filter(|r| within_radius_m(r.departure, departure, tolerance_m) && within_radius_m(r.arrival, arrival, tolerance_m))
            .max_by_key(|r| (r.created_at, r.id))
            .and_then(|r| r.route.clone()))
    }

    async fn reservations_for_ride(&self, ride_id: i32) -> Result<Vec<Reservation>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.reservations.values().filter(|r| r.ride_id == ride_id).cloned().collect())
    }

    async fn reservations_by_passenger(&self, passenger_id: i32) -> Result<Vec<Reservation>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.reservations.values().filter(|r| r.passenger_id == passenger_id).cloned().collect())
    }

    async fn account(&self, id: i32) -> Result<Option<Account>, ServiceError> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        let email = normalize_email(email);
        Ok(self.state.lock().await.accounts.values().find(|a| a.email == email).cloned())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    work: State,
    fail_points: Arc<std::sync::Mutex<HashSet<&'static str>>>,
}

impl MemoryTx {
    fn trip(&self, op: &'static str) -> Result<(), ServiceError> {
        let mut points = self.fail_points.lock().unwrap_or_else(|p| p.into_inner());
        if points.remove(op) {
            return Err(ServiceError::Db(format!("injected failure in {op}")));
        }
        Ok(())
    }

    fn ride_mut(&mut self, id: i32) -> Result<&mut Ride, ServiceError> {
        self.work.rides.get_mut(&id).ok_or_else(|| ServiceError::not_found("ride", id))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_ride(&mut self, id: i32) -> Result<Option<Ride>, ServiceError> {
        self.trip("lock_ride")?;
        Ok(self.work.rides.get(&id).cloned())
    }

    async fn lock_rides(&mut self, ids: &[i32]) -> Result<Vec<Ride>, ServiceError> {
        self.trip("lock_rides")?;
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids.iter().filter_map(|id| self.work.rides.get(id).cloned()).collect())
    }

    async fn set_approved_seat_count(&mut self, ride_id: i32, count: i32) -> Result<(), ServiceError> {
        self.trip("set_approved_seat_count")?;
        let ride = self.ride_mut(ride_id)?;
        if count < 0 || count > ride.max_seats {
            return Err(ServiceError::IntegrityViolation(format!(
                "approved_seat_count {count} outside 0..={} for ride {ride_id}",
                ride.max_seats
            )));
        }
        ride.approved_seat_count = count;
        Ok(())
    }

    async fn insert_ride(&mut self, new: &NewRide) -> Result<Ride, ServiceError> {
        self.trip("insert_ride")?;
        if !self.work.accounts.contains_key(&new.driver_id) {
            return Err(ServiceError::IntegrityViolation(format!("driver {} does not exist", new.driver_id)));
        }
        let id = self.work.next_id();
        let ride = Ride {
            id,
            driver_id: new.driver_id,
            departure_city: new.departure_city.trim().to_string(),
            departure_address: new.departure_address.trim().to_string(),
            departure: new.departure,
            arrival_city: new.arrival_city.trim().to_string(),
            arrival_address: new.arrival_address.trim().to_string(),
            arrival: new.arrival,
            departure_at: new.departure_at,
            arrival_at: new.arrival_at,
            max_seats: new.max_seats,
            approved_seat_count: 0,
            route: new.route.clone(),
            cancelled: false,
            created_at: Utc::now().fixed_offset(),
        };
        self.work.rides.insert(id, ride.clone());
        Ok(ride)
    }

    async fn ride_ids_by_driver(&mut self, driver_id: i32) -> Result<Vec<i32>, ServiceError> {
        self.trip("ride_ids_by_driver")?;
        Ok(self.work.rides.values().filter(|r| r.driver_id == driver_id).map(|r| r.id).collect())
    }

    async fn mark_rides_cancelled(&mut self, ride_ids: &[i32]) -> Result<u64, ServiceError> {
        self.trip("mark_rides_cancelled")?;
        let mut n = 0;
        for ride in self.work.rides.values_mut().filter(|r| ride_ids.contains(&r.id) && !r.cancelled) {
            ride.cancelled = true;
            n += 1;
        }
        Ok(n)
    }

    async fn reassign_rides(&mut self, ride_ids: &[i32], driver_id: i32) -> Result<u64, ServiceError> {
        self.trip("reassign_rides")?;
        if !self.work.accounts.contains_key(&driver_id) {
            return Err(ServiceError::IntegrityViolation(format!("driver {driver_id} does not exist")));
        }
        let mut n = 0;
        for ride in self.work.rides.values_mut().filter(|r| ride_ids.contains(&r.id)) {
            ride.driver_id = driver_id;
            n += 1;
        }
        Ok(n)
    }

    async fn reservation(&mut self, id: i32) -> Result<Option<Reservation>, ServiceError> {
        self.trip("reservation")?;
        Ok(self.work.reservations.get(&id).cloned())
    }

    async fn live_reservation(&mut self, passenger_id: i32, ride_id: i32) -> Result<Option<Reservation>, ServiceError> {
        self.trip("live_reservation")?;
        Ok(self
            .work
            .reservations
            .values()
            .find(|r| r.passenger_id == passenger_id && r.ride_id == ride_id && !r.anonymized)
            .cloned())
    }

    async fn insert_reservation(&mut self, passenger_id: i32, ride_id: i32) -> Result<Reservation, ServiceError> {
        self.trip("insert_reservation")?;
        if !self.work.accounts.contains_key(&passenger_id) || !self.work.rides.contains_key(&ride_id) {
            return Err(ServiceError::IntegrityViolation(format!("dangling reservation ({passenger_id}, {ride_id})")));
        }
        let duplicate = self
            .work
            .reservations
            .values()
            .any(|r| r.passenger_id == passenger_id && r.ride_id == ride_id && !r.anonymized);
        if duplicate {
            return Err(ServiceError::IntegrityViolation(format!("reservation ({passenger_id}, {ride_id}) already exists")));
        }
        let id = self.work.next_id();
        let now = Utc::now().fixed_offset();
        let reservation = Reservation {
            id,
            passenger_id,
            ride_id,
            status: ReservationStatus::Waiting,
            anonymized: false,
            created_at: now,
            updated_at: now,
        };
        self.work.reservations.insert(id, reservation.clone());
        Ok(reservation)
    }

    async fn set_reservation_status(&mut self, id: i32, status: ReservationStatus) -> Result<(), ServiceError> {
        self.trip("set_reservation_status")?;
        let r = self.work.reservations.get_mut(&id).ok_or_else(|| ServiceError::not_found("reservation", id))?;
        r.status = status;
        r.updated_at = Utc::now().fixed_offset();
        Ok(())
    }

    async fn cancel_active_reservations(&mut self, ride_ids: &[i32], status: ReservationStatus) -> Result<Vec<Reservation>, ServiceError> {
        self.trip("cancel_active_reservations")?;
        let now = Utc::now().fixed_offset();
        let mut changed = Vec::new();
        for r in self.work.reservations.values_mut() {
            if ride_ids.contains(&r.ride_id) && r.status.is_active() {
                r.status = status;
                r.updated_at = now;
                changed.push(r.clone());
            }
        }
        Ok(changed)
    }

    async fn reservations_by_passenger(&mut self, passenger_id: i32) -> Result<Vec<Reservation>, ServiceError> {
        self.trip("reservations_by_passenger")?;
        Ok(self.work.reservations.values().filter(|r| r.passenger_id == passenger_id).cloned().collect())
    }

    async fn anonymize_reservations(&mut self, passenger_id: i32, sentinel_id: i32) -> Result<u64, ServiceError> {
        self.trip("anonymize_reservations")?;
        let now = Utc::now().fixed_offset();
        let mut n = 0;
        for r in self.work.reservations.values_mut().filter(|r| r.passenger_id == passenger_id) {
            if r.status.is_active() {
                r.status = ReservationStatus::CancelledByPassenger;
            }
            r.passenger_id = sentinel_id;
            r.anonymized = true;
            r.updated_at = now;
            n += 1;
        }
        Ok(n)
    }

    async fn account(&mut self, id: i32) -> Result<Option<Account>, ServiceError> {
        self.trip("account")?;
        Ok(self.work.accounts.get(&id).cloned())
    }

    async fn account_by_email(&mut self, email: &str) -> Result<Option<Account>, ServiceError> {
        self.trip("account_by_email")?;
        let email = normalize_email(email);
        Ok(self.work.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn insert_account(&mut self, user: &NewUser) -> Result<Account, ServiceError> {
        self.trip("insert_account")?;
        let email = normalize_email(&user.email);
        if self.work.accounts.values().any(|a| a.email == email) {
            return Err(ServiceError::IntegrityViolation(format!("email {email} already registered")));
        }
        let id = self.work.next_id();
        let account = Account {
            id,
            email,
            first_name: user.first_name.trim().to_string(),
            last_name: user.last_name.trim().to_string(),
            role: user.role.clone(),
            verified: user.verified,
            created_at: Utc::now().fixed_offset(),
        };
        self.work.accounts.insert(id, account.clone());
        self.work.password_hashes.insert(id, user.password_hash.clone());
        Ok(account)
    }

    async fn insert_account_if_absent(&mut self, user: &NewUser) -> Result<Account, ServiceError> {
        let email = normalize_email(&user.email);
        if let Some(existing) = self.work.accounts.values().find(|a| a.email == email) {
            return Ok(existing.clone());
        }
        self.insert_account(user).await
    }

    async fn delete_account(&mut self, id: i32) -> Result<(), ServiceError> {
        self.trip("delete_account")?;
        let referenced = self.work.rides.values().any(|r| r.driver_id == id)
            || self.work.reservations.values().any(|r| r.passenger_id == id);
        if referenced {
            return Err(ServiceError::IntegrityViolation(format!("account {id} is still referenced")));
        }
        self.work.accounts.remove(&id).ok_or_else(|| ServiceError::not_found("account", id))?;
        self.work.password_hashes.remove(&id);
        Ok(())
    }

    async fn commit(self) -> Result<(), ServiceError> {
        let MemoryTx { mut guard, work, .. } = self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self) -> Result<(), ServiceError> {
        Ok(())
    }
}
