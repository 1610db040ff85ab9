//! Plain data the engine works with, decoupled from the SeaORM entities.

use chrono::{DateTime, FixedOffset};
use common::types::GeoPoint;
use serde::{Deserialize, Serialize};

pub use models::reservation::ReservationStatus;
pub use models::ride::RouteData;
pub use models::user::Role;

/// Already-authenticated identity of whoever invokes an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: i32,
    pub role: Role,
}

impl Caller {
    pub fn user(user_id: i32) -> Self { Self { user_id, role: Role::User } }

    pub fn admin(user_id: i32) -> Self { Self { user_id, role: Role::Admin } }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: i32,
    pub driver_id: i32,
    pub departure_city: String,
    pub departure_address: String,
    pub departure: GeoPoint,
    pub arrival_city: String,
    pub arrival_address: String,
    pub arrival: GeoPoint,
    pub departure_at: DateTime<FixedOffset>,
    pub arrival_at: DateTime<FixedOffset>,
    pub max_seats: i32,
    pub approved_seat_count: i32,
    pub route: Option<RouteData>,
    pub cancelled: bool,
    pub created_at: DateTime<FixedOffset>,
}

impl Ride {
    pub fn is_full(&self) -> bool { self.approved_seat_count >= self.max_seats }

    pub fn seats_left(&self) -> i32 { (self.max_seats - self.approved_seat_count).max(0) }
}

impl From<models::ride::Model> for Ride {
    fn from(m: models::ride::Model) -> Self {
        let departure = m.departure_point();
        let arrival = m.arrival_point();
        // Route columns are written together; a partial row counts as no route.
        let route = match (m.distance_km, m.duration_min, m.route_polyline) {
            (Some(distance_km), Some(duration_min), Some(polyline)) => Some(RouteData { distance_km, duration_min, polyline }),
            _ => None,
        };
        Self {
            id: m.id,
            driver_id: m.driver_id,
            departure_city: m.departure_city,
            departure_address: m.departure_address,
            departure,
            arrival_city: m.arrival_city,
            arrival_address: m.arrival_address,
            arrival,
            departure_at: m.departure_at,
            arrival_at: m.arrival_at,
            max_seats: m.max_seats,
            approved_seat_count: m.approved_seat_count,
            route,
            cancelled: m.cancelled,
            created_at: m.created_at,
        }
    }
}

/// What a driver submits when publishing; the owner comes from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideDraft {
    pub departure_city: String,
    pub departure_address: String,
    pub departure: GeoPoint,
    pub arrival_city: String,
    pub arrival_address: String,
    pub arrival: GeoPoint,
    pub departure_at: DateTime<FixedOffset>,
    pub arrival_at: DateTime<FixedOffset>,
    pub max_seats: i32,
}

impl RideDraft {
    pub fn into_new_ride(self, driver_id: i32, route: Option<RouteData>) -> models::ride::NewRide {
        models::ride::NewRide {
            driver_id,
            departure_city: self.departure_city,
            departure_address: self.departure_address,
            departure: self.departure,
            arrival_city: self.arrival_city,
            arrival_address: self.arrival_address,
            arrival: self.arrival,
            departure_at: self.departure_at,
            arrival_at: self.arrival_at,
            max_seats: self.max_seats,
            route,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i32,
    pub passenger_id: i32,
    pub ride_id: i32,
    pub status: ReservationStatus,
    pub anonymized: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<models::reservation::Model> for Reservation {
    fn from(m: models::reservation::Model) -> Self {
        Self {
            id: m.id,
            passenger_id: m.passenger_id,
            ride_id: m.ride_id,
            status: m.status,
            anonymized: m.anonymized,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Business view of a user; credential material stays in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub verified: bool,
    pub created_at: DateTime<FixedOffset>,
}

impl From<models::user::Model> for Account {
    fn from(m: models::user::Model) -> Self {
        Self {
            id: m.id,
            email: m.email,
            first_name: m.first_name,
            last_name: m.last_name,
            role: m.role,
            verified: m.verified,
            created_at: m.created_at,
        }
    }
}
