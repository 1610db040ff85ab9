use chrono::{DateTime, FixedOffset, Utc};
use common::types::GeoPoint;
use sea_orm::{entity::prelude::*, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::validation::{self, FieldError};

pub const MIN_SEATS: i32 = 1;
pub const MAX_SEATS: i32 = 4;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ride")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub driver_id: i32,
    pub departure_city: String,
    pub departure_address: String,
    pub departure_lon: f64,
    pub departure_lat: f64,
    pub arrival_city: String,
    pub arrival_address: String,
    pub arrival_lon: f64,
    pub arrival_lat: f64,
    pub departure_at: DateTimeWithTimeZone,
    pub arrival_at: DateTimeWithTimeZone,
    pub max_seats: i32,
    pub approved_seat_count: i32,
    pub distance_km: Option<f64>,
    pub duration_min: Option<f64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub route_polyline: Option<String>,
    pub cancelled: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Driver,
    Reservations,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Driver => Entity::belongs_to(crate::user::Entity)
                .from(Column::DriverId)
                .to(crate::user::Column::Id)
                .into(),
            Relation::Reservations => Entity::has_many(crate::reservation::Entity).into(),
        }
    }
}

impl Related<crate::user::Entity> for Entity {
    fn to() -> RelationDef { Relation::Driver.def() }
}

impl Related<crate::reservation::Entity> for Entity {
    fn to() -> RelationDef { Relation::Reservations.def() }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn departure_point(&self) -> GeoPoint {
        GeoPoint::unchecked(self.departure_lon, self.departure_lat)
    }

    pub fn arrival_point(&self) -> GeoPoint {
        GeoPoint::unchecked(self.arrival_lon, self.arrival_lat)
    }
}

/// Route data reused between rides with matching endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteData {
    pub distance_km: f64,
    pub duration_min: f64,
    /// Encoded polyline of the route shape.
    pub polyline: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRide {
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
    pub route: Option<RouteData>,
}

/// Validate a ride before publication. `now` is passed in so callers and
/// tests control the clock.
pub fn validate_new_ride(input: &NewRide, now: DateTime<Utc>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validation::require_text(&mut errors, "departure_city", &input.departure_city, 128);
    validation::require_text(&mut errors, "departure_address", &input.departure_address, 255);
    validation::require_text(&mut errors, "arrival_city", &input.arrival_city, 128);
    validation::require_text(&mut errors, "arrival_address", &input.arrival_address, 255);
    if GeoPoint::new(input.departure.lon, input.departure.lat).is_err() {
        errors.push(FieldError::new("departure", "coordinates out of range"));
    }
    if GeoPoint::new(input.arrival.lon, input.arrival.lat).is_err() {
        errors.push(FieldError::new("arrival", "coordinates out of range"));
    }
    if !(MIN_SEATS..=MAX_SEATS).contains(&input.max_seats) {
        errors.push(FieldError::new("max_seats", format!("must be between {MIN_SEATS} and {MAX_SEATS}")));
    }
    if input.departure_at <= now {
        errors.push(FieldError::new("departure_at", "must be in the future"));
    }
    if input.arrival_at <= input.departure_at {
        errors.push(FieldError::new("arrival_at", "must be after departure_at"));
    }
    if let Some(route) = &input.route {
        if route.distance_km.is_nan() || route.distance_km < 0.0 || route.duration_min.is_nan() || route.duration_min < 0.0 {
            errors.push(FieldError::new("route", "distance and duration must be >= 0"));
        }
    }
    errors
}

pub fn active_model(input: &NewRide) -> ActiveModel {
    let route = input.route.as_ref();
    ActiveModel {
        driver_id: Set(input.driver_id),
        departure_city: Set(input.departure_city.trim().to_string()),
        departure_address: Set(input.departure_address.trim().to_string()),
        departure_lon: Set(input.departure.lon),
        departure_lat: Set(input.departure.lat),
        arrival_city: Set(input.arrival_city.trim().to_string()),
        arrival_address: Set(input.arrival_address.trim().to_string()),
        arrival_lon: Set(input.arrival.lon),
        arrival_lat: Set(input.arrival.lat),
        departure_at: Set(input.departure_at),
        arrival_at: Set(input.arrival_at),
        max_seats: Set(input.max_seats),
        approved_seat_count: Set(0),
        distance_km: Set(route.map(|r| r.distance_km)),
        duration_min: Set(route.map(|r| r.duration_min)),
        route_polyline: Set(route.map(|r| r.polyline.clone())),
        cancelled: Set(false),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
}

pub async fn create<C: ConnectionTrait>(db: &C, input: &NewRide) -> Result<Model, ModelError> {
    validation::into_result(validate_new_ride(input, Utc::now()))?;
    active_model(input).insert(db).await.map_err(|e| ModelError::Db(e.to_string()))
}
