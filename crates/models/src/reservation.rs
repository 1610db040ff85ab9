use chrono::Utc;
use sea_orm::{entity::prelude::*, Set};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a passenger's seat request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[sea_orm(string_value = "waiting")]
    Waiting,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "refused")]
    Refused,
    #[sea_orm(string_value = "cancelled_by_passenger")]
    CancelledByPassenger,
    #[sea_orm(string_value = "cancelled_by_driver")]
    CancelledByDriver,
}

impl ReservationStatus {
    /// States a cascade still has to act on.
    pub const ACTIVE: [ReservationStatus; 2] = [ReservationStatus::Waiting, ReservationStatus::Approved];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Whether this reservation holds one of the ride's approved seats.
    pub fn holds_seat(self) -> bool {
        self == Self::Approved
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Approved => "approved",
            Self::Refused => "refused",
            Self::CancelledByPassenger => "cancelled_by_passenger",
            Self::CancelledByDriver => "cancelled_by_driver",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub passenger_id: i32,
    pub ride_id: i32,
    pub status: ReservationStatus,
    /// Set once the row has been re-owned by the erasure sentinel.
    pub anonymized: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Passenger,
    Ride,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Passenger => Entity::belongs_to(crate::user::Entity)
                .from(Column::PassengerId)
                .to(crate::user::Column::Id)
                .into(),
            Relation::Ride => Entity::belongs_to(crate::ride::Entity)
                .from(Column::RideId)
                .to(crate::ride::Column::Id)
                .into(),
        }
    }
}

impl Related<crate::user::Entity> for Entity {
    fn to() -> RelationDef { Relation::Passenger.def() }
}

impl Related<crate::ride::Entity> for Entity {
    fn to() -> RelationDef { Relation::Ride.def() }
}

impl ActiveModelBehavior for ActiveModel {}

/// A fresh `waiting` request.
pub fn waiting(passenger_id: i32, ride_id: i32) -> ActiveModel {
    let now = Utc::now().into();
    ActiveModel {
        passenger_id: Set(passenger_id),
        ride_id: Set(ride_id),
        status: Set(ReservationStatus::Waiting),
        anonymized: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}
