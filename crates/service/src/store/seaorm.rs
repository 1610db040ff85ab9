use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::GeoPoint;
use common::utils::geo::{bounding_box, within_radius_m};
use models::ride::NewRide;
use models::user::{normalize_email, NewUser};
use models::{reservation, ride, user};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, RuntimeErr, SqlErr, TransactionTrait,
};
use sea_orm::sqlx;

use super::{RideStore, StoreTx};
use crate::domain::{Account, Reservation, ReservationStatus, Ride, RouteData};
use crate::errors::ServiceError;

/// SQLSTATE for `check_violation`; `sql_err()` has no variant for it.
const CHECK_VIOLATION: &str = "23514";

fn sqlstate(e: &DbErr) -> Option<String> {
    match e {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db))) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Map a database error, surfacing constraint violations as integrity errors.
pub(crate) fn db_err(e: DbErr) -> ServiceError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) | Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
            ServiceError::IntegrityViolation(msg)
        }
        _ if sqlstate(&e).as_deref() == Some(CHECK_VIOLATION) => ServiceError::IntegrityViolation(e.to_string()),
        _ => ServiceError::Db(e.to_string()),
    }
}

#[derive(Clone)]
pub struct SeaOrmStore {
    pub db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

async fn find_ride<C: ConnectionTrait>(db: &C, id: i32) -> Result<Option<Ride>, ServiceError> {
    let res = ride::Entity::find_by_id(id).one(db).await.map_err(db_err)?;
    Ok(res.map(Ride::from))
}

async fn reservations_where<C: ConnectionTrait>(db: &C, column: reservation::Column, id: i32) -> Result<Vec<Reservation>, ServiceError> {
    let rows = reservation::Entity::find()
        .filter(column.eq(id))
        .order_by_asc(reservation::Column::Id)
        .all(db)
        .await
        .map_err(db_err)?;
    Ok(rows.into_iter().map(Reservation::from).collect())
}

async fn find_account<C: ConnectionTrait>(db: &C, id: i32) -> Result<Option<Account>, ServiceError> {
    let res = user::Entity::find_by_id(id).one(db).await.map_err(db_err)?;
    Ok(res.map(Account::from))
}

#[async_trait]
impl RideStore for SeaOrmStore {
    type Tx = SeaOrmTx;

    async fn begin(&self) -> Result<SeaOrmTx, ServiceError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        Ok(SeaOrmTx { txn })
    }

    async fn ride(&self, id: i32) -> Result<Option<Ride>, ServiceError> {
        find_ride(&self.db, id).await
    }

    async fn rides_by_ids(&self, ids: &[i32]) -> Result<Vec<Ride>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = ride::Entity::find()
            .filter(ride::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Ride::from).collect())
    }

    async fn rides_by_driver(&self, driver_id: i32) -> Result<Vec<Ride>, ServiceError> {
        let rows = ride::Entity::find()
            .filter(ride::Column::DriverId.eq(driver_id))
            .order_by_asc(ride::Column::DepartureAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Ride::from).collect())
    }

    async fn rides_departing_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Ride>, ServiceError> {
        let rows = ride::Entity::find()
            .filter(ride::Column::Cancelled.eq(false))
            .filter(ride::Column::DepartureAt.gte(from))
            .filter(ride::Column::DepartureAt.lt(to))
            .order_by_asc(ride::Column::DepartureAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Ride::from).collect())
    }

    async fn latest_route_near(&self, departure: GeoPoint, arrival: GeoPoint, tolerance_m: f64) -> Result<Option<RouteData>, ServiceError> {
        // Bounding boxes narrow the scan; the exact great-circle check runs here.
        let dep = bounding_box(departure, tolerance_m / 1000.0);
        let arr = bounding_box(arrival, tolerance_m / 1000.0);
        let candidates = ride::Entity::find()
            .filter(ride::Column::DistanceKm.is_not_null())
            .filter(ride::Column::DurationMin.is_not_null())
            .filter(ride::Column::RoutePolyline.is_not_null())
            .filter(ride::Column::DepartureLat.between(dep.min_lat, dep.max_lat))
            .filter(ride::Column::DepartureLon.between(dep.min_lon, dep.max_lon))
            .filter(ride::Column::ArrivalLat.between(arr.min_lat, arr.max_lat))
            .filter(ride::Column::ArrivalLon.between(arr.min_lon, arr.max_lon))
            .order_by_desc(ride::Column::CreatedAt)
            .order_by_desc(ride::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(candidates
            .into_iter()
            .map(Ride::from)
            .find(|r| within_radius_m(r.departure, departure, tolerance_m) && within_radius_m(r.arrival, arrival, tolerance_m))
            .and_then(|r| r.route))
    }

    async fn reservations_for_ride(&self, ride_id: i32) -> Result<Vec<Reservation>, ServiceError> {
        reservations_where(&self.db, reservation::Column::RideId, ride_id).await
    }

    async fn reservations_by_passenger(&self, passenger_id: i32) -> Result<Vec<Reservation>, ServiceError> {
        reservations_where(&self.db, reservation::Column::PassengerId, passenger_id).await
    }

    async fn account(&self, id: i32) -> Result<Option<Account>, ServiceError> {
        find_account(&self.db, id).await
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        let res = user::find_by_email(&self.db, email).await?;
        Ok(res.map(Account::from))
    }
}

pub struct SeaOrmTx {
    txn: DatabaseTransaction,
}

#[async_trait]
impl StoreTx for SeaOrmTx {
    async fn lock_ride(&mut self, id: i32) -> Result<Option<Ride>, ServiceError> {
        let res = ride::Entity::find_by_id(id).lock_exclusive().one(&self.txn).await.map_err(db_err)?;
        Ok(res.map(Ride::from))
    }

    async fn lock_rides(&mut self, ids: &[i32]) -> Result<Vec<Ride>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = ride::Entity::find()
            .filter(ride::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(ride::Column::Id)
            .lock_exclusive()
            .all(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Ride::from).collect())
    }

    async fn set_approved_seat_count(&mut self, ride_id: i32, count: i32) -> Result<(), ServiceError> {
        let res = ride::Entity::update_many()
            .col_expr(ride::Column::ApprovedSeatCount, Expr::value(count))
            .filter(ride::Column::Id.eq(ride_id))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        if res.rows_affected == 0 {
            return Err(ServiceError::not_found("ride", ride_id));
        }
        Ok(())
    }

    async fn insert_ride(&mut self, new: &NewRide) -> Result<Ride, ServiceError> {
        let created = ride::active_model(new).insert(&self.txn).await.map_err(db_err)?;
        Ok(Ride::from(created))
    }

    async fn ride_ids_by_driver(&mut self, driver_id: i32) -> Result<Vec<i32>, ServiceError> {
        ride::Entity::find()
            .select_only()
            .column(ride::Column::Id)
            .filter(ride::Column::DriverId.eq(driver_id))
            .into_tuple::<i32>()
            .all(&self.txn)
            .await
            .map_err(db_err)
    }

    async fn mark_rides_cancelled(&mut self, ride_ids: &[i32]) -> Result<u64, ServiceError> {
        if ride_ids.is_empty() {
            return Ok(0);
        }
        let res = ride::Entity::update_many()
            .col_expr(ride::Column::Cancelled, Expr::value(true))
            .filter(ride::Column::Id.is_in(ride_ids.iter().copied()))
            .filter(ride::Column::Cancelled.eq(false))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected)
    }

    async fn reassign_rides(&mut self, ride_ids: &[i32], driver_id: i32) -> Result<u64, ServiceError> {
        if ride_ids.is_empty() {
            return Ok(0);
        }
        let res = ride::Entity::update_many()
            .col_expr(ride::Column::DriverId, Expr::value(driver_id))
            .filter(ride::Column::Id.is_in(ride_ids.iter().copied()))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected)
    }

    async fn reservation(&mut self, id: i32) -> Result<Option<Reservation>, ServiceError> {
        let res = reservation::Entity::find_by_id(id).one(&self.txn).await.map_err(db_err)?;
        Ok(res.map(Reservation::from))
    }

    async fn live_reservation(&mut self, passenger_id: i32, ride_id: i32) -> Result<Option<Reservation>, ServiceError> {
        let res = reservation::Entity::find()
            .filter(reservation::Column::PassengerId.eq(passenger_id))
            .filter(reservation::Column::RideId.eq(ride_id))
            .filter(reservation::Column::Anonymized.eq(false))
            .one(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(res.map(Reservation::from))
    }

    async fn insert_reservation(&mut self, passenger_id: i32, ride_id: i32) -> Result<Reservation, ServiceError> {
        let created = reservation::waiting(passenger_id, ride_id).insert(&self.txn).await.map_err(db_err)?;
        Ok(Reservation::from(created))
    }

    async fn set_reservation_status(&mut self, id: i32, status: ReservationStatus) -> Result<(), ServiceError> {
        let res = reservation::Entity::update_many()
            .col_expr(reservation::Column::Status, Expr::value(status))
            .col_expr(reservation::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(reservation::Column::Id.eq(id))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        if res.rows_affected == 0 {
            return Err(ServiceError::not_found("reservation", id));
        }
        Ok(())
    }

    async fn cancel_active_reservations(&mut self, ride_ids: &[i32], status: ReservationStatus) -> Result<Vec<Reservation>, ServiceError> {
        if ride_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = reservation::Entity::update_many()
            .col_expr(reservation::Column::Status, Expr::value(status))
            .col_expr(reservation::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(reservation::Column::RideId.is_in(ride_ids.iter().copied()))
            .filter(reservation::Column::Status.is_in(ReservationStatus::ACTIVE))
            .exec_with_returning(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Reservation::from).collect())
    }

    async fn reservations_by_passenger(&mut self, passenger_id: i32) -> Result<Vec<Reservation>, ServiceError> {
        reservations_where(&self.txn, reservation::Column::PassengerId, passenger_id).await
    }

    async fn anonymize_reservations(&mut self, passenger_id: i32, sentinel_id: i32) -> Result<u64, ServiceError> {
        let now = Utc::now().fixed_offset();
        reservation::Entity::update_many()
            .col_expr(reservation::Column::Status, Expr::value(ReservationStatus::CancelledByPassenger))
            .col_expr(reservation::Column::UpdatedAt, Expr::value(now))
            .filter(reservation::Column::PassengerId.eq(passenger_id))
            .filter(reservation::Column::Status.is_in(ReservationStatus::ACTIVE))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        let res = reservation::Entity::update_many()
            .col_expr(reservation::Column::PassengerId, Expr::value(sentinel_id))
            .col_expr(reservation::Column::Anonymized, Expr::value(true))
            .col_expr(reservation::Column::UpdatedAt, Expr::value(now))
            .filter(reservation::Column::PassengerId.eq(passenger_id))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected)
    }

    async fn account(&mut self, id: i32) -> Result<Option<Account>, ServiceError> {
        find_account(&self.txn, id).await
    }

    async fn account_by_email(&mut self, email: &str) -> Result<Option<Account>, ServiceError> {
        let res = user::find_by_email(&self.txn, email).await?;
        Ok(res.map(Account::from))
    }

    async fn insert_account(&mut self, new: &NewUser) -> Result<Account, ServiceError> {
        let created = user::active_model(new).insert(&self.txn).await.map_err(db_err)?;
        Ok(Account::from(created))
    }

    async fn insert_account_if_absent(&mut self, new: &NewUser) -> Result<Account, ServiceError> {
        user::Entity::insert(user::active_model(new))
            .on_conflict(OnConflict::column(user::Column::Email).do_nothing().to_owned())
            .exec_without_returning(&self.txn)
            .await
            .map_err(db_err)?;
        let email = normalize_email(&new.email);
        let stored = user::find_by_email(&self.txn, &email).await?;
        stored.map(Account::from).ok_or_else(|| ServiceError::IntegrityViolation(format!("account {email} vanished after upsert")))
    }

    async fn delete_account(&mut self, id: i32) -> Result<(), ServiceError> {
        let res = user::Entity::delete_by_id(id).exec(&self.txn).await.map_err(db_err)?;
        if res.rows_affected == 0 {
            return Err(ServiceError::not_found("account", id));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), ServiceError> {
        self.txn.commit().await.map_err(db_err)
    }

    async fn rollback(self) -> Result<(), ServiceError> {
        self.txn.rollback().await.map_err(db_err)
    }
}
