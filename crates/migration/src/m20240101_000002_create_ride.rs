//! Create `ride` table with FK to the owning driver.
//!
//! The seat bounds are also enforced by CHECK constraints so no write path
//! can persist `approved_seat_count > max_seats`.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Ride::Table)
                    .if_not_exists()
                    .col(pk_auto(Ride::Id))
                    .col(integer(Ride::DriverId).not_null())
                    .col(string_len(Ride::DepartureCity, 128).not_null())
                    .col(string_len(Ride::DepartureAddress, 255).not_null())
                    .col(double(Ride::DepartureLon).not_null())
                    .col(double(Ride::DepartureLat).not_null())
                    .col(string_len(Ride::ArrivalCity, 128).not_null())
                    .col(string_len(Ride::ArrivalAddress, 255).not_null())
                    .col(double(Ride::ArrivalLon).not_null())
                    .col(double(Ride::ArrivalLat).not_null())
                    .col(timestamp_with_time_zone(Ride::DepartureAt).not_null())
                    .col(timestamp_with_time_zone(Ride::ArrivalAt).not_null())
                    .col(integer(Ride::MaxSeats).not_null())
                    .col(integer(Ride::ApprovedSeatCount).not_null().default(0))
                    .col(ColumnDef::new(Ride::DistanceKm).double().null())
                    .col(ColumnDef::new(Ride::DurationMin).double().null())
                    .col(ColumnDef::new(Ride::RoutePolyline).text().null())
                    .col(boolean(Ride::Cancelled).not_null().default(false))
                    .col(timestamp_with_time_zone(Ride::CreatedAt).not_null())
                    .check(Expr::col(Ride::MaxSeats).between(1, 4))
                    .check(
                        Expr::col(Ride::ApprovedSeatCount)
                            .gte(0)
                            .and(Expr::col(Ride::ApprovedSeatCount).lte(Expr::col(Ride::MaxSeats))),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_driver")
                            .from(Ride::Table, Ride::DriverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Ride::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Ride {
    Table,
    Id,
    DriverId,
    DepartureCity,
    DepartureAddress,
    DepartureLon,
    DepartureLat,
    ArrivalCity,
    ArrivalAddress,
    ArrivalLon,
    ArrivalLat,
    DepartureAt,
    ArrivalAt,
    MaxSeats,
    ApprovedSeatCount,
    DistanceKm,
    DurationMin,
    RoutePolyline,
    Cancelled,
    CreatedAt,
}

#[derive(DeriveIden)]
enum User { Table, Id }
