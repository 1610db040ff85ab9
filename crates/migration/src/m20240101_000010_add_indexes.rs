use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

// sea-query has no portable partial-index builder, so this one is raw SQL.
const LIVE_PAIR_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS uniq_reservation_live_pair \
     ON reservation (passenger_id, ride_id) WHERE NOT anonymized";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Ride: driver lookups ("my rides", erasure)
        manager
            .create_index(
                Index::create()
                    .name("idx_ride_driver")
                    .table(Ride::Table)
                    .col(Ride::DriverId)
                    .to_owned(),
            )
            .await?;

        // Ride: search by day
        manager
            .create_index(
                Index::create()
                    .name("idx_ride_departure_at")
                    .table(Ride::Table)
                    .col(Ride::DepartureAt)
                    .to_owned(),
            )
            .await?;

        // Ride: route reuse scans newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_ride_created_at")
                    .table(Ride::Table)
                    .col(Ride::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Reservation: roster and cascade by ride
        manager
            .create_index(
                Index::create()
                    .name("idx_reservation_ride")
                    .table(Reservation::Table)
                    .col(Reservation::RideId)
                    .to_owned(),
            )
            .await?;

        manager.get_connection().execute_unprepared(LIVE_PAIR_INDEX).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS uniq_reservation_live_pair")
            .await?;
        manager
            .drop_index(Index::drop().name("idx_reservation_ride").table(Reservation::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_ride_created_at").table(Ride::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_ride_departure_at").table(Ride::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_ride_driver").table(Ride::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Ride { Table, DriverId, DepartureAt, CreatedAt }

#[derive(DeriveIden)]
enum Reservation { Table, RideId }
