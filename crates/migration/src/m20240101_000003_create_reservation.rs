//! Create `reservation` table linking passengers to rides.
//!
//! Rows are never deleted. `anonymized` marks rows re-owned by the erasure
//! sentinel; the live-pair uniqueness index excludes them.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reservation::Table)
                    .if_not_exists()
                    .col(pk_auto(Reservation::Id))
                    .col(integer(Reservation::PassengerId).not_null())
                    .col(integer(Reservation::RideId).not_null())
                    .col(string_len(Reservation::Status, 32).not_null())
                    .col(boolean(Reservation::Anonymized).not_null().default(false))
                    .col(timestamp_with_time_zone(Reservation::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Reservation::UpdatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservation_passenger")
                            .from(Reservation::Table, Reservation::PassengerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservation_ride")
                            .from(Reservation::Table, Reservation::RideId)
                            .to(Ride::Table, Ride::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Reservation::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Reservation {
    Table,
    Id,
    PassengerId,
    RideId,
    Status,
    Anonymized,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum User { Table, Id }

#[derive(DeriveIden)]
enum Ride { Table, Id }
