//! Create `user` table.
//!
//! Emails are stored lower-cased, so the plain unique key gives
//! case-insensitive uniqueness. The erasure sentinel lives here too.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(pk_auto(User::Id))
                    .col(string_len(User::Email, 255).unique_key().not_null())
                    .col(string_len(User::FirstName, 128).not_null())
                    .col(string_len(User::LastName, 128).not_null())
                    .col(string_len(User::PasswordHash, 255).not_null())
                    .col(string_len(User::Role, 16).not_null().default("user"))
                    .col(boolean(User::Verified).not_null().default(false))
                    .col(ColumnDef::new(User::ResetToken).string_len(128).null())
                    .col(
                        ColumnDef::new(User::ResetTokenExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(timestamp_with_time_zone(User::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(User::UpdatedAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(User::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
    Email,
    FirstName,
    LastName,
    PasswordHash,
    Role,
    Verified,
    ResetToken,
    ResetTokenExpiresAt,
    CreatedAt,
    UpdatedAt,
}
