#![cfg(test)]
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use common::types::GeoPoint;
use configs::DatabaseConfig;
use migration::MigratorTrait;
use models::db::connect_with_config;
use models::user::{NewUser, Role};
use sea_orm::DatabaseConnection;
use tokio::sync::OnceCell;

use crate::domain::{Account, Ride, RideDraft, RouteData};
use crate::store::{RideStore, StoreTx};

// Ensure migrations run only once across the entire test process
static MIGRATED: OnceCell<bool> = OnceCell::const_new();

/// Connection to the test database, or `None` when database tests are
/// skipped (`SKIP_DB_TESTS` set, no `DATABASE_URL`, or unreachable).
pub async fn get_db() -> Option<DatabaseConnection> {
    if std::env::var("SKIP_DB_TESTS").is_ok() || std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let migrated = *MIGRATED
        .get_or_init(|| async {
            let Ok(db) = connect_with_config(&DatabaseConfig::from_env()).await else { return false };
            match migration::Migrator::up(&db, None).await {
                Ok(()) => true,
                Err(e) => {
                    eprintln!("skip: migrate up failed: {e}");
                    false
                }
            }
        })
        .await;
    if !migrated {
        return None;
    }
    // Fresh connection for the current test's runtime
    let mut cfg = DatabaseConfig::from_env();
    cfg.max_connections = cfg.max_connections.max(20);
    cfg.min_connections = cfg.min_connections.min(1);
    connect_with_config(&cfg).await.ok()
}

/// Unique suffix so database tests can share one schema.
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{:016x}@example.com", rand::random::<u64>())
}

/// Paris to Lyon, tomorrow 09:00-14:00 UTC, three seats.
pub fn draft() -> RideDraft {
    let day = Utc::now().date_naive() + Duration::days(1);
    let departure_at = Utc.from_utc_datetime(&day.and_hms_opt(9, 0, 0).unwrap()).fixed_offset();
    RideDraft {
        departure_city: "Paris".into(),
        departure_address: "1 rue de Rivoli".into(),
        departure: GeoPoint::unchecked(2.3522, 48.8566),
        arrival_city: "Lyon".into(),
        arrival_address: "Place Bellecour".into(),
        arrival: GeoPoint::unchecked(4.8357, 45.7640),
        departure_at,
        arrival_at: departure_at + Duration::hours(5),
        max_seats: 3,
    }
}

pub fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.into(),
        first_name: "Test".into(),
        last_name: "User".into(),
        password_hash: "$argon2id$test".into(),
        role: Role::User,
        verified: true,
    }
}

pub async fn seed_account<S: RideStore>(store: &Arc<S>, email: &str) -> Account {
    let mut tx = store.begin().await.unwrap();
    let account = tx.insert_account(&new_user(email)).await.unwrap();
    tx.commit().await.unwrap();
    account
}

pub async fn seed_ride_with_route<S: RideStore>(store: &Arc<S>, driver_id: i32, draft: &RideDraft, route: Option<RouteData>) -> Ride {
    let mut tx = store.begin().await.unwrap();
    let ride = tx.insert_ride(&draft.clone().into_new_ride(driver_id, route)).await.unwrap();
    tx.commit().await.unwrap();
    ride
}

pub async fn seed_ride<S: RideStore>(store: &Arc<S>, driver_id: i32, draft: &RideDraft) -> Ride {
    seed_ride_with_route(store, driver_id, draft, None).await
}
