//! Account erasure.
//!
//! Rides and reservations outlive their owners: on erasure they are handed
//! to a permanent sentinel account and the real user row is deleted. The
//! whole cascade is one transaction, so either everything below happens or
//! nothing does:
//!
//! 1. resolve (or create) the sentinel;
//! 2. passenger side: release seats held by approved reservations, then
//!    re-own every reservation to the sentinel, cancelling active ones;
//! 3. driver side: cancel the user's rides and their active reservations,
//!    then re-own the rides to the sentinel;
//! 4. delete the user.
//!
//! Sessions are revoked and passengers notified only after commit.

use std::collections::BTreeSet;
use std::sync::Arc;

use configs::ErasureConfig;
use models::user::{NewUser, Role};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::accounts::unusable_password_hash;
use crate::domain::{Account, Caller, ReservationStatus};
use crate::errors::ServiceError;
use crate::metrics;
use crate::notify::{self, Notification, Notifier};
use crate::ride_lifecycle::cascade_cancel;
use crate::seat_ledger;
use crate::session::SessionRevoker;
use crate::store::{RideStore, StoreTx};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErasureReport {
    pub user_id: i32,
    pub sentinel_id: i32,
    pub seats_released: usize,
    pub reservations_anonymized: u64,
    pub rides_cancelled: u64,
    pub rides_reassigned: u64,
    pub reservations_cancelled_by_driver: usize,
}

/// Find the sentinel or insert it. Safe against concurrent creators: the
/// insert is a no-op when the marker email already exists.
pub async fn ensure_sentinel<T: StoreTx>(tx: &mut T, cfg: &ErasureConfig) -> Result<Account, ServiceError> {
    if let Some(existing) = tx.account_by_email(&cfg.sentinel_email).await? {
        return Ok(existing);
    }
    let sentinel = NewUser {
        email: cfg.sentinel_email.clone(),
        first_name: cfg.sentinel_first_name.clone(),
        last_name: cfg.sentinel_last_name.clone(),
        password_hash: unusable_password_hash()?,
        role: Role::User,
        verified: false,
    };
    let account = tx.insert_account_if_absent(&sentinel).await?;
    info!(sentinel_id = account.id, "sentinel_account_ready");
    Ok(account)
}

pub struct ErasureService<S: RideStore> {
    store: Arc<S>,
    cfg: ErasureConfig,
    revoker: Arc<dyn SessionRevoker>,
    notifier: Arc<dyn Notifier>,
}

impl<S: RideStore> ErasureService<S> {
    pub fn new(store: Arc<S>, cfg: ErasureConfig, revoker: Arc<dyn SessionRevoker>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, cfg, revoker, notifier }
    }

    /// Create the sentinel ahead of time, e.g. at startup.
    pub async fn ensure_sentinel(&self) -> Result<Account, ServiceError> {
        let mut tx = self.store.begin().await?;
        let sentinel = ensure_sentinel(&mut tx, &self.cfg).await?;
        tx.commit().await?;
        Ok(sentinel)
    }

    /// Erase `user_id`. Allowed for the account itself and for admins.
    #[instrument(skip(self), fields(caller_id = caller.user_id))]
    pub async fn erase(&self, caller: &Caller, user_id: i32) -> Result<ErasureReport, ServiceError> {
        if caller.user_id != user_id && !caller.is_admin() {
            return Err(ServiceError::unauthorized("accounts can only be erased by their owner or an admin"));
        }
        let timer = metrics::ERASURE_DURATION.start_timer();

        let mut tx = self.store.begin().await?;
        tx.account(user_id).await?.ok_or_else(|| ServiceError::not_found("account", user_id))?;
        let sentinel = ensure_sentinel(&mut tx, &self.cfg).await?;
        if sentinel.id == user_id {
            return Err(ServiceError::invalid_transition("the sentinel account cannot be erased"));
        }

        // Lock every ride the cascade may touch, in id order, then re-read:
        // statuses seen before the locks were taken can be stale.
        let driven = tx.ride_ids_by_driver(user_id).await?;
        let mut locked: BTreeSet<i32> = BTreeSet::new();
        let mut pending: BTreeSet<i32> = tx
            .reservations_by_passenger(user_id)
            .await?
            .iter()
            .map(|r| r.ride_id)
            .chain(driven.iter().copied())
            .collect();
        let held = loop {
            tx.lock_rides(&pending.iter().copied().collect::<Vec<_>>()).await?;
            locked.append(&mut pending);
            let held = tx.reservations_by_passenger(user_id).await?;
            // A request that committed meanwhile can name a ride not yet locked.
            pending = held.iter().map(|r| r.ride_id).filter(|id| !locked.contains(id)).collect();
            if pending.is_empty() {
                break held;
            }
        };

        // passenger side
        let mut seats_released = 0;
        for r in held.iter().filter(|r| r.status == ReservationStatus::Approved) {
            let ride = seat_ledger::decrement(&mut tx, r.ride_id).await?;
            if !ride.cancelled {
                seats_released += 1;
            }
        }
        let reservations_anonymized = tx.anonymize_reservations(user_id, sentinel.id).await?;

        // driver side
        let (affected, rides_cancelled) = cascade_cancel(&mut tx, &driven).await?;
        let rides_reassigned = tx.reassign_rides(&driven, sentinel.id).await?;

        tx.delete_account(user_id).await?;
        tx.commit().await?;
        timer.observe_duration();

        let report = ErasureReport {
            user_id,
            sentinel_id: sentinel.id,
            seats_released,
            reservations_anonymized,
            rides_cancelled,
            rides_reassigned,
            reservations_cancelled_by_driver: affected.len(),
        };
        metrics::ACCOUNTS_ERASED_TOTAL.inc();
        info!(?report, "account_erased");

        if let Err(e) = self.revoker.revoke_all(user_id).await {
            warn!(user_id, error = %e, "session revocation failed after erasure");
        }
        for r in &affected {
            notify::deliver(self.notifier.as_ref(), r.passenger_id, Notification::RideCancelled { ride_id: r.ride_id }).await;
        }
        Ok(report)
    }
}
