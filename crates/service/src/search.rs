//! Ride search: day window, endpoint matching, availability and pricing.
//!
//! Availability read here may be a few seconds stale; it is re-checked
//! under lock when a seat is actually approved.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use common::types::GeoPoint;
use common::utils::geo::within_radius_m;
use models::validation::FieldError;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{Caller, ReservationStatus, Ride};
use crate::errors::ServiceError;
use crate::pricing::{effective_distance_km, PricingCalculator, Quote};
use crate::store::RideStore;

/// One side of a trip to match. A point takes precedence over the city name;
/// with neither, every ride matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub city: Option<String>,
    pub point: Option<GeoPoint>,
    pub radius_km: f64,
}

impl Place {
    pub fn city(name: &str) -> Self { Self { city: Some(name.to_string()), ..Self::default() } }

    pub fn near(point: GeoPoint, radius_km: f64) -> Self { Self { city: None, point: Some(point), radius_km } }

    fn matches(&self, city: &str, point: GeoPoint) -> bool {
        match (&self.point, &self.city) {
            (Some(center), _) => within_radius_m(*center, point, self.radius_km * 1000.0),
            (None, Some(name)) => name.trim().eq_ignore_ascii_case(city.trim()),
            (None, None) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub from: Place,
    pub to: Place,
    pub date: NaiveDate,
    /// Offset from UTC, in seconds, the day boundaries are taken in.
    pub utc_offset_secs: i32,
}

impl SearchQuery {
    /// `[start, end)` of the requested day, in UTC.
    pub fn day_window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
        let not_representable = || ServiceError::Validation(vec![FieldError::new("date", "not representable")]);
        let midnight = self.date.and_hms_opt(0, 0, 0).ok_or_else(not_representable)?;
        let offset = FixedOffset::east_opt(self.utc_offset_secs)
            .ok_or_else(|| ServiceError::Validation(vec![FieldError::new("utc_offset_secs", "out of range")]))?;
        let start = offset
            .from_local_datetime(&midnight)
            .single()
            .ok_or_else(not_representable)?
            .with_timezone(&Utc);
        Ok((start, start + Duration::days(1)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub ride: Ride,
    pub distance_km: f64,
    pub quote: Quote,
    /// Caller's own reservation status on this ride, if any.
    pub my_status: Option<ReservationStatus>,
}

/// Ride id -> status of the caller's live reservations.
pub(crate) async fn statuses_for<S: RideStore>(store: &S, caller: Option<&Caller>) -> Result<HashMap<i32, ReservationStatus>, ServiceError> {
    let Some(caller) = caller else { return Ok(HashMap::new()) };
    let held = store.reservations_by_passenger(caller.user_id).await?;
    Ok(held.into_iter().filter(|r| !r.anonymized).map(|r| (r.ride_id, r.status)).collect())
}

pub struct SearchService<S: RideStore> {
    store: Arc<S>,
    pricing: PricingCalculator,
}

impl<S: RideStore> SearchService<S> {
    pub fn new(store: Arc<S>, pricing: PricingCalculator) -> Self { Self { store, pricing } }

    #[instrument(skip(self, query), fields(date = %query.date))]
    pub async fn search(&self, caller: Option<&Caller>, query: &SearchQuery) -> Result<Vec<SearchHit>, ServiceError> {
        let (start, end) = query.day_window()?;
        let candidates = self.store.rides_departing_between(start, end).await?;
        let mine = statuses_for(self.store.as_ref(), caller).await?;

        let mut hits = Vec::new();
        for ride in candidates {
            if ride.cancelled || ride.is_full() {
                continue;
            }
            if !query.from.matches(&ride.departure_city, ride.departure) || !query.to.matches(&ride.arrival_city, ride.arrival) {
                continue;
            }
            let quote = self.pricing.quote_ride(&ride)?;
            hits.push(SearchHit {
                distance_km: effective_distance_km(&ride),
                quote,
                my_status: mine.get(&ride.id).copied(),
                ride,
            });
        }
        hits.sort_by(|a, b| a.ride.departure_at.cmp(&b.ride.departure_at).then(a.ride.id.cmp(&b.ride.id)));
        debug!(hits = hits.len(), "search done");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RideDraft;
    use crate::store::MemoryStore;
    use crate::store::StoreTx;
    use crate::test_support::{draft, seed_account, seed_ride};
    use configs::PricingConfig;

    fn query_for(d: &RideDraft) -> SearchQuery {
        SearchQuery {
            from: Place::city("paris"),
            to: Place::city("Lyon"),
            date: d.departure_at.date_naive(),
            utc_offset_secs: d.departure_at.offset().local_minus_utc(),
        }
    }

    async fn setup() -> (Arc<MemoryStore>, SearchService<MemoryStore>, i32) {
        let store = Arc::new(MemoryStore::new());
        let driver = seed_account(&store, "driver@example.com").await;
        let svc = SearchService::new(store.clone(), PricingCalculator::new(PricingConfig::default()));
        (store, svc, driver.id)
    }

    #[test]
    fn day_window_follows_caller_offset() {
        let q = SearchQuery {
            from: Place::city("Paris"),
            to: Place::city("Lyon"),
            date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            utc_offset_secs: 2 * 3600,
        };
        let (start, end) = q.day_window().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2030, 5, 31, 22, 0, 0).unwrap());
        assert_eq!(end - start, Duration::days(1));

        let err = SearchQuery { utc_offset_secs: 30 * 3600, ..q }.day_window().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref e) if e[0].field == "utc_offset_secs"));
    }

    #[tokio::test]
    async fn finds_rides_on_the_day_sorted_by_departure() {
        let (store, svc, driver) = setup().await;
        let d = draft();
        let later = seed_ride(&store, driver, &RideDraft { departure_at: d.departure_at + Duration::hours(2), arrival_at: d.arrival_at + Duration::hours(2), ..d.clone() }).await;
        let earlier = seed_ride(&store, driver, &d).await;
        seed_ride(&store, driver, &RideDraft { departure_at: d.departure_at + Duration::days(1), arrival_at: d.arrival_at + Duration::days(1), ..d.clone() }).await;

        let hits = svc.search(None, &query_for(&d)).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.ride.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);
        assert!(hits.iter().all(|h| h.my_status.is_none()));
    }

    #[tokio::test]
    async fn excludes_full_and_cancelled_rides() {
        let (store, svc, driver) = setup().await;
        let d = draft();
        let full = seed_ride(&store, driver, &RideDraft { max_seats: 1, ..d.clone() }).await;
        let cancelled = seed_ride(&store, driver, &d).await;
        let open = seed_ride(&store, driver, &d).await;
        let mut tx = store.begin().await.unwrap();
        tx.set_approved_seat_count(full.id, 1).await.unwrap();
        tx.mark_rides_cancelled(&[cancelled.id]).await.unwrap();
        tx.commit().await.unwrap();

        let ids: Vec<_> = svc.search(None, &query_for(&d)).await.unwrap().into_iter().map(|h| h.ride.id).collect();
        assert_eq!(ids, vec![open.id]);
    }

    #[tokio::test]
    async fn radius_matching_uses_points() {
        let (store, svc, driver) = setup().await;
        let d = draft();
        let ride = seed_ride(&store, driver, &d).await;
        let mut q = query_for(&d);
        q.from = Place::near(GeoPoint::unchecked(d.departure.lon + 0.02, d.departure.lat), 5.0);
        q.to = Place::near(d.arrival, 1.0);
        assert_eq!(svc.search(None, &q).await.unwrap()[0].ride.id, ride.id);

        q.from = Place::near(GeoPoint::unchecked(d.departure.lon + 0.5, d.departure.lat), 5.0);
        assert!(svc.search(None, &q).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hits_carry_quote_and_my_status() {
        let (store, svc, driver) = setup().await;
        let d = draft();
        let ride = seed_ride(&store, driver, &d).await;
        let me = seed_account(&store, "me@example.com").await;
        let mut tx = store.begin().await.unwrap();
        tx.insert_reservation(me.id, ride.id).await.unwrap();
        tx.commit().await.unwrap();

        let hits = svc.search(Some(&Caller::user(me.id)), &query_for(&d)).await.unwrap();
        assert_eq!(hits[0].my_status, Some(ReservationStatus::Waiting));
        let expected = PricingCalculator::new(PricingConfig::default()).quote_ride(&ride).unwrap();
        assert_eq!(hits[0].quote, expected);
    }
}
