//! End-to-end flows across the services, on the in-memory store.

use std::sync::Arc;

use configs::{ErasureConfig, PricingConfig};
use rust_decimal::Decimal;

use crate::directions::mock::StaticDirections;
use crate::domain::{Caller, ReservationStatus, RideDraft, RouteData};
use crate::erasure::ErasureService;
use crate::errors::ServiceError;
use crate::notify::mock::RecordingNotifier;
use crate::notify::Notification;
use crate::pricing::PricingCalculator;
use crate::reservation::ReservationService;
use crate::ride_lifecycle::RideService;
use crate::route_cache::RouteLookup;
use crate::search::{Place, SearchQuery, SearchService};
use crate::session::mock::RecordingRevoker;
use crate::store::{MemoryStore, RideStore};
use crate::test_support::{draft, seed_account};
use crate::views::ViewService;

struct App {
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    revoker: Arc<RecordingRevoker>,
    rides: RideService<MemoryStore>,
    reservations: ReservationService<MemoryStore>,
    erasure: ErasureService<MemoryStore>,
    search: SearchService<MemoryStore>,
    views: ViewService<MemoryStore>,
}

fn app(route: RouteData) -> App {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let revoker = Arc::new(RecordingRevoker::default());
    let pricing = PricingCalculator::new(PricingConfig::default());
    let routes = RouteLookup::new(store.clone(), Arc::new(StaticDirections::returning(route)), 500.0);
    App {
        rides: RideService::new(store.clone(), routes, notifier.clone()),
        reservations: ReservationService::new(store.clone(), notifier.clone()),
        erasure: ErasureService::new(store.clone(), ErasureConfig::default(), revoker.clone(), notifier.clone()),
        search: SearchService::new(store.clone(), pricing.clone()),
        views: ViewService::new(store.clone(), pricing),
        store,
        notifier,
        revoker,
    }
}

fn query(d: &RideDraft) -> SearchQuery {
    SearchQuery {
        from: Place::near(d.departure, 2.0),
        to: Place::city("lyon"),
        date: d.departure_at.date_naive(),
        utc_offset_secs: d.departure_at.offset().local_minus_utc(),
    }
}

#[tokio::test]
async fn short_trip_fills_up_and_drops_out_of_search() {
    let short = RouteData { distance_km: 5.0, duration_min: 12.0, polyline: "short".into() };
    let app = app(short);
    let driver = Caller::user(seed_account(&app.store, "driver@example.com").await.id);
    let d = RideDraft { max_seats: 4, ..draft() };
    let ride = app.rides.publish(&driver, d.clone()).await.unwrap();

    let mut passengers = Vec::new();
    for i in 0..4 {
        passengers.push(Caller::user(seed_account(&app.store, &format!("p{i}@example.com")).await.id));
    }
    for p in &passengers[..3] {
        let r = app.reservations.request(p, ride.id).await.unwrap();
        app.reservations.approve(&driver, r.id).await.unwrap();
    }

    // fourth passenger completes the car: top bonus on the 2.50 minimum fare
    let hits = app.search.search(Some(&passengers[3]), &query(&d)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].quote.total, Decimal::new(250, 2));
    assert_eq!(hits[0].quote.total_after_bonus, Decimal::new(213, 2));
    assert_eq!(hits[0].quote.per_passenger, Decimal::new(53, 2));
    assert_eq!(hits[0].my_status, None);

    let last = app.reservations.request(&passengers[3], ride.id).await.unwrap();
    app.reservations.approve(&driver, last.id).await.unwrap();

    assert!(app.search.search(Some(&passengers[3]), &query(&d)).await.unwrap().is_empty());
    let mine = app.views.passenger_reservations(&passengers[3]).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].reservation.status, ReservationStatus::Approved);
    assert!(mine[0].ride.is_full());
    assert_eq!(app.views.driver_rides(&driver).await.unwrap()[0].id, ride.id);
}

#[tokio::test]
async fn second_ride_on_same_route_reuses_stored_route() {
    let route = RouteData { distance_km: 465.0, duration_min: 255.0, polyline: "p".into() };
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(StaticDirections::returning(route.clone()));
    let routes = RouteLookup::new(store.clone(), provider.clone(), 500.0);
    let rides = RideService::new(store.clone(), routes, Arc::new(RecordingNotifier::default()));
    let driver = Caller::user(seed_account(&store, "driver@example.com").await.id);

    rides.publish(&driver, draft()).await.unwrap();
    let second = rides.publish(&driver, draft()).await.unwrap();
    assert_eq!(second.route, Some(route));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn driver_erasure_with_two_busy_rides() {
    let route = RouteData { distance_km: 465.0, duration_min: 255.0, polyline: "p".into() };
    let app = app(route);
    let driver = Caller::user(seed_account(&app.store, "driver@example.com").await.id);
    let mut ride_ids = Vec::new();
    for i in 0..2 {
        let ride = app.rides.publish(&driver, draft()).await.unwrap();
        let approved = Caller::user(seed_account(&app.store, &format!("a{i}@example.com")).await.id);
        let waiting = Caller::user(seed_account(&app.store, &format!("w{i}@example.com")).await.id);
        let r = app.reservations.request(&approved, ride.id).await.unwrap();
        app.reservations.approve(&driver, r.id).await.unwrap();
        app.reservations.request(&waiting, ride.id).await.unwrap();
        ride_ids.push(ride.id);
    }

    let report = app.erasure.erase(&driver, driver.user_id).await.unwrap();

    for id in &ride_ids {
        let ride = app.store.ride(*id).await.unwrap().unwrap();
        assert!(ride.cancelled);
        assert_eq!(ride.driver_id, report.sentinel_id);
    }
    let statuses: Vec<_> = app.store.all_reservations().await.into_iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![ReservationStatus::CancelledByDriver; 4]);
    assert!(app.store.account(driver.user_id).await.unwrap().is_none());
    assert_eq!(app.revoker.revoked(), vec![driver.user_id]);

    let cancel_notices = app
        .notifier
        .sent()
        .into_iter()
        .filter(|(_, n)| matches!(n, Notification::RideCancelled { .. }))
        .count();
    assert_eq!(cancel_notices, 4);

    // the cancelled rides are gone from search and closed to new requests
    assert!(app.search.search(None, &query(&draft())).await.unwrap().is_empty());
    let newcomer = Caller::user(seed_account(&app.store, "late@example.com").await.id);
    assert!(matches!(
        app.reservations.request(&newcomer, ride_ids[0]).await,
        Err(ServiceError::InvalidTransition(_))
    ));
}
