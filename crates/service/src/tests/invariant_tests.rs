use std::collections::HashMap;
use std::sync::Arc;

use configs::ErasureConfig;
use proptest::prelude::*;

use crate::directions::mock::StaticDirections;
use crate::domain::{Caller, ReservationStatus, RideDraft};
use crate::erasure::ErasureService;
use crate::notify::TracingNotifier;
use crate::reservation::ReservationService;
use crate::ride_lifecycle::RideService;
use crate::route_cache::RouteLookup;
use crate::session::LoggingRevoker;
use crate::store::{MemoryStore, RideStore};
use crate::test_support::{draft, seed_account, seed_ride};

const PASSENGERS: usize = 5;

#[derive(Debug, Clone)]
enum Op {
    Request(usize),
    Approve(usize),
    Refuse(usize),
    Withdraw(usize),
    Erase(usize),
    CancelRide,
}

fn op() -> impl Strategy<Value = Op> {
    let p = 0..PASSENGERS;
    prop_oneof![
        4 => p.clone().prop_map(Op::Request),
        4 => p.clone().prop_map(Op::Approve),
        1 => p.clone().prop_map(Op::Refuse),
        2 => p.clone().prop_map(Op::Withdraw),
        1 => p.prop_map(Op::Erase),
        1 => Just(Op::CancelRide),
    ]
}

async fn run(max_seats: i32, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let store = Arc::new(MemoryStore::new());
    // Pre-seeding the sentinel keeps password hashing out of the loop.
    seed_account(&store, &ErasureConfig::default().sentinel_email).await;
    let driver = Caller::user(seed_account(&store, "driver@example.com").await.id);
    let mut passengers = Vec::new();
    for i in 0..PASSENGERS {
        passengers.push(Caller::user(seed_account(&store, &format!("p{i}@example.com")).await.id));
    }
    let ride = seed_ride(&store, driver.user_id, &RideDraft { max_seats, ..draft() }).await;

    let notifier = Arc::new(TracingNotifier);
    let reservations = ReservationService::new(store.clone(), notifier.clone());
    let routes = RouteLookup::new(store.clone(), Arc::new(StaticDirections::failing()), 500.0);
    let rides = RideService::new(store.clone(), routes, notifier.clone());
    let erasure = ErasureService::new(store.clone(), ErasureConfig::default(), Arc::new(LoggingRevoker), notifier);

    let mut held: HashMap<usize, i32> = HashMap::new();
    for op in ops {
        let result = match op {
            Op::Request(p) => reservations.request(&passengers[p], ride.id).await.map(|r| {
                held.insert(p, r.id);
            }),
            Op::Approve(p) => match held.get(&p) {
                Some(id) => reservations.approve(&driver, *id).await.map(|_| ()),
                None => Ok(()),
            },
            Op::Refuse(p) => match held.get(&p) {
                Some(id) => reservations.refuse(&driver, *id).await.map(|_| ()),
                None => Ok(()),
            },
            Op::Withdraw(p) => match held.get(&p) {
                Some(id) => reservations.withdraw(&passengers[p], *id).await.map(|_| ()),
                None => Ok(()),
            },
            Op::Erase(p) => erasure.erase(&passengers[p], passengers[p].user_id).await.map(|_| ()),
            Op::CancelRide => rides.cancel(&driver, ride.id).await.map(|_| ()),
        };
        if let Err(e) = result {
            prop_assert!(e.is_recoverable(), "unexpected error {e:?}");
        }

        let current = store.ride(ride.id).await.unwrap().unwrap();
        prop_assert!(current.approved_seat_count >= 0);
        prop_assert!(current.approved_seat_count <= current.max_seats);
        if !current.cancelled {
            let approved = store
                .reservations_for_ride(ride.id)
                .await
                .unwrap()
                .into_iter()
                .filter(|r| r.status == ReservationStatus::Approved)
                .count() as i32;
            prop_assert_eq!(current.approved_seat_count, approved);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn seat_count_stays_within_bounds(max_seats in 1i32..=4, ops in prop::collection::vec(op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(run(max_seats, ops))?;
    }
}
