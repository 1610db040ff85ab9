//! Ride lifecycle and seat-reservation engine.
//! - Services take an already-authenticated `Caller` and run each mutation
//!   in one store transaction.
//! - Persistence is behind `store::RideStore`; `store::MemoryStore` backs
//!   tests, `store::SeaOrmStore` backs production.
//! - Notifications and session revocation happen after commit and never
//!   fail the operation.

pub mod errors;
pub mod domain;
pub mod store;
pub mod pricing;
pub mod directions;
pub mod route_cache;
pub mod seat_ledger;
pub mod reservation;
pub mod ride_lifecycle;
pub mod erasure;
pub mod search;
pub mod views;
pub mod accounts;
pub mod notify;
pub mod session;
pub mod metrics;
#[cfg(test)]
pub mod test_support;
#[cfg(test)]
mod tests;

pub use errors::ServiceError;
