//! Persistence entities for the ride marketplace.
//!
//! Each entity module holds the SeaORM model, its relations, and the
//! field validation that runs before any write.

pub mod errors;
pub mod db;
pub mod validation;
pub mod user;
pub mod ride;
pub mod reservation;
