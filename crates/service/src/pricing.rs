//! Occupancy-aware fare computation.
//!
//! The base fare is either a flat minimum (short trips) or distance times a
//! per-km rate. The more seats a booking fills, the larger the discount
//! applied to the whole ride, and the discounted total is then split between
//! the passengers expected on board.

use common::utils::geo::haversine_km;
use configs::PricingConfig;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Ride;

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("distance must be a finite value >= 0, got {0}")]
    InvalidDistance(f64),
    #[error("max_seats must be positive, got {0}")]
    NonPositiveSeats(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Undiscounted price of the whole route.
    pub total: Decimal,
    pub total_after_bonus: Decimal,
    pub per_passenger: Decimal,
    /// Discount fraction that was applied, e.g. `0.15`.
    pub bonus: Decimal,
}

#[derive(Debug, Clone)]
pub struct PricingCalculator {
    cfg: PricingConfig,
}

impl PricingCalculator {
    pub fn new(cfg: PricingConfig) -> Self { Self { cfg } }

    /// Price a ride for the next passenger, given the seats already approved.
    ///
    /// # Examples
    /// ```
    /// use service::pricing::PricingCalculator;
    /// use rust_decimal::Decimal;
    /// let calc = PricingCalculator::new(configs::PricingConfig::default());
    /// let q = calc.quote(5.0, 4, 3).unwrap();
    /// assert_eq!(q.total, Decimal::new(250, 2));
    /// assert_eq!(q.total_after_bonus, Decimal::new(213, 2));
    /// assert_eq!(q.per_passenger, Decimal::new(53, 2));
    /// ```
    pub fn quote(&self, distance_km: f64, max_seats: i32, approved_seat_count: i32) -> Result<Quote, PricingError> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(PricingError::InvalidDistance(distance_km));
        }
        if max_seats <= 0 {
            return Err(PricingError::NonPositiveSeats(max_seats));
        }
        let distance = Decimal::from_f64(distance_km).ok_or(PricingError::InvalidDistance(distance_km))?;

        let total = if distance < self.cfg.min_fare_threshold_km {
            self.cfg.min_fare
        } else {
            distance * self.cfg.per_km_rate
        };

        let filled = (approved_seat_count.max(0) + 1).min(max_seats);
        let bonus = occupancy_bonus(filled, max_seats);
        let total_after_bonus = total * (Decimal::ONE - bonus);
        let per_passenger = total_after_bonus / Decimal::from(filled.max(1));

        Ok(Quote {
            total: self.round(total),
            total_after_bonus: self.round(total_after_bonus),
            per_passenger: self.round(per_passenger),
            bonus,
        })
    }

    /// Quote a stored ride, using its route distance or, when it has none,
    /// the great-circle distance between its endpoints.
    pub fn quote_ride(&self, ride: &Ride) -> Result<Quote, PricingError> {
        self.quote(effective_distance_km(ride), ride.max_seats, ride.approved_seat_count)
    }

    fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.cfg.round_to, RoundingStrategy::MidpointAwayFromZero)
    }
}

pub fn effective_distance_km(ride: &Ride) -> f64 {
    ride.route.as_ref().map(|r| r.distance_km).unwrap_or_else(|| haversine_km(ride.departure, ride.arrival))
}

/// Discount for a ride that will carry `filled` of `max_seats` passengers.
pub fn occupancy_bonus(filled: i32, max_seats: i32) -> Decimal {
    if filled >= max_seats {
        Decimal::new(15, 2)
    } else if filled >= 3 {
        Decimal::new(10, 2)
    } else if filled >= 2 {
        Decimal::new(5, 2)
    } else {
        Decimal::ZERO
    }
}
