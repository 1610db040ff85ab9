use once_cell::sync::Lazy;
use prometheus::{register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder};

// Prometheus metrics (default registry)
pub static RESERVATIONS_REQUESTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("rideshare_reservations_requested_total", "Seat requests created")
        .expect("register reservations_requested_total")
});

pub static SEATS_APPROVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("rideshare_seats_approved_total", "Reservations approved by drivers")
        .expect("register seats_approved_total")
});

pub static CAPACITY_REJECTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("rideshare_capacity_rejected_total", "Approvals rejected because the ride was full")
        .expect("register capacity_rejected_total")
});

pub static RIDES_CANCELLED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("rideshare_rides_cancelled_total", "Rides moved to cancelled")
        .expect("register rides_cancelled_total")
});

pub static ACCOUNTS_ERASED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("rideshare_accounts_erased_total", "Accounts erased").expect("register accounts_erased_total")
});

pub static ERASURE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "rideshare_erasure_duration_seconds",
        "Wall time of the account erasure transaction",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("register erasure_duration")
});

pub static ROUTE_CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("rideshare_route_cache_hits_total", "Routes reused from nearby stored rides")
        .expect("register route_cache_hits_total")
});

pub static ROUTE_ESTIMATES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("rideshare_route_estimates_total", "Routes replaced by a great-circle estimate")
        .expect("register route_estimates_total")
});

pub static DIRECTIONS_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("rideshare_directions_requests_total", "Calls made to the directions provider")
        .expect("register directions_requests_total")
});

pub static DIRECTIONS_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("rideshare_directions_errors_total", "Failed directions provider calls")
        .expect("register directions_errors_total")
});

pub static NOTIFICATIONS_FAILED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("rideshare_notifications_failed_total", "Notifications that could not be delivered")
        .expect("register notifications_failed_total")
});

/// Render the default registry in the Prometheus text format.
pub fn encode_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).map_err(|e| format!("metrics encode error: {e}"))?;
    String::from_utf8(buffer).map_err(|e| format!("metrics encode error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touched_counters_are_exported() {
        SEATS_APPROVED_TOTAL.inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("rideshare_seats_approved_total"));
    }
}
