//! Best-effort notifications. Delivery never decides the outcome of the
//! operation that triggered it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::metrics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    SeatRequested { ride_id: i32, reservation_id: i32, passenger_id: i32 },
    SeatApproved { ride_id: i32, reservation_id: i32 },
    SeatRefused { ride_id: i32, reservation_id: i32 },
    ReservationWithdrawn { ride_id: i32, reservation_id: i32, passenger_id: i32 },
    RideCancelled { ride_id: i32 },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::SeatRequested { .. } => "seat_requested",
            Notification::SeatApproved { .. } => "seat_approved",
            Notification::SeatRefused { .. } => "seat_refused",
            Notification::ReservationWithdrawn { .. } => "reservation_withdrawn",
            Notification::RideCancelled { .. } => "ride_cancelled",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient_id: i32, notification: &Notification) -> Result<(), ServiceError>;
}

/// Writes notifications to the log; used where no mail transport is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, recipient_id: i32, notification: &Notification) -> Result<(), ServiceError> {
        info!(recipient_id, kind = notification.kind(), ?notification, "notification");
        Ok(())
    }
}

/// Send and swallow failures.
pub async fn deliver(notifier: &dyn Notifier, recipient_id: i32, notification: Notification) {
    if let Err(e) = notifier.notify(recipient_id, &notification).await {
        metrics::NOTIFICATIONS_FAILED_TOTAL.inc();
        warn!(recipient_id, kind = notification.kind(), error = %e, "notification dropped");
    }
}

pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every notification it is asked to send; can be told to fail.
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<(i32, Notification)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self { Self { sent: Mutex::new(Vec::new()), fail: true } }

        pub fn sent(&self) -> Vec<(i32, Notification)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, recipient_id: i32, notification: &Notification) -> Result<(), ServiceError> {
            self.sent.lock().unwrap().push((recipient_id, notification.clone()));
            if self.fail {
                return Err(ServiceError::TransientDependency("mail relay unreachable".into()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingNotifier;
    use super::*;

    #[tokio::test]
    async fn failures_are_swallowed() {
        let n = RecordingNotifier::failing();
        deliver(&n, 3, Notification::RideCancelled { ride_id: 1 }).await;
        assert_eq!(n.sent(), vec![(3, Notification::RideCancelled { ride_id: 1 })]);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(Notification::SeatApproved { ride_id: 4, reservation_id: 9 }).unwrap();
        assert_eq!(json["kind"], "seat_approved");
        assert_eq!(json["reservation_id"], 9);
    }
}
