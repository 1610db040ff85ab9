//! Hook into the authentication layer for dropping a user's sessions.

use async_trait::async_trait;
use tracing::info;

use crate::errors::ServiceError;

#[async_trait]
pub trait SessionRevoker: Send + Sync {
    /// Invalidate every session or token issued to `user_id`.
    async fn revoke_all(&self, user_id: i32) -> Result<(), ServiceError>;
}

/// For deployments where sessions expire on their own.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRevoker;

#[async_trait]
impl SessionRevoker for LoggingRevoker {
    async fn revoke_all(&self, user_id: i32) -> Result<(), ServiceError> {
        info!(user_id, "sessions_revoked");
        Ok(())
    }
}

pub mod mock {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingRevoker {
        revoked: Mutex<Vec<i32>>,
        fail: bool,
    }

    impl RecordingRevoker {
        pub fn failing() -> Self { Self { revoked: Mutex::new(Vec::new()), fail: true } }

        pub fn revoked(&self) -> Vec<i32> { self.revoked.lock().unwrap().clone() }
    }

    #[async_trait]
    impl SessionRevoker for RecordingRevoker {
        async fn revoke_all(&self, user_id: i32) -> Result<(), ServiceError> {
            if self.fail {
                return Err(ServiceError::TransientDependency("session store unreachable".into()));
            }
            self.revoked.lock().unwrap().push(user_id);
            Ok(())
        }
    }
}
