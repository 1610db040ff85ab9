use models::errors::ModelError;
use models::validation::{summarize, FieldError};
use thiserror::Error;

use crate::pricing::PricingError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("ride {ride_id} is full")]
    CapacityExceeded { ride_id: i32 },
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("dependency unavailable: {0}")]
    TransientDependency(String),
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),
    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),
    #[error("hashing error: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Db(String),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

impl ServiceError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id} not found"))
    }

    pub fn invalid_transition(what: impl Into<String>) -> Self { Self::InvalidTransition(what.into()) }

    pub fn unauthorized(what: impl Into<String>) -> Self { Self::Unauthorized(what.into()) }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::CapacityExceeded { .. } => 2001,
            ServiceError::InvalidTransition(_) => 2002,
            ServiceError::Unauthorized(_) => 2003,
            ServiceError::NotFound(_) => 2004,
            ServiceError::Validation(_) => 2005,
            ServiceError::Model(ModelError::Invalid(_)) => 2005,
            ServiceError::TransientDependency(_) => 2101,
            ServiceError::IntegrityViolation(_) => 2201,
            ServiceError::Pricing(_) => 2202,
            ServiceError::Hash(_) => 2203,
            ServiceError::Db(_) | ServiceError::Model(ModelError::Db(_)) => 2300,
        }
    }

    /// Whether the caller may act on the error (show it, retry, fall back)
    /// rather than treat the operation as broken.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ServiceError::CapacityExceeded { .. }
                | ServiceError::InvalidTransition(_)
                | ServiceError::Unauthorized(_)
                | ServiceError::NotFound(_)
                | ServiceError::Validation(_)
                | ServiceError::TransientDependency(_)
                | ServiceError::Model(ModelError::Invalid(_))
        )
    }
}

impl From<Vec<FieldError>> for ServiceError {
    fn from(errors: Vec<FieldError>) -> Self {
        Self::Validation(errors)
    }
}
