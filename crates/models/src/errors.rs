use thiserror::Error;

use crate::validation::FieldError;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid input: {}", crate::validation::summarize(.0))]
    Invalid(Vec<FieldError>),
    #[error("database error: {0}")]
    Db(String),
}

impl From<Vec<FieldError>> for ModelError {
    fn from(errors: Vec<FieldError>) -> Self {
        Self::Invalid(errors)
    }
}
