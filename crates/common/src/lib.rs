//! Leaf utilities shared by every crate in the workspace: geographic
//! primitives, great-circle math and logging bootstrap.

use thiserror::Error;

pub mod types;
pub mod utils;

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("latitude out of range: {0}")]
    Latitude(f64),
    #[error("longitude out of range: {0}")]
    Longitude(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_rejects_out_of_range_latitude() {
        let err = types::GeoPoint::new(2.35, 91.0).unwrap_err();
        assert_eq!(err, CoreError::Latitude(91.0));
    }
}
