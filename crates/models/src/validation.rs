//! Field-level validation.
//!
//! Validators collect every problem instead of stopping at the first, so a
//! caller can report all offending fields at once.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

/// `field: message; field: message` for logs and error displays.
pub fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Turn a list of collected errors into a `Result`.
pub fn into_result(errors: Vec<FieldError>) -> Result<(), Vec<FieldError>> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

pub(crate) fn require_text(errors: &mut Vec<FieldError>, field: &'static str, value: &str, max_len: usize) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(FieldError::new(field, "required"));
    } else if trimmed.chars().count() > max_len {
        errors.push(FieldError::new(field, format!("must be at most {max_len} characters")));
    }
}

pub fn check_email(errors: &mut Vec<FieldError>, field: &'static str, email: &str) {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') => {
            if email.len() > 255 {
                errors.push(FieldError::new(field, "must be at most 255 characters"));
            }
        }
        _ => errors.push(FieldError::new(field, "invalid email")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_checks() {
        let mut errs = Vec::new();
        check_email(&mut errs, "email", "rider@example.com");
        assert!(errs.is_empty());
        check_email(&mut errs, "email", "rider@example");
        check_email(&mut errs, "email", "@example.com");
        check_email(&mut errs, "email", "nope");
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn summarize_joins_fields() {
        let s = summarize(&[FieldError::new("a", "required"), FieldError::new("b", "too long")]);
        assert_eq!(s, "a: required; b: too long");
    }
}
