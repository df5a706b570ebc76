//! Field-shape validation for request bodies.
//!
//! Every request struct that reaches a service implements [`Validate`]; the
//! `ValidatedJson` extractor runs it before the handler body executes.

use crate::error::AppError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const NAME_MAX_LEN: usize = 50;

/// Request types that check their own field constraints.
pub trait Validate {
    fn validate(&self) -> Result<(), AppError>;

    /// Trim surrounding whitespace from free-text fields.
    ///
    /// Called before `validate`, so length limits apply to the trimmed value.
    fn normalize(&mut self) {}
}

/// Check that a value's character count lies within `min..=max`.
pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

pub fn check_password(value: &str) -> Result<(), AppError> {
    if value.chars().count() < PASSWORD_MIN_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    Ok(())
}

pub fn check_name(field: &str, value: &str) -> Result<(), AppError> {
    check_length(field, value, 1, NAME_MAX_LEN)
}

pub fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}
