//! Input validation
//!
//! Inbound DTOs declare their constraints by implementing `Validate`.
//! Validation runs before any domain logic and never touches storage.

use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use super::amount::{Amount, AmountError, MINOR_UNIT_SCALE};

/// A rejected input field with a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Declared constraints of an input DTO
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Field must be present and not blank
pub fn required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(())
}

/// Field must not exceed `max` characters
pub fn max_len(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max),
        ));
    }
    Ok(())
}

/// Parse a positive money amount given as a string
pub fn amount(field: &str, value: &str) -> Result<Amount, ValidationError> {
    required(field, value)?;
    value.parse::<Amount>().map_err(|e| amount_error(field, e))
}

/// Parse a zero-or-positive money amount given as a string
pub fn opening_balance(field: &str, value: &str) -> Result<Decimal, ValidationError> {
    if value.trim().is_empty() {
        return Ok(Decimal::ZERO);
    }
    let parsed = Decimal::from_str(value.trim())
        .map_err(|e| ValidationError::new(field, format!("is not a decimal number: {}", e)))?;
    if parsed.is_zero() {
        return Ok(Decimal::ZERO);
    }
    Amount::new(parsed)
        .map(|a| a.value())
        .map_err(|e| amount_error(field, e))
}

/// Integer field must fall within `[min, max]`
pub fn range(field: &str, value: i64, min: i64, max: i64) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::new(
            field,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn amount_error(field: &str, e: AmountError) -> ValidationError {
    let message = match e {
        AmountError::NotPositive(_) => "must be greater than zero".to_string(),
        AmountError::TooManyDecimals(_) => {
            format!("must have at most {} decimal places", MINOR_UNIT_SCALE)
        }
        AmountError::Overflow => "exceeds the maximum allowed amount".to_string(),
        AmountError::ParseError(msg) => format!("is not a decimal number: {}", msg),
    };
    ValidationError::new(field, message)
}
