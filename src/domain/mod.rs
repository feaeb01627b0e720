//! Domain module
//!
//! Core domain types shared by the ledger and the envelope engine.

pub mod amount;
pub mod error;
pub mod types;
pub mod validation;

pub use amount::{Amount, AmountError, Balance, TransferAmount, MINOR_UNIT_SCALE};
pub use error::DomainError;
pub use types::{
    AccountStatus, AccountType, ChangeFlag, ChangeType, EnvelopeStatus, EnvelopeType, OrderType,
    PayStatus,
};
pub use validation::{Validate, ValidationError};

/// Generate a globally unique business identifier (account no, envelope no, ...)
pub fn new_business_no() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
