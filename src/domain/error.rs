//! Domain Error Types
//!
//! Pure domain errors that don't depend on the web layer.

use thiserror::Error;

use super::validation::ValidationError;

/// Errors of the ledger, transfer and envelope components.
///
/// `InsufficientFunds`, `Depleted` and `DuplicateAccount` are expected
/// business outcomes, not faults; callers must not blindly retry them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Input rejected before any mutation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Debit rejected by the conditional balance write
    #[error("Insufficient funds in account {account_no}")]
    InsufficientFunds { account_no: String },

    /// Pool exhausted, or the claim lost the race for the last share
    #[error("Envelope {envelope_no} has no shares left")]
    Depleted { envelope_no: String },

    /// Second account of the same type for a user
    #[error("Account of type {account_type} already exists for user {user_id}")]
    DuplicateAccount { user_id: String, account_type: String },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Envelope not found: {0}")]
    EnvelopeNotFound(String),

    /// Pool past its expiry or in a terminal status
    #[error("Envelope {0} has expired")]
    EnvelopeExpired(String),

    /// Storage or transport fault
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// State that should never exist, e.g. a referenced account is missing
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn insufficient_funds(account_no: impl Into<String>) -> Self {
        Self::InsufficientFunds {
            account_no: account_no.into(),
        }
    }

    pub fn depleted(envelope_no: impl Into<String>) -> Self {
        Self::Depleted {
            envelope_no: envelope_no.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "Invariant violation");
        Self::InvariantViolation(message)
    }

    /// Expected business outcome (user's fault or lost race)
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InsufficientFunds { .. }
                | Self::Depleted { .. }
                | Self::DuplicateAccount { .. }
                | Self::AccountNotFound(_)
                | Self::EnvelopeNotFound(_)
                | Self::EnvelopeExpired(_)
        )
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = ?e, "Persistence error");
        Self::Persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_outcomes() {
        let err = DomainError::insufficient_funds("A1");
        assert!(err.is_business_outcome());
        assert!(err.to_string().contains("A1"));

        let err = DomainError::depleted("E1");
        assert!(err.is_business_outcome());
        assert_eq!(err.to_string(), "Envelope E1 has no shares left");
    }

    #[test]
    fn test_internal_errors() {
        let err = DomainError::from(sqlx::Error::RowNotFound);
        assert!(!err.is_business_outcome());
        assert!(matches!(err, DomainError::Persistence(_)));

        let err = DomainError::invariant("account vanished");
        assert!(!err.is_business_outcome());
    }

    #[test]
    fn test_validation_wraps_transparently() {
        let err: DomainError = ValidationError::new("quantity", "must be at least 1").into();
        assert_eq!(err.to_string(), "quantity: must be at least 1");
    }
}
