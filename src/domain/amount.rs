//! Money primitives
//!
//! Amounts are validated at construction time, so an `Amount` that exists
//! is always a positive value representable in whole minor currency units.
//! Direction of a ledger movement is carried by `TransferAmount`, never by a
//! separate sign flag.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::types::ChangeFlag;

/// Maximum allowed amount (1 trillion)
const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Number of fractional digits of the minor currency unit (cents)
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Amount represents a validated monetary value.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - At most 2 decimal places (whole minor units)
/// - Maximum value is 1 trillion
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use lucky_envelope::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(188, 2)).unwrap();
/// assert_eq!(amount.to_minor_units(), 188);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(Decimal);

/// Errors that can occur when creating an Amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount has too many decimal places (max {MINOR_UNIT_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// Trailing zeros are ignored when checking the scale, so `1.880000`
    /// read back from a NUMERIC(30,6) column is accepted.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        let normalized = value.normalize();
        if normalized.scale() > MINOR_UNIT_SCALE {
            return Err(AmountError::TooManyDecimals(normalized.scale()));
        }

        if value > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }

        let mut value = normalized;
        value.rescale(MINOR_UNIT_SCALE);
        Ok(Self(value))
    }

    /// Build an amount from integer minor units (cents).
    pub fn from_minor_units(units: i64) -> Result<Self, AmountError> {
        Self::new(Decimal::new(units, MINOR_UNIT_SCALE))
    }

    /// Exact integer minor units. Never goes through binary floating point.
    pub fn to_minor_units(&self) -> i64 {
        // scale is pinned to MINOR_UNIT_SCALE by `new`, so the mantissa is the cent count
        self.0.mantissa() as i64
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Multiply by a share count, e.g. per-share amount times quantity.
    pub fn checked_mul(&self, quantity: u32) -> Result<Amount, AmountError> {
        let total = self
            .0
            .checked_mul(Decimal::from(quantity))
            .ok_or(AmountError::Overflow)?;
        Amount::new(total)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal =
            Decimal::from_str(s.trim()).map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Amount::from_str(&value)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

/// Balance represents an account balance (can be zero or positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Balance(Decimal);

impl Balance {
    /// Create a new balance (zero or positive)
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }
        if value > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }
        Ok(Self(value))
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying value
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

/// A directional amount for a single-leg ledger movement.
///
/// `Debit` takes money out of the acting account, `Credit` puts money in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", content = "amount", rename_all = "snake_case")]
pub enum TransferAmount {
    Credit(Amount),
    Debit(Amount),
}

impl TransferAmount {
    /// Signed balance delta (outgoing is negative)
    pub fn delta(&self) -> Decimal {
        match self {
            TransferAmount::Credit(a) => a.value(),
            TransferAmount::Debit(a) => -a.value(),
        }
    }

    /// Change flag persisted on the audit entry
    pub fn flag(&self) -> ChangeFlag {
        match self {
            TransferAmount::Credit(_) => ChangeFlag::TransferIn,
            TransferAmount::Debit(_) => ChangeFlag::TransferOut,
        }
    }

    pub fn is_debit(&self) -> bool {
        matches!(self, TransferAmount::Debit(_))
    }
}

impl fmt::Display for TransferAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferAmount::Credit(a) => write!(f, "+{}", a),
            TransferAmount::Debit(a) => write!(f, "-{}", a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(dec!(100));
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), dec!(100.00));
    }

    #[test]
    fn test_amount_zero_rejected() {
        let amount = Amount::new(Decimal::ZERO);
        assert!(matches!(amount, Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_negative_rejected() {
        let amount = Amount::new(dec!(-1.88));
        assert!(matches!(amount, Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_sub_cent_rejected() {
        let amount = Amount::new(dec!(0.001));
        assert!(matches!(amount, Err(AmountError::TooManyDecimals(3))));
    }

    #[test]
    fn test_amount_db_scale_accepted() {
        // NUMERIC(30,6) round-trips with trailing zeros
        let amount = Amount::new(dec!(1.880000)).unwrap();
        assert_eq!(amount.to_minor_units(), 188);
        assert_eq!(amount.to_string(), "1.88");
    }

    #[test]
    fn test_amount_overflow() {
        let amount = Amount::new(dec!(1000000000000.01));
        assert!(matches!(amount, Err(AmountError::Overflow)));
        assert!(Amount::new(dec!(1000000000000)).is_ok());
    }

    #[test]
    fn test_minor_units_exact() {
        let amount: Amount = "88.80".parse().unwrap();
        assert_eq!(amount.to_minor_units(), 8880);
        assert_eq!(Amount::from_minor_units(8880).unwrap(), amount);
        assert_eq!(Amount::from_minor_units(1).unwrap().value(), dec!(0.01));
        assert!(Amount::from_minor_units(0).is_err());
    }

    #[test]
    fn test_minor_units_large_value() {
        let amount = Amount::new(dec!(999999999999.99)).unwrap();
        assert_eq!(amount.to_minor_units(), 99_999_999_999_999);
    }

    #[test]
    fn test_checked_mul() {
        let per_share: Amount = "1.88".parse().unwrap();
        let total = per_share.checked_mul(10).unwrap();
        assert_eq!(total.value(), dec!(18.80));
    }

    #[test]
    fn test_transfer_amount_direction() {
        let amount: Amount = "100.00".parse().unwrap();

        let debit = TransferAmount::Debit(amount);
        assert_eq!(debit.delta(), dec!(-100.00));
        assert_eq!(debit.flag(), ChangeFlag::TransferOut);
        assert!(debit.is_debit());

        let credit = TransferAmount::Credit(amount);
        assert_eq!(credit.delta(), dec!(100.00));
        assert_eq!(credit.flag(), ChangeFlag::TransferIn);
        assert_eq!(credit.to_string(), "+100.00");
    }

    #[test]
    fn test_balance_rules() {
        assert!(Balance::new(Decimal::ZERO).is_ok());
        assert!(Balance::new(dec!(-0.01)).is_err());
        assert_eq!(Balance::default().value(), Decimal::ZERO);
    }
}
