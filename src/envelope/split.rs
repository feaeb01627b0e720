//! Split policy
//!
//! Decides the size of the next share of a pool. All arithmetic happens in
//! integer minor units; decimals are converted exactly at the edges.

use rand::Rng;
use rust_decimal::Decimal;

use crate::domain::{DomainError, EnvelopeType, MINOR_UNIT_SCALE};

/// Remaining stock of a pool, in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stock {
    pub remain_units: i64,
    pub remain_quantity: i64,
}

impl Stock {
    pub fn is_empty(&self) -> bool {
        self.remain_units <= 0 || self.remain_quantity <= 0
    }

    /// Every remaining share can still get at least one minor unit
    pub fn is_feasible(&self) -> bool {
        self.remain_units >= self.remain_quantity
    }
}

/// Size of the next share in minor units, or `None` when the pool is empty.
///
/// - the last share takes the exact remainder
/// - General pools grant the fixed per-share amount
/// - Lucky pools grant a uniform draw in `[1, 2 * average]`, further capped
///   so that each later share keeps at least one minor unit
pub fn next_share<R: Rng>(
    envelope_type: EnvelopeType,
    per_share_units: i64,
    stock: Stock,
    rng: &mut R,
) -> Option<i64> {
    if stock.is_empty() {
        return None;
    }

    if stock.remain_quantity == 1 {
        return Some(stock.remain_units);
    }

    match envelope_type {
        EnvelopeType::General => Some(per_share_units),
        EnvelopeType::Lucky => {
            let average = stock.remain_units / stock.remain_quantity;
            let reserve = stock.remain_quantity - 1;
            let upper = (2 * average).min(stock.remain_units - reserve).max(1);
            Some(rng.gen_range(1..=upper))
        }
    }
}

/// Exact minor units of a stored decimal (e.g. `18.800000` -> 1880)
pub fn to_minor_units(value: Decimal) -> Result<i64, DomainError> {
    let mut normalized = value.normalize();
    if normalized.scale() > MINOR_UNIT_SCALE || normalized.is_sign_negative() {
        return Err(DomainError::invariant(format!(
            "{} is not a whole number of minor units",
            value
        )));
    }
    normalized.rescale(MINOR_UNIT_SCALE);
    i64::try_from(normalized.mantissa())
        .map_err(|_| DomainError::invariant(format!("{} overflows minor units", value)))
}

pub fn from_minor_units(units: i64) -> Decimal {
    Decimal::new(units, MINOR_UNIT_SCALE)
}
