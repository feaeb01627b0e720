//! Envelope records

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::db::decode_error;
use crate::domain::{new_business_no, EnvelopeStatus, EnvelopeType, OrderType, PayStatus};
use crate::transfer::TradeParticipant;

/// A divisible pool of money
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub id: i64,
    pub envelope_no: String,
    pub envelope_type: EnvelopeType,
    pub user_id: String,
    pub username: String,
    /// Owner's envelope account, debited on send and credited on refund
    pub account_no: String,
    pub blessing: String,
    pub amount: Decimal,
    /// Per-share amount of General pools, zero for Lucky pools
    pub amount_one: Decimal,
    pub quantity: i32,
    pub remain_amount: Decimal,
    pub remain_quantity: i32,
    pub expired_at: DateTime<Utc>,
    pub status: EnvelopeStatus,
    pub order_type: OrderType,
    pub pay_status: PayStatus,
    pub origin_envelope_no: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Envelope {
    pub fn has_stock(&self) -> bool {
        self.remain_quantity > 0 && self.remain_amount > Decimal::ZERO
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expired_at <= now
    }

    pub fn owner(&self) -> TradeParticipant {
        TradeParticipant::new(&self.account_no, &self.user_id, &self.username)
    }
}

fn parse_column<T: std::str::FromStr>(row: &PgRow, column: &str) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|_| decode_error(column, raw))
}

impl<'r> FromRow<'r, PgRow> for Envelope {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let envelope_type: i16 = row.try_get("envelope_type")?;

        Ok(Self {
            id: row.try_get("id")?,
            envelope_no: row.try_get("envelope_no")?,
            envelope_type: EnvelopeType::from_code(envelope_type)
                .ok_or_else(|| decode_error("envelope_type", envelope_type))?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            account_no: row.try_get("account_no")?,
            blessing: row.try_get("blessing")?,
            amount: row.try_get("amount")?,
            amount_one: row.try_get("amount_one")?,
            quantity: row.try_get("quantity")?,
            remain_amount: row.try_get("remain_amount")?,
            remain_quantity: row.try_get("remain_quantity")?,
            expired_at: row.try_get("expired_at")?,
            status: parse_column(row, "status")?,
            order_type: parse_column(row, "order_type")?,
            pay_status: parse_column(row, "pay_status")?,
            origin_envelope_no: row.try_get("origin_envelope_no")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Values for a new pool row
#[derive(Debug, Clone)]
pub struct NewEnvelope {
    pub envelope_no: String,
    pub envelope_type: EnvelopeType,
    pub user_id: String,
    pub username: String,
    pub account_no: String,
    pub blessing: String,
    pub amount: Decimal,
    pub amount_one: Decimal,
    pub quantity: i32,
    pub expired_at: DateTime<Utc>,
    pub status: EnvelopeStatus,
    pub order_type: OrderType,
    pub pay_status: PayStatus,
    pub origin_envelope_no: Option<String>,
}

impl NewEnvelope {
    /// Refund pool carrying the unclaimed stock of an expired pool
    pub fn refund_of(origin: &Envelope, ttl: Duration) -> Self {
        Self {
            envelope_no: new_business_no(),
            envelope_type: origin.envelope_type,
            user_id: origin.user_id.clone(),
            username: origin.username.clone(),
            account_no: origin.account_no.clone(),
            blessing: origin.blessing.clone(),
            amount: origin.remain_amount,
            amount_one: origin.amount_one,
            quantity: origin.remain_quantity,
            expired_at: Utc::now() + ttl,
            status: EnvelopeStatus::Expired,
            order_type: OrderType::Refund,
            pay_status: PayStatus::Refunded,
            origin_envelope_no: Some(origin.envelope_no.clone()),
        }
    }
}

/// One successful claim against a pool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeClaim {
    pub id: i64,
    pub claim_no: String,
    pub envelope_no: String,
    pub recv_user_id: String,
    pub recv_username: String,
    pub account_no: String,
    pub amount: Decimal,
    pub quantity: i32,
    /// Pool remainder right after this claim
    pub remain_amount: Decimal,
    pub pay_status: PayStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for EnvelopeClaim {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            claim_no: row.try_get("claim_no")?,
            envelope_no: row.try_get("envelope_no")?,
            recv_user_id: row.try_get("recv_user_id")?,
            recv_username: row.try_get("recv_username")?,
            account_no: row.try_get("account_no")?,
            amount: row.try_get("amount")?,
            quantity: row.try_get("quantity")?,
            remain_amount: row.try_get("remain_amount")?,
            pay_status: parse_column(row, "pay_status")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewClaim {
    pub claim_no: String,
    pub envelope_no: String,
    pub recv_user_id: String,
    pub recv_username: String,
    pub account_no: String,
    pub amount: Decimal,
    pub remain_amount: Decimal,
    pub pay_status: PayStatus,
    pub description: String,
}

/// Claim as shown in a pool's claim list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimView {
    #[serde(flatten)]
    pub claim: EnvelopeClaim,
    pub is_luckiest: bool,
}

/// Flag the largest claim of an exhausted Lucky pool; ties go to the earliest.
pub fn flag_luckiest(envelope: &Envelope, claims: Vec<EnvelopeClaim>) -> Vec<ClaimView> {
    let luckiest = if envelope.envelope_type == EnvelopeType::Lucky && envelope.remain_quantity == 0
    {
        claims
            .iter()
            .enumerate()
            .fold(None::<(usize, Decimal)>, |best, (i, c)| match best {
                Some((_, amount)) if amount >= c.amount => best,
                _ => Some((i, c.amount)),
            })
            .map(|(i, _)| i)
    } else {
        None
    };

    claims
        .into_iter()
        .enumerate()
        .map(|(i, claim)| ClaimView {
            claim,
            is_luckiest: Some(i) == luckiest,
        })
        .collect()
}

/// A freshly sent pool plus its shareable link
#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeActivity {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub link: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn envelope(envelope_type: EnvelopeType, remain_quantity: i32) -> Envelope {
        let now = Utc::now();
        Envelope {
            id: 1,
            envelope_no: new_business_no(),
            envelope_type,
            user_id: "u-owner".to_string(),
            username: "owner".to_string(),
            account_no: "A-owner".to_string(),
            blessing: "blessing".to_string(),
            amount: Decimal::new(1000, 2),
            amount_one: Decimal::ZERO,
            quantity: 3,
            remain_amount: Decimal::new(100 * remain_quantity as i64, 2),
            remain_quantity,
            expired_at: now + Duration::hours(24),
            status: EnvelopeStatus::Sending,
            order_type: OrderType::Sending,
            pay_status: PayStatus::Paid,
            origin_envelope_no: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn claim(id: i64, amount: Decimal) -> EnvelopeClaim {
        EnvelopeClaim {
            id,
            claim_no: new_business_no(),
            envelope_no: "E".to_string(),
            recv_user_id: format!("u-{}", id),
            recv_username: format!("user{}", id),
            account_no: format!("A-{}", id),
            amount,
            quantity: 1,
            remain_amount: Decimal::ZERO,
            pay_status: PayStatus::Paid,
            description: String::new(),
            created_at: Utc::now(),
        }
    }
}
