//! Envelope Repository
//!
//! SQL for `envelopes` and `envelope_claims`. Stock is only ever changed by
//! conditional writes whose affected-row count is the success signal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use super::model::{Envelope, EnvelopeClaim, NewClaim, NewEnvelope};

const ENVELOPE_COLUMNS: &str = r#"
    id, envelope_no, envelope_type, user_id, username, account_no, blessing,
    amount, amount_one, quantity, remain_amount, remain_quantity, expired_at,
    status, order_type, pay_status, origin_envelope_no, created_at, updated_at
"#;

const CLAIM_COLUMNS: &str = r#"
    id, claim_no, envelope_no, recv_user_id, recv_username, account_no,
    amount, quantity, remain_amount, pay_status, description, created_at
"#;

pub async fn insert_envelope(
    conn: &mut PgConnection,
    envelope: &NewEnvelope,
) -> Result<Envelope, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO envelopes (
            envelope_no, envelope_type, user_id, username, account_no, blessing,
            amount, amount_one, quantity, remain_amount, remain_quantity,
            expired_at, status, order_type, pay_status, origin_envelope_no
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $7, $9, $10, $11, $12, $13, $14)
        RETURNING {ENVELOPE_COLUMNS}
        "#
    );

    sqlx::query_as::<_, Envelope>(&sql)
        .bind(&envelope.envelope_no)
        .bind(envelope.envelope_type.code())
        .bind(&envelope.user_id)
        .bind(&envelope.username)
        .bind(&envelope.account_no)
        .bind(&envelope.blessing)
        .bind(envelope.amount)
        .bind(envelope.amount_one)
        .bind(envelope.quantity)
        .bind(envelope.expired_at)
        .bind(envelope.status.as_str())
        .bind(envelope.order_type.as_str())
        .bind(envelope.pay_status.as_str())
        .bind(&envelope.origin_envelope_no)
        .fetch_one(&mut *conn)
        .await
}

pub async fn find_by_no(
    conn: &mut PgConnection,
    envelope_no: &str,
) -> Result<Option<Envelope>, sqlx::Error> {
    let sql = format!("SELECT {ENVELOPE_COLUMNS} FROM envelopes WHERE envelope_no = $1");

    sqlx::query_as::<_, Envelope>(&sql)
        .bind(envelope_no)
        .fetch_optional(&mut *conn)
        .await
}

/// Take one share out of a pool.
///
/// Applies only if the stored row still has the remaining quantity the share
/// was computed from, enough remaining amount, a non-terminal status and an
/// unexpired deadline. The first claim moves the pool to `sending`.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    envelope_no: &str,
    amount: Decimal,
    expected_quantity: i32,
) -> Result<u64, sqlx::Error> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE envelopes
        SET remain_amount = remain_amount - $1,
            remain_quantity = remain_quantity - 1,
            status = CASE WHEN status = 'created' THEN 'sending' ELSE status END,
            updated_at = NOW()
        WHERE envelope_no = $2
          AND remain_quantity > 0
          AND remain_quantity = $3
          AND remain_amount >= $1
          AND status IN ('created', 'sending')
          AND expired_at > NOW()
        "#,
    )
    .bind(amount)
    .bind(envelope_no)
    .bind(expected_quantity)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(rows_affected)
}

/// Move an expired sending pool to `expired`/`refunded`.
///
/// Zero rows means another worker already handled it or the stock moved.
pub async fn mark_refunded(
    conn: &mut PgConnection,
    envelope_no: &str,
    expected_quantity: i32,
) -> Result<u64, sqlx::Error> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE envelopes
        SET status = 'expired',
            pay_status = 'refunded',
            updated_at = NOW()
        WHERE envelope_no = $1
          AND order_type = 'sending'
          AND status IN ('created', 'sending')
          AND remain_quantity = $2
          AND expired_at < NOW()
        "#,
    )
    .bind(envelope_no)
    .bind(expected_quantity)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(rows_affected)
}

/// One page of expired pools with unclaimed stock, ordered by `(expired_at, id)`.
///
/// `after` is the keyset cursor of the previous page.
pub async fn find_expired_page(
    conn: &mut PgConnection,
    after: Option<(DateTime<Utc>, i64)>,
    limit: i64,
) -> Result<Vec<Envelope>, sqlx::Error> {
    let (after_expired_at, after_id) = match after {
        Some((expired_at, id)) => (Some(expired_at), Some(id)),
        None => (None, None),
    };

    let sql = format!(
        r#"
        SELECT {ENVELOPE_COLUMNS}
        FROM envelopes
        WHERE remain_quantity > 0
          AND expired_at < NOW()
          AND order_type = 'sending'
          AND status IN ('created', 'sending')
          AND ($1::timestamptz IS NULL OR (expired_at, id) > ($1::timestamptz, $2::bigint))
        ORDER BY expired_at, id
        LIMIT $3
        "#
    );

    sqlx::query_as::<_, Envelope>(&sql)
        .bind(after_expired_at)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
}

pub async fn insert_claim(
    conn: &mut PgConnection,
    claim: &NewClaim,
) -> Result<EnvelopeClaim, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO envelope_claims (
            claim_no, envelope_no, recv_user_id, recv_username, account_no,
            amount, quantity, remain_amount, pay_status, description
        )
        VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $8, $9)
        RETURNING {CLAIM_COLUMNS}
        "#
    );

    sqlx::query_as::<_, EnvelopeClaim>(&sql)
        .bind(&claim.claim_no)
        .bind(&claim.envelope_no)
        .bind(&claim.recv_user_id)
        .bind(&claim.recv_username)
        .bind(&claim.account_no)
        .bind(claim.amount)
        .bind(claim.remain_amount)
        .bind(claim.pay_status.as_str())
        .bind(&claim.description)
        .fetch_one(&mut *conn)
        .await
}

/// Claims of one pool in claim order
pub async fn claims_for(
    conn: &mut PgConnection,
    envelope_no: &str,
) -> Result<Vec<EnvelopeClaim>, sqlx::Error> {
    let sql = format!("SELECT {CLAIM_COLUMNS} FROM envelope_claims WHERE envelope_no = $1 ORDER BY id");

    sqlx::query_as::<_, EnvelopeClaim>(&sql)
        .bind(envelope_no)
        .fetch_all(&mut *conn)
        .await
}

/// Pools a user sent, newest first
pub async fn list_by_owner(
    conn: &mut PgConnection,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Envelope>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {ENVELOPE_COLUMNS}
        FROM envelopes
        WHERE user_id = $1 AND order_type = 'sending'
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#
    );

    sqlx::query_as::<_, Envelope>(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
}

/// Claims a user made, newest first
pub async fn claims_by_receiver(
    conn: &mut PgConnection,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<EnvelopeClaim>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {CLAIM_COLUMNS}
        FROM envelope_claims
        WHERE recv_user_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#
    );

    sqlx::query_as::<_, EnvelopeClaim>(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
}

/// Open pools that still have stock, newest first
pub async fn list_receivable(
    conn: &mut PgConnection,
    limit: i64,
    offset: i64,
) -> Result<Vec<Envelope>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {ENVELOPE_COLUMNS}
        FROM envelopes
        WHERE remain_quantity > 0
          AND expired_at > NOW()
          AND order_type = 'sending'
          AND status IN ('created', 'sending')
        ORDER BY created_at DESC, id DESC
        LIMIT $1 OFFSET $2
        "#
    );

    sqlx::query_as::<_, Envelope>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
}
