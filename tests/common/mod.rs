//! Common test utilities
//!
//! Integration tests run against the database named by `DATABASE_URL` and
//! are skipped when it is not set. Every test works on its own freshly
//! created users, accounts and pools, so tests never truncate tables.

#![allow(dead_code)]

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

use lucky_envelope::domain::{AccountType, Balance};
use lucky_envelope::envelope::EnvelopeDistributor;
use lucky_envelope::ledger::{Account, Ledger, NewAccount};
use lucky_envelope::transfer::{TradeParticipant, TransferCoordinator};

pub const SYSTEM_ACCOUNT_NO: &str = "10000020190101010000000000000001";
pub const SYSTEM_USER_ID: &str = "100001";
pub const SYSTEM_USERNAME: &str = "system";

/// Serializes schema creation across concurrently starting tests
const SCHEMA_LOCK_KEY: i64 = 0x6c75_636b_79;

/// Connect, apply the schema and seed the system account.
///
/// Returns `None` when `DATABASE_URL` is not set.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *conn)
        .await
        .expect("Failed to take schema lock");

    (&mut *conn)
        .execute(include_str!("../../migrations/0001_init.sql"))
        .await
        .expect("Failed to apply schema");

    sqlx::query(
        r#"
        INSERT INTO accounts (account_no, account_name, account_type, currency_code, user_id, username, balance, status)
        VALUES ($1, 'system envelope holding account', 1, 'CNY', $2, $3, 0, 1)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(SYSTEM_ACCOUNT_NO)
    .bind(SYSTEM_USER_ID)
    .bind(SYSTEM_USERNAME)
    .execute(&mut *conn)
    .await
    .expect("Failed to seed system account");

    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *conn)
        .await
        .expect("Failed to release schema lock");

    drop(conn);
    Some(pool)
}

/// Unique id for this test run
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..16])
}

pub fn system_participant() -> TradeParticipant {
    TradeParticipant::new(SYSTEM_ACCOUNT_NO, SYSTEM_USER_ID, SYSTEM_USERNAME)
}

pub fn distributor(pool: &PgPool) -> EnvelopeDistributor {
    EnvelopeDistributor::new(
        TransferCoordinator::new(Ledger::new(pool.clone())),
        system_participant(),
    )
}

/// Open an envelope account for a fresh user
pub async fn open_account(pool: &PgPool, prefix: &str, balance: Decimal) -> Account {
    let user_id = unique(prefix);
    Ledger::new(pool.clone())
        .create_account(NewAccount::new(
            &user_id,
            prefix,
            AccountType::Envelope,
            Balance::new(balance).expect("valid opening balance"),
        ))
        .await
        .expect("Failed to open account")
}

pub async fn balance_of(pool: &PgPool, account_no: &str) -> Decimal {
    Ledger::new(pool.clone())
        .get_account(account_no)
        .await
        .expect("Failed to read account")
        .expect("account exists")
        .balance
}

/// Move a pool's deadline into the past
pub async fn expire_envelope(pool: &PgPool, envelope_no: &str) {
    sqlx::query("UPDATE envelopes SET expired_at = NOW() - INTERVAL '1 minute' WHERE envelope_no = $1")
        .bind(envelope_no)
        .execute(pool)
        .await
        .expect("Failed to expire envelope");
}
