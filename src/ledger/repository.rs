//! Account Repository
//!
//! SQL for `accounts` and `account_logs`. Every function takes the
//! connection of the caller's unit of work.

use rust_decimal::Decimal;
use sqlx::PgConnection;

use crate::domain::AccountType;

use super::model::{Account, AccountLogEntry, NewAccount, NewAccountLog};

const ACCOUNT_COLUMNS: &str = r#"
    id, account_no, account_name, account_type, currency_code, user_id, username,
    balance, status, created_at, updated_at
"#;

const LOG_COLUMNS: &str = r#"
    id, log_no, trade_no, account_no, user_id, username, target_account_no,
    target_user_id, target_username, amount, balance, change_type, change_flag,
    description, created_at
"#;

pub async fn insert_account(
    conn: &mut PgConnection,
    account: &NewAccount,
) -> Result<Account, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO accounts (
            account_no, account_name, account_type, currency_code,
            user_id, username, balance, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
        RETURNING {ACCOUNT_COLUMNS}
        "#
    );

    sqlx::query_as::<_, Account>(&sql)
        .bind(&account.account_no)
        .bind(&account.account_name)
        .bind(account.account_type.code())
        .bind(&account.currency_code)
        .bind(&account.user_id)
        .bind(&account.username)
        .bind(account.opening_balance.value())
        .fetch_one(&mut *conn)
        .await
}

pub async fn find_by_no(
    conn: &mut PgConnection,
    account_no: &str,
) -> Result<Option<Account>, sqlx::Error> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_no = $1");

    sqlx::query_as::<_, Account>(&sql)
        .bind(account_no)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_by_user(
    conn: &mut PgConnection,
    user_id: &str,
    account_type: AccountType,
) -> Result<Option<Account>, sqlx::Error> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 AND account_type = $2"
    );

    sqlx::query_as::<_, Account>(&sql)
        .bind(user_id)
        .bind(account_type.code())
        .fetch_optional(&mut *conn)
        .await
}

/// Apply a signed delta to a balance.
///
/// Single conditional write: the row is modified only if the resulting
/// balance stays non-negative. No explicit row lock is taken. Returns the
/// number of rows modified (1 = applied, 0 = rejected or unknown account).
pub async fn update_balance(
    conn: &mut PgConnection,
    account_no: &str,
    delta: Decimal,
) -> Result<u64, sqlx::Error> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE accounts
        SET balance = balance + $1,
            updated_at = NOW()
        WHERE account_no = $2
          AND balance + $1 >= 0
        "#,
    )
    .bind(delta)
    .bind(account_no)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(rows_affected)
}

pub async fn insert_log(
    conn: &mut PgConnection,
    log: &NewAccountLog,
) -> Result<AccountLogEntry, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO account_logs (
            log_no, trade_no, account_no, user_id, username,
            target_account_no, target_user_id, target_username,
            amount, balance, change_type, change_flag, description
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {LOG_COLUMNS}
        "#
    );

    sqlx::query_as::<_, AccountLogEntry>(&sql)
        .bind(&log.log_no)
        .bind(&log.trade_no)
        .bind(&log.account_no)
        .bind(&log.user_id)
        .bind(&log.username)
        .bind(&log.target_account_no)
        .bind(&log.target_user_id)
        .bind(&log.target_username)
        .bind(log.amount)
        .bind(log.balance)
        .bind(log.change_type.code())
        .bind(log.change_flag.code())
        .bind(&log.description)
        .fetch_one(&mut *conn)
        .await
}

/// Audit entries of one account in creation order
pub async fn logs_for_account(
    conn: &mut PgConnection,
    account_no: &str,
) -> Result<Vec<AccountLogEntry>, sqlx::Error> {
    let sql = format!("SELECT {LOG_COLUMNS} FROM account_logs WHERE account_no = $1 ORDER BY id");

    sqlx::query_as::<_, AccountLogEntry>(&sql)
        .bind(account_no)
        .fetch_all(&mut *conn)
        .await
}

pub async fn logs_by_trade_no(
    conn: &mut PgConnection,
    trade_no: &str,
) -> Result<Vec<AccountLogEntry>, sqlx::Error> {
    let sql = format!("SELECT {LOG_COLUMNS} FROM account_logs WHERE trade_no = $1 ORDER BY id");

    sqlx::query_as::<_, AccountLogEntry>(&sql)
        .bind(trade_no)
        .fetch_all(&mut *conn)
        .await
}
