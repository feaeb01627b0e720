//! Ledger records
//!
//! `Account` rows are mutated only through the conditional balance write;
//! `AccountLogEntry` rows are append-only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::db::decode_error;
use crate::domain::{
    new_business_no, AccountStatus, AccountType, Balance, ChangeFlag, ChangeType,
};

/// A money account owned by one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: i64,
    pub account_no: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub currency_code: String,
    pub user_id: String,
    pub username: String,
    pub balance: Decimal,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Account {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let account_type: i16 = row.try_get("account_type")?;
        let status: i16 = row.try_get("status")?;

        Ok(Self {
            id: row.try_get("id")?,
            account_no: row.try_get("account_no")?,
            account_name: row.try_get("account_name")?,
            account_type: AccountType::from_code(account_type)
                .ok_or_else(|| decode_error("account_type", account_type))?,
            currency_code: row.try_get("currency_code")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            balance: row.try_get("balance")?,
            status: AccountStatus::from_code(status),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Values for a new account row
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub account_no: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub currency_code: String,
    pub user_id: String,
    pub username: String,
    pub opening_balance: Balance,
}

impl NewAccount {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        account_type: AccountType,
        opening_balance: Balance,
    ) -> Self {
        let username = username.into();
        Self {
            account_no: new_business_no(),
            account_name: default_account_name(&username, account_type),
            account_type,
            currency_code: "CNY".to_string(),
            user_id: user_id.into(),
            username,
            opening_balance,
        }
    }

    pub fn with_account_name(mut self, account_name: impl Into<String>) -> Self {
        self.account_name = account_name.into();
        self
    }

    pub fn with_currency(mut self, currency_code: impl Into<String>) -> Self {
        self.currency_code = currency_code.into();
        self
    }
}

/// Width of `accounts.account_name`
pub const ACCOUNT_NAME_MAX_LEN: usize = 64;

/// "<username>'s <type> account", with the username cut short so the
/// whole name fits the column
fn default_account_name(username: &str, account_type: AccountType) -> String {
    let suffix = format!("'s {:?} account", account_type).to_lowercase();
    let room = ACCOUNT_NAME_MAX_LEN.saturating_sub(suffix.chars().count());
    let owner: String = username.chars().take(room).collect();
    format!("{}{}", owner.to_lowercase(), suffix)
}

/// Immutable audit row, one per balance mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountLogEntry {
    pub id: i64,
    pub log_no: String,
    pub trade_no: String,
    pub account_no: String,
    pub user_id: String,
    pub username: String,
    pub target_account_no: String,
    pub target_user_id: String,
    pub target_username: String,
    /// Signed amount applied to the balance
    pub amount: Decimal,
    /// Balance right after this mutation
    pub balance: Decimal,
    pub change_type: ChangeType,
    pub change_flag: ChangeFlag,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for AccountLogEntry {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let change_type: i16 = row.try_get("change_type")?;
        let change_flag: i16 = row.try_get("change_flag")?;

        Ok(Self {
            id: row.try_get("id")?,
            log_no: row.try_get("log_no")?,
            trade_no: row.try_get("trade_no")?,
            account_no: row.try_get("account_no")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            target_account_no: row.try_get("target_account_no")?,
            target_user_id: row.try_get("target_user_id")?,
            target_username: row.try_get("target_username")?,
            amount: row.try_get("amount")?,
            balance: row.try_get("balance")?,
            change_type: ChangeType::from_code(change_type)
                .ok_or_else(|| decode_error("change_type", change_type))?,
            change_flag: ChangeFlag::from_code(change_flag)
                .ok_or_else(|| decode_error("change_flag", change_flag))?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Values for a new audit row
#[derive(Debug, Clone)]
pub struct NewAccountLog {
    pub log_no: String,
    pub trade_no: String,
    pub account_no: String,
    pub user_id: String,
    pub username: String,
    pub target_account_no: String,
    pub target_user_id: String,
    pub target_username: String,
    pub amount: Decimal,
    pub balance: Decimal,
    pub change_type: ChangeType,
    pub change_flag: ChangeFlag,
    pub description: String,
}

impl NewAccountLog {
    /// Seed entry written together with a new account
    pub fn account_created(account: &Account) -> Self {
        let log_no = new_business_no();
        Self {
            trade_no: log_no.clone(),
            log_no,
            account_no: account.account_no.clone(),
            user_id: account.user_id.clone(),
            username: account.username.clone(),
            target_account_no: account.account_no.clone(),
            target_user_id: account.user_id.clone(),
            target_username: account.username.clone(),
            amount: account.balance,
            balance: account.balance,
            change_type: ChangeType::AccountCreated,
            change_flag: ChangeFlag::Created,
            description: "Account created".to_string(),
        }
    }
}

/// Fold audit entries in creation order.
///
/// Returns the replayed balance, or the first entry whose balance snapshot
/// disagrees with the running total.
pub fn replay(entries: &[AccountLogEntry]) -> Result<Decimal, &AccountLogEntry> {
    let mut running = Decimal::ZERO;
    for entry in entries {
        running += entry.amount;
        if running != entry.balance {
            return Err(entry);
        }
    }
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(amount: Decimal, balance: Decimal) -> AccountLogEntry {
        AccountLogEntry {
            id: 0,
            log_no: new_business_no(),
            trade_no: "T".to_string(),
            account_no: "A".to_string(),
            user_id: "u".to_string(),
            username: "alice".to_string(),
            target_account_no: "S".to_string(),
            target_user_id: "sys".to_string(),
            target_username: "system".to_string(),
            amount,
            balance,
            change_type: ChangeType::AccountStoreValue,
            change_flag: ChangeFlag::TransferIn,
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_replay_reproduces_balance() {
        let entries = vec![
            entry(dec!(1000.00), dec!(1000.00)),
            entry(dec!(-100.00), dec!(900.00)),
            entry(dec!(1.88), dec!(901.88)),
        ];
        assert_eq!(replay(&entries).unwrap(), dec!(901.88));
    }

    #[test]
    fn test_replay_detects_gap() {
        let entries = vec![
            entry(dec!(1000.00), dec!(1000.00)),
            entry(dec!(-100.00), dec!(800.00)),
        ];
        let bad = replay(&entries).unwrap_err();
        assert_eq!(bad.balance, dec!(800.00));
    }

    #[test]
    fn test_new_account_defaults() {
        let account = NewAccount::new("u-1", "Alice", AccountType::Envelope, Balance::zero());
        assert_eq!(account.currency_code, "CNY");
        assert_eq!(account.account_no.len(), 32);
        assert_eq!(account.account_name, "alice's envelope account");
    }

    #[test]
    fn test_default_account_name_fits_column() {
        let username = "y".repeat(64);
        let account = NewAccount::new("u-1", username.clone(), AccountType::Points, Balance::zero());
        assert_eq!(account.account_name.chars().count(), ACCOUNT_NAME_MAX_LEN);
        assert!(account.account_name.ends_with("'s points account"));
        assert_eq!(account.username, username);

        let name = default_account_name("张三丰", AccountType::Envelope);
        assert_eq!(name, "张三丰's envelope account");
    }
}
