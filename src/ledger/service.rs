//! Ledger
//!
//! Account balances plus their append-only audit trail.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::db::is_unique_violation;
use crate::domain::{AccountType, DomainError};

use super::model::{replay, Account, AccountLogEntry, NewAccount, NewAccountLog};
use super::repository;

#[derive(Debug, Clone)]
pub struct Ledger {
    pool: PgPool,
}

impl Ledger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create an account and its seed audit entry as one unit of work.
    ///
    /// Check-then-insert; a concurrent creation that slips past the check
    /// is caught by the unique `(user_id, account_type)` index and reported
    /// the same way.
    pub async fn create_account(&self, account: NewAccount) -> Result<Account, DomainError> {
        let duplicate = || DomainError::DuplicateAccount {
            user_id: account.user_id.clone(),
            account_type: format!("{:?}", account.account_type),
        };

        let mut tx = self.pool.begin().await?;

        if repository::find_by_user(&mut tx, &account.user_id, account.account_type)
            .await?
            .is_some()
        {
            return Err(duplicate());
        }

        let created = match repository::insert_account(&mut tx, &account).await {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => return Err(duplicate()),
            Err(e) => return Err(e.into()),
        };

        repository::insert_log(&mut tx, &NewAccountLog::account_created(&created)).await?;

        tx.commit().await?;

        tracing::info!(
            account_no = %created.account_no,
            user_id = %created.user_id,
            account_type = ?created.account_type,
            balance = %created.balance,
            "Account created"
        );

        Ok(created)
    }

    /// Apply a signed delta inside the caller's unit of work.
    ///
    /// The returned row count is the only success signal: 1 = applied,
    /// 0 = rejected (insufficient funds, a lost race against a concurrent
    /// decrement, or an unknown account). A rejection is a business outcome,
    /// not a transient fault.
    pub async fn update_balance(
        &self,
        conn: &mut PgConnection,
        account_no: &str,
        delta: Decimal,
    ) -> Result<u64, DomainError> {
        let rows = repository::update_balance(conn, account_no, delta).await?;

        tracing::debug!(account_no, %delta, rows, "Conditional balance update");

        Ok(rows)
    }

    pub async fn get_account(&self, account_no: &str) -> Result<Option<Account>, DomainError> {
        let mut conn = self.pool.acquire().await?;
        Ok(repository::find_by_no(&mut conn, account_no).await?)
    }

    /// Read an account inside the caller's unit of work
    pub async fn get_account_in(
        &self,
        conn: &mut PgConnection,
        account_no: &str,
    ) -> Result<Option<Account>, DomainError> {
        Ok(repository::find_by_no(conn, account_no).await?)
    }

    pub async fn get_account_by_user(
        &self,
        user_id: &str,
        account_type: AccountType,
    ) -> Result<Option<Account>, DomainError> {
        let mut conn = self.pool.acquire().await?;
        Ok(repository::find_by_user(&mut conn, user_id, account_type).await?)
    }

    /// Audit trail of one account in creation order
    pub async fn account_logs(&self, account_no: &str) -> Result<Vec<AccountLogEntry>, DomainError> {
        let mut conn = self.pool.acquire().await?;
        Ok(repository::logs_for_account(&mut conn, account_no).await?)
    }

    pub async fn logs_by_trade_no(&self, trade_no: &str) -> Result<Vec<AccountLogEntry>, DomainError> {
        let mut conn = self.pool.acquire().await?;
        Ok(repository::logs_by_trade_no(&mut conn, trade_no).await?)
    }

    /// Replay the audit trail and compare it with the stored balance.
    ///
    /// Both reads share one transaction so they observe the same snapshot
    /// of committed mutations.
    pub async fn replay_balance(&self, account_no: &str) -> Result<Decimal, DomainError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let account = repository::find_by_no(&mut tx, account_no)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(account_no.to_string()))?;
        let entries = repository::logs_for_account(&mut tx, account_no).await?;
        tx.commit().await?;

        let replayed = replay(&entries).map_err(|entry| {
            DomainError::invariant(format!(
                "audit entry {} of account {} breaks the running balance",
                entry.log_no, account_no
            ))
        })?;

        if replayed != account.balance {
            return Err(DomainError::invariant(format!(
                "account {} balance {} differs from replayed {}",
                account_no, account.balance, replayed
            )));
        }

        Ok(replayed)
    }
}
