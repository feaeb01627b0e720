//! Transfer Coordinator
//!
//! Single-leg money movement on top of the ledger. The paired economic leg
//! lives in the envelope pool's stock, so every transfer mutates exactly one
//! account and writes exactly one audit entry. The counterparty (usually the
//! system pool-holding account) is recorded on the entry only.

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::domain::{new_business_no, Amount, ChangeType, DomainError, TransferAmount};
use crate::ledger::{AccountLogEntry, Ledger, NewAccountLog};

/// One side of a trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeParticipant {
    pub account_no: String,
    pub user_id: String,
    pub username: String,
}

impl TradeParticipant {
    pub fn new(
        account_no: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            account_no: account_no.into(),
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

/// A single-leg movement applied to `body`'s account
#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub trade_no: String,
    /// Acting account whose balance changes
    pub body: TradeParticipant,
    /// Counterparty recorded on the audit entry
    pub target: TradeParticipant,
    pub amount: TransferAmount,
    pub change_type: ChangeType,
    pub description: String,
}

impl TransferCommand {
    pub fn new(
        trade_no: impl Into<String>,
        body: TradeParticipant,
        target: TradeParticipant,
        amount: TransferAmount,
        change_type: ChangeType,
    ) -> Self {
        Self {
            trade_no: trade_no.into(),
            body,
            target,
            amount,
            change_type,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Outgoing movements need an outgoing change type and vice versa
    fn check_direction(&self) -> Result<(), DomainError> {
        let consistent = match self.amount {
            TransferAmount::Debit(_) => self.change_type.is_outgoing(),
            TransferAmount::Credit(_) => self.change_type.is_incoming(),
        };
        if !consistent {
            return Err(DomainError::invariant(format!(
                "change type {:?} does not match {} movement on trade {}",
                self.change_type,
                if self.amount.is_debit() { "an outgoing" } else { "an incoming" },
                self.trade_no
            )));
        }
        Ok(())
    }
}

/// Tri-state business result of a transfer
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// Balance mutated and audit entry written
    Success(AccountLogEntry),
    /// Debit rejected by the conditional write
    InsufficientFunds,
    /// Infrastructure fault or broken invariant
    Failure(DomainError),
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success(_))
    }

    /// For callers that abort their unit of work on anything but success
    pub fn into_result(self, account_no: &str) -> Result<AccountLogEntry, DomainError> {
        match self {
            TransferOutcome::Success(entry) => Ok(entry),
            TransferOutcome::InsufficientFunds => Err(DomainError::insufficient_funds(account_no)),
            TransferOutcome::Failure(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferCoordinator {
    ledger: Ledger,
}

impl TransferCoordinator {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run a transfer in its own unit of work; committed only on success.
    pub async fn transfer(&self, command: TransferCommand) -> TransferOutcome {
        let mut tx = match self.ledger.pool().begin().await {
            Ok(tx) => tx,
            Err(e) => return TransferOutcome::Failure(e.into()),
        };

        let outcome = self.transfer_in(&mut tx, &command).await;

        if outcome.is_success() {
            if let Err(e) = tx.commit().await {
                return TransferOutcome::Failure(e.into());
            }
        } else if let Err(e) = tx.rollback().await {
            tracing::warn!(trade_no = %command.trade_no, error = %e, "Transfer rollback failed");
        }

        outcome
    }

    /// Run a transfer inside the caller's unit of work.
    ///
    /// The caller decides whether to commit; on anything but `Success` the
    /// unit must be rolled back.
    pub async fn transfer_in(
        &self,
        conn: &mut PgConnection,
        command: &TransferCommand,
    ) -> TransferOutcome {
        match self.try_transfer_in(conn, command).await {
            Ok(outcome) => outcome,
            Err(e) => TransferOutcome::Failure(e),
        }
    }

    async fn try_transfer_in(
        &self,
        conn: &mut PgConnection,
        command: &TransferCommand,
    ) -> Result<TransferOutcome, DomainError> {
        command.check_direction()?;

        let account_no = &command.body.account_no;
        let rows = self
            .ledger
            .update_balance(&mut *conn, account_no, command.amount.delta())
            .await?;

        if rows == 0 {
            if command.amount.is_debit() {
                tracing::info!(
                    trade_no = %command.trade_no,
                    account_no = %account_no,
                    amount = %command.amount,
                    "Transfer rejected: insufficient funds"
                );
                return Ok(TransferOutcome::InsufficientFunds);
            }
            return Err(DomainError::invariant(format!(
                "credit of {} to account {} modified no rows",
                command.amount, account_no
            )));
        }

        // The row stays locked by our write until commit, so this read sees our result
        let account = self
            .ledger
            .get_account_in(&mut *conn, account_no)
            .await?
            .ok_or_else(|| DomainError::invariant(format!("account {} vanished", account_no)))?;

        let log = NewAccountLog {
            log_no: new_business_no(),
            trade_no: command.trade_no.clone(),
            account_no: account.account_no.clone(),
            user_id: command.body.user_id.clone(),
            username: command.body.username.clone(),
            target_account_no: command.target.account_no.clone(),
            target_user_id: command.target.user_id.clone(),
            target_username: command.target.username.clone(),
            amount: command.amount.delta(),
            balance: account.balance,
            change_type: command.change_type,
            change_flag: command.amount.flag(),
            description: command.description.clone(),
        };
        let entry = crate::ledger::repository::insert_log(&mut *conn, &log).await?;

        tracing::debug!(
            trade_no = %command.trade_no,
            account_no = %account_no,
            amount = %command.amount,
            balance = %entry.balance,
            "Transfer applied"
        );

        Ok(TransferOutcome::Success(entry))
    }

    /// Deposit into one's own account
    pub async fn store_value(&self, account: TradeParticipant, amount: Amount) -> TransferOutcome {
        let command = TransferCommand::new(
            new_business_no(),
            account.clone(),
            account,
            TransferAmount::Credit(amount),
            ChangeType::AccountStoreValue,
        )
        .with_description("Stored value");

        self.transfer(command).await
    }
}
