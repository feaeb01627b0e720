//! Account Handler
//!
//! Opens accounts, funds them and reads balances and audit trails.

use sqlx::PgPool;

use crate::domain::validation::{self, Validate};
use crate::domain::{AccountType, Balance, DomainError};
use crate::error::AppError;
use crate::ledger::{Account, AccountLogEntry, Ledger, NewAccount};
use crate::transfer::{TradeParticipant, TransferCoordinator};

use super::{CreateAccountCommand, DepositCommand};

pub struct AccountHandler {
    ledger: Ledger,
    transfer: TransferCoordinator,
}

impl AccountHandler {
    pub fn new(pool: PgPool) -> Self {
        let ledger = Ledger::new(pool);
        Self {
            transfer: TransferCoordinator::new(ledger.clone()),
            ledger,
        }
    }

    pub async fn create(&self, command: CreateAccountCommand) -> Result<Account, AppError> {
        command.validate()?;

        let opening = validation::opening_balance("opening_balance", &command.opening_balance)?;
        let opening = Balance::new(opening).map_err(|e| AppError::InvalidRequest(e.to_string()))?;

        let mut account = NewAccount::new(
            command.user_id,
            command.username,
            command.account_type,
            opening,
        );
        if let Some(name) = command.account_name.filter(|n| !n.trim().is_empty()) {
            account = account.with_account_name(name);
        }
        if let Some(currency) = command.currency_code {
            account = account.with_currency(currency);
        }

        Ok(self.ledger.create_account(account).await?)
    }

    pub async fn get(&self, account_no: &str) -> Result<Account, AppError> {
        self.ledger
            .get_account(account_no)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(account_no.to_string()).into())
    }

    pub async fn envelope_account(&self, user_id: &str) -> Result<Account, AppError> {
        self.ledger
            .get_account_by_user(user_id, AccountType::Envelope)
            .await?
            .ok_or_else(|| {
                DomainError::AccountNotFound(format!("envelope account of {}", user_id)).into()
            })
    }

    pub async fn logs(&self, account_no: &str) -> Result<Vec<AccountLogEntry>, AppError> {
        self.get(account_no).await?;
        Ok(self.ledger.account_logs(account_no).await?)
    }

    pub async fn deposit(
        &self,
        account_no: &str,
        command: DepositCommand,
    ) -> Result<AccountLogEntry, AppError> {
        command.validate()?;
        let amount = validation::amount("amount", &command.amount)?;

        let account = self.get(account_no).await?;
        let participant =
            TradeParticipant::new(&account.account_no, &account.user_id, &account.username);

        Ok(self
            .transfer
            .store_value(participant, amount)
            .await
            .into_result(account_no)?)
    }
}
