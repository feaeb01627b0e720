//! Command definitions
//!
//! Inbound DTOs. Each declares its constraints through `Validate`; amounts
//! travel as strings for precise decimal parsing.

use serde::{Deserialize, Serialize};

use crate::domain::validation::{self, Validate};
use crate::domain::{AccountType, EnvelopeType, ValidationError};

const MAX_USER_ID_LEN: usize = 40;
const MAX_NAME_LEN: usize = 64;
const MAX_BLESSING_LEN: usize = 64;
const MAX_QUANTITY: i64 = 1_000;

// =========================================================================
// Accounts
// =========================================================================

/// Command to open an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountCommand {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub currency_code: Option<String>,
    /// Empty means zero
    #[serde(default)]
    pub opening_balance: String,
}

impl CreateAccountCommand {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            account_name: None,
            account_type: AccountType::Envelope,
            currency_code: None,
            opening_balance: String::new(),
        }
    }

    pub fn with_opening_balance(mut self, opening_balance: impl Into<String>) -> Self {
        self.opening_balance = opening_balance.into();
        self
    }
}

impl Validate for CreateAccountCommand {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::required("user_id", &self.user_id)?;
        validation::max_len("user_id", &self.user_id, MAX_USER_ID_LEN)?;
        validation::required("username", &self.username)?;
        validation::max_len("username", &self.username, MAX_NAME_LEN)?;
        if let Some(name) = &self.account_name {
            validation::max_len("account_name", name, MAX_NAME_LEN)?;
        }
        if let Some(currency) = &self.currency_code {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ValidationError::new(
                    "currency_code",
                    "must be a 3-letter ISO code",
                ));
            }
        }
        validation::opening_balance("opening_balance", &self.opening_balance)?;
        Ok(())
    }
}

/// Command to deposit into one's own account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCommand {
    pub amount: String,
}

impl Validate for DepositCommand {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::amount("amount", &self.amount)?;
        Ok(())
    }
}

// =========================================================================
// Envelopes
// =========================================================================

/// Command to send a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEnvelopeCommand {
    pub user_id: String,
    pub username: String,
    pub envelope_type: EnvelopeType,
    /// Per-share amount for general envelopes, total for lucky ones
    pub amount: String,
    pub quantity: i64,
    #[serde(default)]
    pub blessing: String,
}

impl SendEnvelopeCommand {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        envelope_type: EnvelopeType,
        amount: impl Into<String>,
        quantity: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            envelope_type,
            amount: amount.into(),
            quantity,
            blessing: String::new(),
        }
    }

    pub fn with_blessing(mut self, blessing: impl Into<String>) -> Self {
        self.blessing = blessing.into();
        self
    }
}

impl Validate for SendEnvelopeCommand {
    fn validate(&self) -> Result<(), ValidationError> {
        participant(&self.user_id, &self.username)?;
        validation::amount("amount", &self.amount)?;
        validation::range("quantity", self.quantity, 1, MAX_QUANTITY)?;
        validation::max_len("blessing", &self.blessing, MAX_BLESSING_LEN)?;
        Ok(())
    }
}

/// Command to claim a share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveEnvelopeCommand {
    pub user_id: String,
    pub username: String,
}

impl ReceiveEnvelopeCommand {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

impl Validate for ReceiveEnvelopeCommand {
    fn validate(&self) -> Result<(), ValidationError> {
        participant(&self.user_id, &self.username)
    }
}

/// Identity fields shared by sender and receiver
fn participant(user_id: &str, username: &str) -> Result<(), ValidationError> {
    validation::required("user_id", user_id)?;
    validation::max_len("user_id", user_id, MAX_USER_ID_LEN)?;
    validation::required("username", username)?;
    validation::max_len("username", username, MAX_NAME_LEN)?;
    Ok(())
}

/// Page query of listings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    crate::envelope::Page::DEFAULT_SIZE
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_size(),
        }
    }
}

impl Validate for PageQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::range("page", i64::from(self.page), 1, i64::from(u32::MAX))?;
        validation::range(
            "size",
            i64::from(self.size),
            1,
            i64::from(crate::envelope::Page::MAX_SIZE),
        )?;
        Ok(())
    }
}

impl From<PageQuery> for crate::envelope::Page {
    fn from(query: PageQuery) -> Self {
        crate::envelope::Page::new(query.page, query.size)
    }
}
