//! Domain vocabulary
//!
//! Enumerations persisted by the ledger and the envelope pools.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of account a user may hold. One account per (user, type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Wallet used to send and receive envelopes
    Envelope,
    Points,
    Savings,
}

impl AccountType {
    pub fn code(&self) -> i16 {
        match self {
            AccountType::Envelope => 1,
            AccountType::Points => 2,
            AccountType::Savings => 3,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(AccountType::Envelope),
            2 => Some(AccountType::Points),
            3 => Some(AccountType::Savings),
            _ => None,
        }
    }
}

impl Default for AccountType {
    fn default() -> Self {
        AccountType::Envelope
    }
}

/// Account lifecycle status. Accounts are never physically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Disabled,
}

impl AccountStatus {
    pub fn code(&self) -> i16 {
        match self {
            AccountStatus::Active => 1,
            AccountStatus::Disabled => 2,
        }
    }

    pub fn from_code(code: i16) -> Self {
        match code {
            1 => AccountStatus::Active,
            _ => AccountStatus::Disabled,
        }
    }
}

/// Business reason of a balance movement.
///
/// Incoming types are positive, outgoing types negative, account creation is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    AccountCreated,
    AccountStoreValue,
    EnvelopeIncoming,
    EnvelopeExpiredRefund,
    EnvelopeOutgoing,
}

impl ChangeType {
    pub fn code(&self) -> i16 {
        match self {
            ChangeType::AccountCreated => 0,
            ChangeType::AccountStoreValue => 1,
            ChangeType::EnvelopeIncoming => 2,
            ChangeType::EnvelopeExpiredRefund => 3,
            ChangeType::EnvelopeOutgoing => -2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(ChangeType::AccountCreated),
            1 => Some(ChangeType::AccountStoreValue),
            2 => Some(ChangeType::EnvelopeIncoming),
            3 => Some(ChangeType::EnvelopeExpiredRefund),
            -2 => Some(ChangeType::EnvelopeOutgoing),
            _ => None,
        }
    }

    pub fn is_incoming(&self) -> bool {
        self.code() > 0
    }

    pub fn is_outgoing(&self) -> bool {
        self.code() < 0
    }
}

/// Direction marker persisted on audit entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeFlag {
    Created,
    TransferIn,
    TransferOut,
}

impl ChangeFlag {
    pub fn code(&self) -> i16 {
        match self {
            ChangeFlag::Created => 0,
            ChangeFlag::TransferIn => 1,
            ChangeFlag::TransferOut => -1,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(ChangeFlag::Created),
            1 => Some(ChangeFlag::TransferIn),
            -1 => Some(ChangeFlag::TransferOut),
            _ => None,
        }
    }
}

/// Splitting rule of an envelope pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    /// Fixed, equal-amount shares
    General,
    /// Randomized shares with a fixed expected value
    Lucky,
}

impl EnvelopeType {
    pub fn code(&self) -> i16 {
        match self {
            EnvelopeType::General => 1,
            EnvelopeType::Lucky => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(EnvelopeType::General),
            2 => Some(EnvelopeType::Lucky),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnvelopeType::General => "general",
            EnvelopeType::Lucky => "lucky",
        }
    }
}

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Envelope lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    Created,
    Sending,
    Expired,
    Disabled,
}

string_enum!(EnvelopeStatus {
    Created => "created",
    Sending => "sending",
    Expired => "expired",
    Disabled => "disabled",
});

impl EnvelopeStatus {
    /// Terminal pools accept no claims and are skipped by the reclaim sweep
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnvelopeStatus::Expired | EnvelopeStatus::Disabled)
    }
}

/// Payment status of a pool or a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayStatus {
    Paying,
    Paid,
    Refunding,
    Refunded,
}

string_enum!(PayStatus {
    Paying => "paying",
    Paid => "paid",
    Refunding => "refunding",
    Refunded => "refunded",
});

/// Whether a pool was sent by a user or derived from an expiry refund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Sending,
    Refund,
}

string_enum!(OrderType {
    Sending => "sending",
    Refund => "refund",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_type_sign_convention() {
        assert!(ChangeType::EnvelopeOutgoing.is_outgoing());
        assert!(ChangeType::EnvelopeIncoming.is_incoming());
        assert!(ChangeType::EnvelopeExpiredRefund.is_incoming());
        assert!(ChangeType::AccountStoreValue.is_incoming());

        let created = ChangeType::AccountCreated;
        assert!(!created.is_incoming() && !created.is_outgoing());
    }

    #[test]
    fn test_codes_round_trip() {
        for t in [AccountType::Envelope, AccountType::Points, AccountType::Savings] {
            assert_eq!(AccountType::from_code(t.code()), Some(t));
        }
        for t in [EnvelopeType::General, EnvelopeType::Lucky] {
            assert_eq!(EnvelopeType::from_code(t.code()), Some(t));
        }
        assert_eq!(ChangeFlag::from_code(-1), Some(ChangeFlag::TransferOut));
        assert_eq!(EnvelopeType::from_code(9), None);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("expired".parse::<EnvelopeStatus>(), Ok(EnvelopeStatus::Expired));
        assert_eq!(PayStatus::Refunded.to_string(), "refunded");
        assert_eq!(OrderType::Refund.as_str(), "refund");
        assert!("bogus".parse::<OrderType>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!EnvelopeStatus::Created.is_terminal());
        assert!(!EnvelopeStatus::Sending.is_terminal());
        assert!(EnvelopeStatus::Expired.is_terminal());
        assert!(EnvelopeStatus::Disabled.is_terminal());
    }
}
