//! Ledger module
//!
//! Account storage, the conditional balance write and the audit trail.

mod model;
pub mod repository;
mod service;

pub use model::{replay, Account, AccountLogEntry, NewAccount, NewAccountLog};
pub use service::Ledger;
