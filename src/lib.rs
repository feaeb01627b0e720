//! Lucky Envelope Library
//!
//! Concurrent ledger, envelope pool distribution and expiry reclaim.
//! Re-exports modules for the server binary and integration testing.

pub mod api;
pub mod domain;
pub mod envelope;
pub mod handlers;
pub mod jobs;
pub mod ledger;
pub mod lock;
pub mod transfer;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use domain::{Amount, AmountError, Balance, DomainError, TransferAmount};
pub use error::AppError;
