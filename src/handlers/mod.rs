//! Command Handlers module
//!
//! Validate inbound commands and orchestrate the ledger and envelope
//! components for the HTTP layer.

mod account_handler;
mod commands;
mod envelope_handler;

pub use account_handler::AccountHandler;
pub use commands::*;
pub use envelope_handler::EnvelopeHandler;
