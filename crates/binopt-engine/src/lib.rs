//! binopt Engine - Trade resolution and settlement
//!
//! The engine owns the whole protocol state and exposes the calls a keeper
//! and an administrator make:
//!
//! - `open_trades`: validate signed intents and open options
//! - `execute_options`: settle options at expiry against a signed price
//! - `close_anytime`: settle options early at a time-decayed fair value
//! - registration, approvals, liquidity, referral and booster operations
//!
//! # Settlement Flow
//!
//! ```text
//! TradeIntent → checks → OI clamp → fee split → pool lock → OptionPosition
//!                                                              │
//!               direction reveal + signed price at expiry ─────┘→ payout
//! ```
//!
//! # Invariants
//!
//! 1. A batch never aborts because one item fails; failures become events
//! 2. An item's checks run before any of its state changes
//! 3. Queue ids and user signatures are consumed only by a successful open
//! 4. Every open increases and every settlement decreases open interest by the applied fee

pub mod client;
pub mod config;
pub mod signing;
pub mod state;
pub mod router;
pub mod settlement;
pub mod service;
pub mod snapshot;

#[cfg(test)]
mod testkit;

pub use client::*;
pub use config::*;
pub use signing::*;
pub use state::*;
pub use service::*;
pub use snapshot::*;

use binopt_crypto::CryptoError;
use binopt_ledger::LedgerError;
use binopt_market::MarketError;
use binopt_registrar::RegistrarError;
use binopt_types::{Address, OptionId};
use thiserror::Error;

/// Call-level engine errors
///
/// Per-item rejections inside a batch are reported as events instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Keeper: forbidden")]
    KeeperForbidden { keeper: Address },

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Registrar(#[from] RegistrarError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Token transfer not allowed")]
    TransferNotAllowed { from: Address },

    #[error("Option {id} does not exist in market {market}")]
    OptionNotFound { market: Address, id: OptionId },

    #[error("Option {id} is not owned by {account}")]
    NotOptionOwner { id: OptionId, account: Address },

    #[error("Transfer to the zero address")]
    InvalidRecipient,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
