//! binopt Ledger - Value movement for the options engine
//!
//! The ledger is:
//! - A single ERC-20 style quote token keyed by [`Address`]
//! - Allowance based: contracts move user funds only through approvals or permits
//! - Immutable (entries are append-only)
//! - Event emitting: every movement produces `Transfer` / `Approval` events
//!
//! The [`LiquidityPool`] sits on top of the token and reserves collateral
//! for every open option.
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Every entry has a reason
//! 3. Locked collateral never exceeds the pool's token balance
//! 4. Permit nonces only move forward

pub mod token;
pub mod pool;

pub use token::*;
pub use pool::*;

use binopt_types::{Address, Amount, OptionId, Timestamp};
use thiserror::Error;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance for {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: Address,
        available: Amount,
        required: Amount,
    },

    #[error("Insufficient allowance from {owner} to {spender}: have {allowance}, need {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: Amount,
        required: Amount,
    },

    #[error("Balance overflow")]
    Overflow,

    #[error("ERC20Permit: expired deadline")]
    PermitExpired { deadline: Timestamp, now: Timestamp },

    #[error("ERC20Permit: invalid signature")]
    PermitInvalidSignature,

    #[error("Pool: Amount is too large")]
    AmountTooLarge { requested: Amount, available: Amount },

    #[error("Collateral already locked for option {0}")]
    AlreadyLocked(OptionId),

    #[error("No locked collateral for option {0}")]
    NotLocked(OptionId),

    #[error("Pool: Withdrawal amount is greater than current unlocked amount, unlocks at {unlocks_at}")]
    LockupNotExpired { unlocks_at: Timestamp },

    #[error("Pool: Amount is too small")]
    ZeroAmount,

    #[error("Pool: Insufficient shares: have {available}, need {required}")]
    InsufficientShares { available: u128, required: u128 },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
