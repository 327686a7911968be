//! binopt Market - Per-market rules and pricing
//!
//! # Fee Structure
//!
//! | Component      | Paid by | Paid to                          |
//! |----------------|---------|----------------------------------|
//! | Premium        | trader  | liquidity pool                   |
//! | Settlement fee | trader  | fee disbursal (minus referral rebate) |
//! | Platform fee   | trader  | treasury                         |
//!
//! The settlement fee percentage is quoted by the settlement-fee publisher
//! and reduced by referral and booster discounts. All percentages are
//! integers: settlement fees and slippage use 1e2 precision (1500 = 15%).

pub mod config;
pub mod window;
pub mod oi;
pub mod pricing;
pub mod referral;
pub mod booster;

pub use config::*;
pub use window::*;
pub use oi::*;
pub use pricing::*;
pub use referral::*;
pub use booster::*;

use binopt_types::{Address, TraderNftId};
use thiserror::Error;

/// Market errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("Invalid {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Unknown market: {0}")]
    UnknownMarket(Address),

    #[error("Market already exists: {0}")]
    MarketExists(Address),

    #[error("Settlement fee {0} must be below 100%")]
    InvalidSettlementFee(u128),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("ReferralStorage: Code already exists: {0}")]
    ReferralCodeTaken(String),

    #[error("ReferralStorage: Invalid tier {0}")]
    InvalidTier(u8),

    #[error("Booster: NFT {nft_id} is not owned by {user}")]
    NftNotOwned { nft_id: TraderNftId, user: Address },
}

pub type MarketResult<T> = Result<T, MarketError>;
