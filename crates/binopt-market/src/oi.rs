//! Open-interest accounting
//!
//! Open interest is the sum of applied fees of active options. It is capped
//! globally for the pool and per market, and a single trade is capped by the
//! market's max trade size.

use binopt_types::{Amount, CancelCode};
use serde::{Deserialize, Serialize};

/// Pool-wide open interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOi {
    pub total: Amount,
    pub max: Amount,
}

impl PoolOi {
    pub fn new(max: Amount) -> Self {
        Self { total: 0, max }
    }

    /// Remaining pool capacity
    pub fn remaining(&self) -> Amount {
        self.max.saturating_sub(self.total)
    }

    pub fn increase(&mut self, interest: Amount) {
        self.total = self.total.saturating_add(interest);
    }

    pub fn decrease(&mut self, interest: Amount) {
        self.total = self.total.saturating_sub(interest);
    }
}

/// Open interest of one market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOi {
    pub total: Amount,
    pub max: Amount,
    pub max_trade_size: Amount,
}

impl MarketOi {
    pub fn new(max: Amount, max_trade_size: Amount) -> Self {
        Self {
            total: 0,
            max,
            max_trade_size,
        }
    }

    /// `min(max - total, max_trade_size)`
    pub fn remaining(&self) -> Amount {
        self.max.saturating_sub(self.total).min(self.max_trade_size)
    }

    pub fn increase(&mut self, interest: Amount) {
        self.total = self.total.saturating_add(interest);
    }

    pub fn decrease(&mut self, interest: Amount) {
        self.total = self.total.saturating_sub(interest);
    }
}

/// Outcome of checking a requested fee against open-interest capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OiDecision {
    /// The full requested fee fits
    Full(Amount),
    /// Clamped to the remaining capacity
    Partial(Amount),
    Cancel(CancelCode),
}

impl OiDecision {
    /// Fee that will be applied, if the trade proceeds
    pub fn applied(&self) -> Option<Amount> {
        match self {
            OiDecision::Full(fee) | OiDecision::Partial(fee) => Some(*fee),
            OiDecision::Cancel(_) => None,
        }
    }
}

/// Decide how much of `requested_fee` may be opened
pub fn resolve_interest(
    requested_fee: Amount,
    allow_partial_fill: bool,
    pool: &PoolOi,
    market: &MarketOi,
) -> OiDecision {
    let remaining = pool.remaining().min(market.remaining());
    if remaining == 0 {
        return OiDecision::Cancel(CancelCode::O36);
    }
    if requested_fee <= remaining {
        return OiDecision::Full(requested_fee);
    }
    if allow_partial_fill {
        OiDecision::Partial(remaining)
    } else {
        OiDecision::Cancel(CancelCode::O29)
    }
}
