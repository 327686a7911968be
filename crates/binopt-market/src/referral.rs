//! Referral codes and referrer tiers
//!
//! | Tier | Step | Rebate |
//! |------|------|--------|
//! | 0    | 4    | 25%    |
//! | 1    | 10   | 50%    |
//! | 2    | 16   | 75%    |
//!
//! A referred trader's settlement fee percentage is reduced by
//! `step * step_size`; the referrer receives `rebate` of the settlement fee.
//! Referring yourself earns nothing.

use crate::{MarketError, MarketResult};
use binopt_types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Precision of referrer rebates (1e5 = 100%)
pub const REBATE_PRECISION: u128 = 100_000;

/// Number of referrer tiers
pub const REFERRER_TIERS: usize = 3;

fn default_tier_steps() -> [u128; REFERRER_TIERS] {
    [4, 10, 16]
}

fn default_tier_discounts() -> [u128; REFERRER_TIERS] {
    [25_000, 50_000, 75_000]
}

fn default_step_size() -> u128 {
    25
}

/// Referral configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralConfig {
    #[serde(default = "default_tier_steps")]
    pub tier_steps: [u128; REFERRER_TIERS],
    #[serde(default = "default_tier_discounts")]
    pub tier_discounts: [u128; REFERRER_TIERS],
    /// Settlement-fee reduction per step (1e2 precision)
    #[serde(default = "default_step_size")]
    pub step_size: u128,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            tier_steps: default_tier_steps(),
            tier_discounts: default_tier_discounts(),
            step_size: default_step_size(),
        }
    }
}

/// Registered codes and referrer tiers
#[derive(Debug, Clone, Default)]
pub struct ReferralStorage {
    config: ReferralConfig,
    codes: HashMap<String, Address>,
    referrer_tiers: HashMap<Address, u8>,
}

impl ReferralStorage {
    pub fn new(config: ReferralConfig) -> Self {
        Self {
            config,
            codes: HashMap::new(),
            referrer_tiers: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ReferralConfig {
        &self.config
    }

    /// Replace tier steps and rebates
    pub fn configure(
        &mut self,
        tier_steps: [u128; REFERRER_TIERS],
        tier_discounts: [u128; REFERRER_TIERS],
    ) -> MarketResult<()> {
        if tier_discounts.iter().any(|d| *d > REBATE_PRECISION) {
            return Err(MarketError::InvalidParameter {
                name: "tier_discounts",
                reason: "rebate above 100%".to_string(),
            });
        }
        self.config.tier_steps = tier_steps;
        self.config.tier_discounts = tier_discounts;
        Ok(())
    }

    /// Claim `code` for `referrer`
    pub fn register_code(&mut self, code: &str, referrer: Address) -> MarketResult<()> {
        if code.is_empty() {
            return Err(MarketError::InvalidParameter {
                name: "referral_code",
                reason: "must not be empty".to_string(),
            });
        }
        if self.codes.contains_key(code) {
            return Err(MarketError::ReferralCodeTaken(code.to_string()));
        }
        self.codes.insert(code.to_string(), referrer);
        info!(code, %referrer, "referral code registered");
        Ok(())
    }

    pub fn set_referrer_tier(&mut self, referrer: Address, tier: u8) -> MarketResult<()> {
        if usize::from(tier) >= REFERRER_TIERS {
            return Err(MarketError::InvalidTier(tier));
        }
        self.referrer_tiers.insert(referrer, tier);
        Ok(())
    }

    pub fn referrer_tier(&self, referrer: &Address) -> u8 {
        self.referrer_tiers.get(referrer).copied().unwrap_or(0)
    }

    /// Owner of `code`, if registered
    pub fn referrer_for(&self, code: &str) -> Option<Address> {
        if code.is_empty() {
            return None;
        }
        self.codes.get(code).copied()
    }

    /// Settlement-fee percentage reduction for `user` referred by `referrer`
    pub fn fee_reduction(&self, referrer: &Address, user: &Address) -> u128 {
        if referrer == user || referrer.is_zero() {
            return 0;
        }
        let tier = usize::from(self.referrer_tier(referrer));
        self.config.tier_steps[tier] * self.config.step_size
    }

    /// Share of `settlement_fee` paid to `referrer`
    pub fn rebate(&self, referrer: &Address, user: &Address, settlement_fee: Amount) -> Amount {
        if referrer == user || referrer.is_zero() {
            return 0;
        }
        let tier = usize::from(self.referrer_tier(referrer));
        settlement_fee * self.config.tier_discounts[tier] / REBATE_PRECISION
    }
}
