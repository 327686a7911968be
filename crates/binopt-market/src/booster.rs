//! Trader NFTs and settlement-fee boost coupons
//!
//! Traders buy coupons from the booster; each coupon grants a fixed number
//! of boosted trades. A boosted trade pays a lower settlement fee. Holders
//! of a trader NFT get a tier-based discount on the coupon price.

use crate::pricing::PERCENTAGE_PRECISION;
use crate::{MarketError, MarketResult};
use binopt_types::{Address, Amount, TraderNftId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Number of trader NFT tiers
pub const NFT_TIERS: usize = 4;

/// A minted trader NFT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraderNft {
    pub owner: Address,
    pub tier: u8,
}

/// Registry of trader NFTs
#[derive(Debug, Clone, Default)]
pub struct TraderNftRegistry {
    nfts: HashMap<TraderNftId, TraderNft>,
}

impl TraderNftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, id: TraderNftId, owner: Address, tier: u8) -> MarketResult<()> {
        if usize::from(tier) >= NFT_TIERS {
            return Err(MarketError::InvalidTier(tier));
        }
        self.nfts.insert(id, TraderNft { owner, tier });
        Ok(())
    }

    pub fn get(&self, id: TraderNftId) -> Option<TraderNft> {
        self.nfts.get(&id).copied()
    }

    /// Tier of `id` if it is owned by `user`
    pub fn tier_of(&self, id: TraderNftId, user: &Address) -> Option<u8> {
        self.get(id).filter(|nft| nft.owner == *user).map(|nft| nft.tier)
    }
}

/// Boosted trades bought and used by one user for one token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBoostTrades {
    pub total_bought_trades: u32,
    pub used_trades: u32,
}

impl UserBoostTrades {
    pub fn remaining(&self) -> u32 {
        self.total_bought_trades.saturating_sub(self.used_trades)
    }
}

fn default_coupon_price() -> Amount {
    1_000_000
}

fn default_boost_percentage() -> u128 {
    100
}

fn default_trades_per_coupon() -> u32 {
    2
}

fn default_nft_tier_discounts() -> [u128; NFT_TIERS] {
    [20, 40, 60, 80]
}

/// Booster configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoosterConfig {
    #[serde(default = "default_coupon_price")]
    pub coupon_price: Amount,
    /// Share of the base settlement fee waived on a boosted trade (1e4 = 100%)
    #[serde(default = "default_boost_percentage")]
    pub boost_percentage: u128,
    #[serde(default = "default_trades_per_coupon")]
    pub trades_per_coupon: u32,
    /// Coupon price discount per NFT tier, in whole percent
    #[serde(default = "default_nft_tier_discounts")]
    pub nft_tier_discounts: [u128; NFT_TIERS],
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            coupon_price: default_coupon_price(),
            boost_percentage: default_boost_percentage(),
            trades_per_coupon: default_trades_per_coupon(),
            nft_tier_discounts: default_nft_tier_discounts(),
        }
    }
}

/// Coupon sales and boosted-trade balances
#[derive(Debug, Clone, Default)]
pub struct Booster {
    config: BoosterConfig,
    boost_trades: HashMap<(Address, Address), UserBoostTrades>,
}

impl Booster {
    pub fn new(config: BoosterConfig) -> Self {
        Self {
            config,
            boost_trades: HashMap::new(),
        }
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }

    pub fn set_price(&mut self, coupon_price: Amount) {
        self.config.coupon_price = coupon_price;
    }

    pub fn set_boost_percentage(&mut self, boost_percentage: u128) -> MarketResult<()> {
        if boost_percentage > PERCENTAGE_PRECISION {
            return Err(MarketError::InvalidParameter {
                name: "boost_percentage",
                reason: format!("{boost_percentage} exceeds 100%"),
            });
        }
        self.config.boost_percentage = boost_percentage;
        Ok(())
    }

    pub fn set_configure(&mut self, nft_tier_discounts: [u128; NFT_TIERS]) -> MarketResult<()> {
        if nft_tier_discounts.iter().any(|d| *d > 100) {
            return Err(MarketError::InvalidParameter {
                name: "nft_tier_discounts",
                reason: "discount above 100%".to_string(),
            });
        }
        self.config.nft_tier_discounts = nft_tier_discounts;
        Ok(())
    }

    /// Price of `coupons` for a buyer holding an NFT of `nft_tier`
    pub fn coupon_cost(&self, nft_tier: Option<u8>, coupons: u32) -> Amount {
        let gross = self.config.coupon_price * u128::from(coupons);
        let discount = nft_tier
            .and_then(|t| self.config.nft_tier_discounts.get(usize::from(t)).copied())
            .unwrap_or(0);
        gross - gross * discount / 100
    }

    /// Add the boosted trades of `coupons` to `user`'s balance for `token`
    pub fn credit(&mut self, token: Address, user: Address, coupons: u32) -> UserBoostTrades {
        let trades = self.config.trades_per_coupon.saturating_mul(coupons);
        let entry = self.boost_trades.entry((token, user)).or_default();
        entry.total_bought_trades = entry.total_bought_trades.saturating_add(trades);
        info!(%user, coupons, trades, "boost coupons credited");
        *entry
    }

    pub fn user_boost_trades(&self, token: &Address, user: &Address) -> UserBoostTrades {
        self.boost_trades
            .get(&(*token, *user))
            .copied()
            .unwrap_or_default()
    }

    /// Settlement-fee reduction a trade by `user` would receive
    pub fn fee_reduction(&self, token: &Address, user: &Address, base_fee_percentage: u128) -> u128 {
        if self.user_boost_trades(token, user).remaining() == 0 {
            return 0;
        }
        base_fee_percentage * self.config.boost_percentage / PERCENTAGE_PRECISION
    }

    /// Use one boosted trade; returns whether one was available
    pub fn consume(&mut self, token: &Address, user: &Address) -> bool {
        match self.boost_trades.get_mut(&(*token, *user)) {
            Some(entry) if entry.remaining() > 0 => {
                entry.used_trades += 1;
                debug!(%user, remaining = entry.remaining(), "boosted trade used");
                true
            }
            _ => false,
        }
    }
}
