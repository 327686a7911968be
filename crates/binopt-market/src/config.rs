//! Per-market configuration

use crate::window::CreationWindow;
use crate::{MarketError, MarketResult};
use binopt_types::{Address, Amount};
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_min_fee() -> Amount {
    1_000_000
}

fn default_platform_fee() -> Amount {
    100_000
}

fn default_min_period() -> u64 {
    180
}

fn default_max_period() -> u64 {
    86_400
}

fn default_early_close_threshold() -> u64 {
    60
}

fn default_max_market_oi() -> Amount {
    Amount::MAX
}

fn default_max_trade_size() -> Amount {
    Amount::MAX
}

/// Configuration of one options contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Options contract address; trades target this
    pub address: Address,
    /// e.g. `ETHUSD`; bound into publisher and settlement-fee signatures
    pub asset_pair: String,
    #[serde(default = "default_min_fee")]
    pub min_fee: Amount,
    #[serde(default = "default_platform_fee")]
    pub platform_fee: Amount,
    #[serde(default = "default_min_period")]
    pub min_period: u64,
    #[serde(default = "default_max_period")]
    pub max_period: u64,
    #[serde(default)]
    pub early_close_enabled: bool,
    #[serde(default = "default_early_close_threshold")]
    pub early_close_threshold: u64,
    /// `None` for markets open around the clock
    #[serde(default)]
    pub creation_window: Option<CreationWindow>,
    #[serde(default = "default_max_market_oi")]
    pub max_market_oi: Amount,
    #[serde(default = "default_max_trade_size")]
    pub max_trade_size: Amount,
}

impl MarketConfig {
    /// Config with default limits for `asset_pair` at `address`
    pub fn new(address: Address, asset_pair: impl Into<String>) -> Self {
        Self {
            address,
            asset_pair: asset_pair.into(),
            min_fee: default_min_fee(),
            platform_fee: default_platform_fee(),
            min_period: default_min_period(),
            max_period: default_max_period(),
            early_close_enabled: false,
            early_close_threshold: default_early_close_threshold(),
            creation_window: None,
            max_market_oi: default_max_market_oi(),
            max_trade_size: default_max_trade_size(),
        }
    }

    /// Check internal consistency
    pub fn validate(&self) -> MarketResult<()> {
        if self.asset_pair.is_empty() {
            return Err(MarketError::InvalidParameter {
                name: "asset_pair",
                reason: "must not be empty".to_string(),
            });
        }
        if self.min_period == 0 || self.min_period > self.max_period {
            return Err(MarketError::InvalidParameter {
                name: "period",
                reason: format!(
                    "min_period {} must be positive and at most max_period {}",
                    self.min_period, self.max_period
                ),
            });
        }
        Ok(())
    }

    pub fn set_min_fee(&mut self, value: Amount) {
        info!(market = %self.address, value, "min fee updated");
        self.min_fee = value;
    }

    pub fn set_platform_fee(&mut self, value: Amount) {
        info!(market = %self.address, value, "platform fee updated");
        self.platform_fee = value;
    }

    pub fn set_min_period(&mut self, value: u64) -> MarketResult<()> {
        if value == 0 || value > self.max_period {
            return Err(MarketError::InvalidParameter {
                name: "min_period",
                reason: format!("{value} must be in 1..={}", self.max_period),
            });
        }
        self.min_period = value;
        Ok(())
    }

    pub fn set_max_period(&mut self, value: u64) -> MarketResult<()> {
        if value < self.min_period {
            return Err(MarketError::InvalidParameter {
                name: "max_period",
                reason: format!("{value} is below min_period {}", self.min_period),
            });
        }
        self.max_period = value;
        Ok(())
    }

    pub fn toggle_early_close(&mut self) {
        self.early_close_enabled = !self.early_close_enabled;
        info!(market = %self.address, enabled = self.early_close_enabled, "early close toggled");
    }

    pub fn set_early_close_threshold(&mut self, value: u64) {
        self.early_close_threshold = value;
    }

    pub fn set_creation_window(&mut self, window: Option<CreationWindow>) {
        self.creation_window = window;
    }

    pub fn is_period_allowed(&self, period: u64) -> bool {
        (self.min_period..=self.max_period).contains(&period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_setters_keep_order() {
        let mut cfg = MarketConfig::new(Address([1; 20]), "ETHUSD");
        assert!(cfg.validate().is_ok());
        assert!(cfg.set_min_period(86_401).is_err());
        assert!(cfg.set_max_period(100).is_err());
        cfg.set_max_period(3_600).unwrap();
        assert!(cfg.is_period_allowed(3_600));
        assert!(!cfg.is_period_allowed(3_601));
        assert!(!cfg.is_period_allowed(179));
    }

    #[test]
    fn test_toggle_early_close() {
        let mut cfg = MarketConfig::new(Address([1; 20]), "ETHUSD");
        assert!(!cfg.early_close_enabled);
        cfg.toggle_early_close();
        assert!(cfg.early_close_enabled);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = format!(
            r#"{{"address":"{}","asset_pair":"BTCUSD"}}"#,
            Address([2; 20])
        );
        let cfg: MarketConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, MarketConfig::new(Address([2; 20]), "BTCUSD"));
    }
}
