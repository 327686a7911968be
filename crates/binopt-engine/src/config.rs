//! Engine Configuration
//!
//! Configuration for a protocol instance: chain identity, contract
//! addresses, trusted signers, fee recipients, limits and markets.
//! Supports config files and `BINOPT__*` environment variables.

use binopt_crypto::contract_address;
use binopt_market::{BoosterConfig, MarketConfig, ReferralConfig};
use binopt_types::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Chain id bound into every EIP-712 domain
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Contract addresses
    #[serde(default)]
    pub contracts: ContractAddresses,

    /// Trusted off-chain signers
    #[serde(default)]
    pub signers: SignerSettings,

    /// Fee recipients
    #[serde(default)]
    pub accounts: AccountSettings,

    /// Timing and capacity limits
    #[serde(default)]
    pub limits: LimitSettings,

    /// Keeper access control
    #[serde(default)]
    pub keepers: KeeperSettings,

    #[serde(default)]
    pub referral: ReferralConfig,

    #[serde(default)]
    pub booster: BoosterConfig,

    /// Markets registered at startup
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            contracts: ContractAddresses::default(),
            signers: SignerSettings::default(),
            accounts: AccountSettings::default(),
            limits: LimitSettings::default(),
            keepers: KeeperSettings::default(),
            referral: ReferralConfig::default(),
            booster: BoosterConfig::default(),
            markets: Vec::new(),
        }
    }
}

/// Contract addresses; unset addresses derive from fixed labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    #[serde(default = "default_router")]
    pub router: Address,

    #[serde(default = "default_registrar")]
    pub registrar: Address,

    #[serde(default = "default_token")]
    pub token: Address,

    #[serde(default = "default_pool")]
    pub pool: Address,

    #[serde(default = "default_booster")]
    pub booster: Address,
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            router: default_router(),
            registrar: default_registrar(),
            token: default_token(),
            pool: default_pool(),
            booster: default_booster(),
        }
    }
}

/// Keys whose signatures the engine trusts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSettings {
    /// Signs asset prices
    #[serde(default)]
    pub publisher: Address,

    /// Signs settlement-fee quotes
    #[serde(default)]
    pub sf_publisher: Address,
}

/// Fee recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Receives platform fees and coupon sales
    #[serde(default = "default_treasury")]
    pub treasury: Address,

    /// Receives settlement fees net of referral rebates
    #[serde(default = "default_settlement_fee_disbursal")]
    pub settlement_fee_disbursal: Address,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            treasury: default_treasury(),
            settlement_fee_disbursal: default_settlement_fee_disbursal(),
        }
    }
}

/// Timing and capacity limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSettings {
    /// Max age of a market order's user signature, in seconds
    #[serde(default = "default_max_signature_age")]
    pub max_signature_age: u64,

    /// Max age of the publisher price used to open a trade, in seconds
    #[serde(default = "default_max_price_age")]
    pub max_price_age: u64,

    /// Seconds a liquidity provider must wait before withdrawing
    #[serde(default = "default_pool_lockup_period")]
    pub pool_lockup_period: u64,

    /// Pool-wide open-interest cap
    #[serde(default = "default_max_pool_oi")]
    pub max_pool_oi: Amount,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_signature_age: default_max_signature_age(),
            max_price_age: default_max_price_age(),
            pool_lockup_period: default_pool_lockup_period(),
            max_pool_oi: default_max_pool_oi(),
        }
    }
}

/// Keeper access control
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeeperSettings {
    /// Only whitelisted keepers may submit batches
    #[serde(default)]
    pub private_mode: bool,

    #[serde(default)]
    pub whitelist: Vec<Address>,
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_chain_id() -> u64 {
    1337
}

fn default_router() -> Address {
    contract_address("binopt.router")
}

fn default_registrar() -> Address {
    contract_address("binopt.registrar")
}

fn default_token() -> Address {
    contract_address("binopt.token")
}

fn default_pool() -> Address {
    contract_address("binopt.pool")
}

fn default_booster() -> Address {
    contract_address("binopt.booster")
}

fn default_treasury() -> Address {
    contract_address("binopt.treasury")
}

fn default_settlement_fee_disbursal() -> Address {
    contract_address("binopt.settlement_fee_disbursal")
}

fn default_max_signature_age() -> u64 {
    60
}

fn default_max_price_age() -> u64 {
    60
}

fn default_pool_lockup_period() -> u64 {
    600
}

fn default_max_pool_oi() -> Amount {
    Amount::MAX
}

impl EngineConfig {
    /// Load configuration from environment and optional config file
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/binopt").required(false))
            .add_source(
                config::Environment::with_prefix("BINOPT")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        let contracts = [
            self.contracts.router,
            self.contracts.registrar,
            self.contracts.token,
            self.contracts.pool,
            self.contracts.booster,
        ];
        if contracts.iter().any(Address::is_zero) {
            anyhow::bail!("contract addresses must not be zero");
        }
        for market in &self.markets {
            market.validate()?;
            if contracts.contains(&market.address) {
                anyhow::bail!("market {} collides with a protocol contract", market.address);
            }
        }
        if self.signers.publisher.is_zero() || self.signers.sf_publisher.is_zero() {
            tracing::warn!("publisher keys are unset; no trade can be opened");
        }
        Ok(())
    }

    /// Whether `keeper` may submit batches
    pub fn is_keeper_allowed(&self, keeper: &Address) -> bool {
        !self.keepers.private_mode || self.keepers.whitelist.contains(keeper)
    }
}
