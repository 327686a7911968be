//! Protocol state and administrative operations
//!
//! [`ProtocolState`] is the single writer for everything the engine
//! tracks. Batch operations live in `router` and `settlement`; this module
//! holds construction, configuration and the smaller single-shot calls.

use crate::config::EngineConfig;
use crate::signing::SigningContext;
use crate::{EngineError, Result};
use binopt_crypto::{EcdsaVerifier, SignatureVerifier};
use binopt_ledger::{LiquidityPool, TokenLedger};
use binopt_market::{
    Booster, CreationWindow, MarketConfig, MarketError, MarketOi, PoolOi, ReferralStorage,
    TraderNftRegistry, REFERRER_TIERS,
};
use binopt_registrar::{AccountMapping, AccountRegistrar};
use binopt_types::{
    Address, Amount, EcdsaSignature, OptionId, OptionPosition, PermitParams, ProtocolEvent,
    QueueId, Timestamp, TradeIntent, TraderNftId, TxOutcome,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::info;

/// One options contract and the options it issued
#[derive(Debug, Clone)]
pub struct Market {
    pub(crate) config: MarketConfig,
    pub(crate) oi: MarketOi,
    pub(crate) options: BTreeMap<OptionId, OptionPosition>,
    pub(crate) next_option_id: OptionId,
    /// Owners allowed to transfer options of this market
    pub(crate) approved_addresses: BTreeSet<Address>,
}

impl Market {
    pub fn new(config: MarketConfig) -> Self {
        let oi = MarketOi::new(config.max_market_oi, config.max_trade_size);
        Self {
            config,
            oi,
            options: BTreeMap::new(),
            next_option_id: OptionId(0),
            approved_addresses: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn oi(&self) -> &MarketOi {
        &self.oi
    }

    pub fn option(&self, id: OptionId) -> Option<&OptionPosition> {
        self.options.get(&id)
    }

    pub fn options(&self) -> impl Iterator<Item = &OptionPosition> {
        self.options.values()
    }

    pub fn next_option_id(&self) -> OptionId {
        self.next_option_id
    }

    pub fn is_approved_address(&self, account: &Address) -> bool {
        self.approved_addresses.contains(account)
    }

    pub fn approved_addresses(&self) -> impl Iterator<Item = &Address> {
        self.approved_addresses.iter()
    }
}

/// Record of a successfully opened intent
///
/// Kept so the direction reveal can be checked against the exact terms and
/// signer of the original trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTrade {
    pub intent: TradeIntent,
    /// One-click key that signed the trade
    pub signer: Address,
    pub option_id: OptionId,
    pub opened_at: Timestamp,
}

/// The protocol
pub struct ProtocolState {
    pub(crate) config: EngineConfig,
    pub(crate) signing: SigningContext,
    pub(crate) verifier: Box<dyn SignatureVerifier>,
    pub(crate) token: TokenLedger,
    pub(crate) pool: LiquidityPool,
    pub(crate) registrar: AccountRegistrar,
    pub(crate) markets: BTreeMap<Address, Market>,
    pub(crate) pool_oi: PoolOi,
    pub(crate) referral: ReferralStorage,
    pub(crate) booster: Booster,
    pub(crate) nfts: TraderNftRegistry,
    pub(crate) queued_trades: HashMap<QueueId, QueuedTrade>,
    pub(crate) used_signatures: HashSet<EcdsaSignature>,
}

impl std::fmt::Debug for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolState")
            .field("chain_id", &self.config.chain_id)
            .field("markets", &self.markets.len())
            .field("pool_oi", &self.pool_oi)
            .field("opened_trades", &self.queued_trades.len())
            .finish()
    }
}

impl ProtocolState {
    /// Build a protocol from configuration with a custom signature verifier
    pub fn new(config: EngineConfig, verifier: Box<dyn SignatureVerifier>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let signing = SigningContext {
            chain_id: config.chain_id,
            router: config.contracts.router,
            registrar: config.contracts.registrar,
            token: config.contracts.token,
        };
        let mut state = Self {
            token: TokenLedger::new(config.contracts.token, config.chain_id),
            pool: LiquidityPool::new(config.contracts.pool, config.limits.pool_lockup_period),
            registrar: AccountRegistrar::new(config.contracts.registrar, config.chain_id),
            markets: BTreeMap::new(),
            pool_oi: PoolOi::new(config.limits.max_pool_oi),
            referral: ReferralStorage::new(config.referral.clone()),
            booster: Booster::new(config.booster.clone()),
            nfts: TraderNftRegistry::new(),
            queued_trades: HashMap::new(),
            used_signatures: HashSet::new(),
            signing,
            verifier,
            config,
        };
        for market in state.config.markets.clone() {
            state.add_market(market)?;
        }
        info!(
            chain_id = state.config.chain_id,
            router = %state.config.contracts.router,
            markets = state.markets.len(),
            "protocol state initialized"
        );
        Ok(state)
    }

    /// Build a protocol that verifies signatures with ECDSA recovery
    pub fn with_ecdsa(config: EngineConfig) -> Result<Self> {
        Self::new(config, Box::new(EcdsaVerifier))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn signing(&self) -> &SigningContext {
        &self.signing
    }

    pub fn token(&self) -> &TokenLedger {
        &self.token
    }

    pub fn pool(&self) -> &LiquidityPool {
        &self.pool
    }

    pub fn registrar(&self) -> &AccountRegistrar {
        &self.registrar
    }

    pub fn booster(&self) -> &Booster {
        &self.booster
    }

    pub fn referral(&self) -> &ReferralStorage {
        &self.referral
    }

    pub(crate) fn ensure_keeper(&self, keeper: &Address) -> Result<()> {
        if self.config.is_keeper_allowed(keeper) {
            Ok(())
        } else {
            Err(EngineError::KeeperForbidden { keeper: *keeper })
        }
    }

    // ========================================================================
    // Markets
    // ========================================================================

    /// Register an options contract
    pub fn add_market(&mut self, config: MarketConfig) -> Result<()> {
        config.validate()?;
        if self.markets.contains_key(&config.address) {
            return Err(MarketError::MarketExists(config.address).into());
        }
        info!(market = %config.address, asset_pair = %config.asset_pair, "market registered");
        if !self.config.markets.iter().any(|m| m.address == config.address) {
            self.config.markets.push(config.clone());
        }
        self.markets.insert(config.address, Market::new(config));
        Ok(())
    }

    pub fn market(&self, address: &Address) -> Option<&Market> {
        self.markets.get(address)
    }

    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    fn market_mut(&mut self, address: &Address) -> Result<&mut Market> {
        self.markets
            .get_mut(address)
            .ok_or_else(|| MarketError::UnknownMarket(*address).into())
    }

    /// An option by market and id
    pub fn options(&self, market: &Address, id: OptionId) -> Option<&OptionPosition> {
        self.markets.get(market).and_then(|m| m.option(id))
    }

    /// Allow `account` to transfer the options it holds in `market`
    pub fn approve_address(&mut self, market: &Address, account: Address) -> Result<()> {
        self.market_mut(market)?.approved_addresses.insert(account);
        info!(%market, %account, "address approved for option transfers");
        Ok(())
    }

    /// Move an option to a new owner
    ///
    /// Options are non-transferable unless the current owner was approved
    /// for the market. Payouts follow the owner; the direction reveal stays
    /// bound to the key that signed the trade.
    pub fn transfer_option(
        &mut self,
        market: &Address,
        id: OptionId,
        from: Address,
        to: Address,
    ) -> Result<TxOutcome> {
        let m = self.market_mut(market)?;
        let option = m
            .options
            .get_mut(&id)
            .ok_or(EngineError::OptionNotFound { market: *market, id })?;
        if option.owner != from {
            return Err(EngineError::NotOptionOwner { id, account: from });
        }
        if to.is_zero() {
            return Err(EngineError::InvalidRecipient);
        }
        if !m.approved_addresses.contains(&from) {
            return Err(EngineError::TransferNotAllowed { from });
        }
        option.owner = to;
        info!(%market, option_id = %id, %from, %to, "option transferred");
        Ok(TxOutcome::new(vec![ProtocolEvent::OptionTransfer {
            market: *market,
            id,
            from,
            to,
        }]))
    }

    pub fn set_min_fee(&mut self, market: &Address, value: Amount) -> Result<()> {
        self.market_mut(market)?.config.set_min_fee(value);
        Ok(())
    }

    pub fn set_platform_fee(&mut self, market: &Address, value: Amount) -> Result<()> {
        self.market_mut(market)?.config.set_platform_fee(value);
        Ok(())
    }

    pub fn set_min_period(&mut self, market: &Address, value: u64) -> Result<()> {
        Ok(self.market_mut(market)?.config.set_min_period(value)?)
    }

    pub fn set_max_period(&mut self, market: &Address, value: u64) -> Result<()> {
        Ok(self.market_mut(market)?.config.set_max_period(value)?)
    }

    pub fn toggle_early_close(&mut self, market: &Address) -> Result<()> {
        self.market_mut(market)?.config.toggle_early_close();
        Ok(())
    }

    pub fn set_early_close_threshold(&mut self, market: &Address, value: u64) -> Result<()> {
        self.market_mut(market)?.config.set_early_close_threshold(value);
        Ok(())
    }

    pub fn set_creation_window(&mut self, market: &Address, window: Option<CreationWindow>) -> Result<()> {
        self.market_mut(market)?.config.set_creation_window(window);
        Ok(())
    }

    // ========================================================================
    // Open interest
    // ========================================================================

    /// Remaining pool capacity
    pub fn max_pool_oi(&self) -> Amount {
        self.pool_oi.remaining()
    }

    /// Configured pool cap
    pub fn pool_oi_cap(&self) -> Amount {
        self.pool_oi.max
    }

    pub fn total_pool_oi(&self) -> Amount {
        self.pool_oi.total
    }

    /// Remaining capacity of a market, bounded by its max trade size
    pub fn max_market_oi(&self, market: &Address) -> Result<Amount> {
        Ok(self.market_ref(market)?.oi.remaining())
    }

    /// Configured market cap
    pub fn market_oi_cap(&self, market: &Address) -> Result<Amount> {
        Ok(self.market_ref(market)?.oi.max)
    }

    pub fn total_market_oi(&self, market: &Address) -> Result<Amount> {
        Ok(self.market_ref(market)?.oi.total)
    }

    fn market_ref(&self, market: &Address) -> Result<&Market> {
        self.markets
            .get(market)
            .ok_or_else(|| MarketError::UnknownMarket(*market).into())
    }

    pub fn set_max_pool_oi(&mut self, value: Amount) {
        info!(value, "max pool OI updated");
        self.pool_oi.max = value;
        self.config.limits.max_pool_oi = value;
    }

    pub fn set_max_market_oi(&mut self, market: &Address, value: Amount) -> Result<()> {
        let m = self.market_mut(market)?;
        m.oi.max = value;
        m.config.max_market_oi = value;
        Ok(())
    }

    pub fn set_max_trade_size(&mut self, market: &Address, value: Amount) -> Result<()> {
        let m = self.market_mut(market)?;
        m.oi.max_trade_size = value;
        m.config.max_trade_size = value;
        Ok(())
    }

    // ========================================================================
    // Keepers
    // ========================================================================

    pub fn set_private_keeper_mode(&mut self, enabled: bool) {
        self.config.keepers.private_mode = enabled;
    }

    pub fn add_keeper(&mut self, keeper: Address) {
        if !self.config.keepers.whitelist.contains(&keeper) {
            self.config.keepers.whitelist.push(keeper);
        }
    }

    pub fn remove_keeper(&mut self, keeper: &Address) {
        self.config.keepers.whitelist.retain(|k| k != keeper);
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub fn account_mapping(&self, user: &Address) -> AccountMapping {
        self.registrar.account_mapping(user)
    }

    pub fn register_account(
        &mut self,
        user: Address,
        one_ct: Address,
        signature: &EcdsaSignature,
    ) -> Result<TxOutcome> {
        let mut events = Vec::new();
        self.registrar
            .register(user, one_ct, signature, self.verifier.as_ref(), &mut events)?;
        Ok(TxOutcome::new(events))
    }

    pub fn deregister_account(&mut self, user: Address, signature: &EcdsaSignature) -> Result<TxOutcome> {
        let mut events = Vec::new();
        self.registrar
            .deregister(user, signature, self.verifier.as_ref(), &mut events)?;
        Ok(TxOutcome::new(events))
    }

    // ========================================================================
    // Token and pool
    // ========================================================================

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.token.balance_of(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.token.allowance(owner, spender)
    }

    /// Fund an account (faucet)
    pub fn mint(&mut self, to: Address, amount: Amount) -> Result<TxOutcome> {
        let mut events = Vec::new();
        self.token.mint(to, amount, &mut events)?;
        Ok(TxOutcome::new(events))
    }

    pub fn approve(&mut self, owner: Address, spender: Address, value: Amount) -> TxOutcome {
        let mut events = Vec::new();
        self.token.approve(owner, spender, value, &mut events);
        TxOutcome::new(events)
    }

    pub fn transfer(&mut self, from: Address, to: Address, value: Amount) -> Result<TxOutcome> {
        let mut events = Vec::new();
        self.token.transfer(from, to, value, &mut events)?;
        Ok(TxOutcome::new(events))
    }

    pub fn provide_liquidity(&mut self, provider: Address, amount: Amount, now: Timestamp) -> Result<TxOutcome> {
        let mut events = Vec::new();
        self.pool
            .provide(&mut self.token, provider, amount, now, &mut events)?;
        Ok(TxOutcome::new(events))
    }

    pub fn withdraw_liquidity(&mut self, provider: Address, amount: Amount, now: Timestamp) -> Result<TxOutcome> {
        let mut events = Vec::new();
        self.pool
            .withdraw(&mut self.token, provider, amount, now, &mut events)?;
        Ok(TxOutcome::new(events))
    }

    // ========================================================================
    // Referral and booster
    // ========================================================================

    pub fn register_referral_code(&mut self, code: &str, referrer: Address) -> Result<()> {
        Ok(self.referral.register_code(code, referrer)?)
    }

    pub fn set_referrer_tier(&mut self, referrer: Address, tier: u8) -> Result<()> {
        Ok(self.referral.set_referrer_tier(referrer, tier)?)
    }

    pub fn configure_referral(
        &mut self,
        tier_steps: [u128; REFERRER_TIERS],
        tier_discounts: [u128; REFERRER_TIERS],
    ) -> Result<()> {
        Ok(self.referral.configure(tier_steps, tier_discounts)?)
    }

    pub fn mint_trader_nft(&mut self, id: TraderNftId, owner: Address, tier: u8) -> Result<()> {
        Ok(self.nfts.mint(id, owner, tier)?)
    }

    /// Buy boost coupons for `user`, optionally approving the booster in flight
    ///
    /// Coupons are priced with the tier discount of `nft_id` when `user`
    /// owns it; proceeds go to the treasury.
    pub fn buy_coupons(
        &mut self,
        now: Timestamp,
        user: Address,
        nft_id: TraderNftId,
        coupons: u32,
        permit: Option<&PermitParams>,
    ) -> Result<TxOutcome> {
        let booster_address = self.config.contracts.booster;
        let token_address = self.config.contracts.token;
        let price = self
            .booster
            .coupon_cost(self.nfts.tier_of(nft_id, &user), coupons);

        let mut events = Vec::new();
        if let Some(permit) = permit {
            self.token.permit(
                user,
                booster_address,
                permit.value,
                permit.deadline,
                &permit.signature,
                now,
                self.verifier.as_ref(),
                &mut events,
            )?;
        }
        self.token.transfer_from(
            booster_address,
            user,
            self.config.accounts.treasury,
            price,
            &mut events,
        )?;
        self.booster.credit(token_address, user, coupons);
        events.push(ProtocolEvent::BuyCoupon {
            token: token_address,
            user,
            coupons,
            price,
        });
        Ok(TxOutcome::new(events))
    }

    // ========================================================================
    // Queue
    // ========================================================================

    /// Record of the trade opened for `queue_id`
    pub fn queued_trade(&self, queue_id: QueueId) -> Option<&QueuedTrade> {
        self.queued_trades.get(&queue_id)
    }

    pub fn is_signature_used(&self, signature: &EcdsaSignature) -> bool {
        self.used_signatures.contains(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binopt_crypto::{FixtureVerifier, MessageKind};

    fn state() -> ProtocolState {
        let mut config = EngineConfig::default();
        config
            .markets
            .push(MarketConfig::new(Address([0xe1; 20]), "ETHUSD"));
        ProtocolState::new(config, Box::new(FixtureVerifier::new())).unwrap()
    }

    #[test]
    fn test_markets_from_config() {
        let state = state();
        let eth = Address([0xe1; 20]);
        assert_eq!(state.market(&eth).unwrap().config().asset_pair, "ETHUSD");
        assert_eq!(state.max_market_oi(&eth).unwrap(), Amount::MAX);
        assert!(matches!(
            state.max_market_oi(&Address([1; 20])),
            Err(EngineError::Market(MarketError::UnknownMarket(_)))
        ));
    }

    #[test]
    fn test_duplicate_market_rejected() {
        let mut state = state();
        let err = state
            .add_market(MarketConfig::new(Address([0xe1; 20]), "ETHUSD"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Market(MarketError::MarketExists(_))));
    }

    #[test]
    fn test_oi_setters() {
        let mut state = state();
        let eth = Address([0xe1; 20]);
        state.set_max_pool_oi(5_000_000);
        state.set_max_market_oi(&eth, 4_000_000).unwrap();
        state.set_max_trade_size(&eth, 1_000_000).unwrap();
        assert_eq!(state.max_pool_oi(), 5_000_000);
        assert_eq!(state.pool_oi_cap(), 5_000_000);
        assert_eq!(state.market_oi_cap(&eth).unwrap(), 4_000_000);
        assert_eq!(state.max_market_oi(&eth).unwrap(), 1_000_000);
    }

    #[test]
    fn test_keeper_whitelist() {
        let mut state = state();
        let keeper = Address([0x0b; 20]);
        assert!(state.ensure_keeper(&keeper).is_ok());
        state.set_private_keeper_mode(true);
        let err = state.ensure_keeper(&keeper).unwrap_err();
        assert_eq!(err.to_string(), "Keeper: forbidden");
        state.add_keeper(keeper);
        assert!(state.ensure_keeper(&keeper).is_ok());
        state.remove_keeper(&keeper);
        assert!(state.ensure_keeper(&keeper).is_err());
    }

    #[test]
    fn test_buy_coupons_with_nft_discount() {
        let mut verifier = FixtureVerifier::new();
        let user = Address([0x11; 20]);
        let config = EngineConfig::default();
        let booster = config.contracts.booster;
        let token = config.contracts.token;
        let signing = SigningContext {
            chain_id: config.chain_id,
            router: config.contracts.router,
            registrar: config.contracts.registrar,
            token,
        };
        verifier.approve(
            MessageKind::Permit,
            signing.permit(user, booster, 4_000_000, 0, 100),
            user,
        );
        let mut state = ProtocolState::new(config, Box::new(verifier)).unwrap();
        state.mint(user, 10_000_000).unwrap();
        state.mint_trader_nft(TraderNftId(7), user, 0).unwrap();

        let permit = PermitParams {
            value: 4_000_000,
            deadline: 100,
            signature: EcdsaSignature([0; 65]),
        };
        let outcome = state
            .buy_coupons(10, user, TraderNftId(7), 5, Some(&permit))
            .unwrap();

        assert_eq!(state.balance_of(&user), 6_000_000);
        assert_eq!(state.balance_of(&state.config().accounts.treasury), 4_000_000);
        assert_eq!(state.booster().user_boost_trades(&token, &user).total_bought_trades, 10);
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, ProtocolEvent::BuyCoupon { coupons: 5, price: 4_000_000, .. })));
    }

    #[test]
    fn test_buy_coupons_without_allowance_fails() {
        let mut state = state();
        let user = Address([0x11; 20]);
        state.mint(user, 10_000_000).unwrap();
        let err = state
            .buy_coupons(10, user, TraderNftId(0), 1, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::Ledger(_)));
        assert_eq!(state.balance_of(&user), 10_000_000);
    }

    #[test]
    fn test_option_transfer_requires_approved_owner() {
        use crate::testkit::{Harness, ETH, NOW, PERIOD, PRICE};

        let mut h = Harness::new();
        let intent = h.trade(&h.alice, 0, NOW).build().unwrap();
        h.open(NOW, vec![intent.clone()]);
        let alice = h.alice.address();
        let bob = Address([0x42; 20]);

        let err = h.state.transfer_option(&ETH, OptionId(0), alice, bob).unwrap_err();
        assert!(matches!(err, EngineError::TransferNotAllowed { .. }));
        assert_eq!(err.to_string(), "Token transfer not allowed");

        h.state.approve_address(&ETH, alice).unwrap();
        assert!(h.state.market(&ETH).unwrap().is_approved_address(&alice));
        assert!(matches!(
            h.state.transfer_option(&ETH, OptionId(0), alice, Address::ZERO),
            Err(EngineError::InvalidRecipient)
        ));
        let outcome = h.state.transfer_option(&ETH, OptionId(0), alice, bob).unwrap();
        assert_eq!(
            outcome.events,
            vec![ProtocolEvent::OptionTransfer {
                market: ETH,
                id: OptionId(0),
                from: alice,
                to: bob,
            }]
        );
        assert_eq!(h.state.options(&ETH, OptionId(0)).unwrap().owner, bob);

        assert!(matches!(
            h.state.transfer_option(&ETH, OptionId(0), alice, bob),
            Err(EngineError::NotOptionOwner { .. })
        ));
        assert!(matches!(
            h.state.transfer_option(&ETH, OptionId(5), bob, alice),
            Err(EngineError::OptionNotFound { .. })
        ));

        // the new owner collects the payout
        let expiry = NOW + PERIOD;
        let close = h
            .alice
            .close_params(&intent, OptionId(0), true, h.price(expiry, PRICE + 1))
            .unwrap();
        h.state.execute_options(&h.keeper, expiry, &[close]).unwrap();
        let amount = h.state.options(&ETH, OptionId(0)).unwrap().amount;
        assert_eq!(h.state.balance_of(&bob), amount);
    }
}
