//! Shared fixtures for engine unit tests

use crate::client::{FeePublisher, PricePublisher, TradeBuilder, Trader};
use crate::config::EngineConfig;
use crate::state::ProtocolState;
use binopt_crypto::Signer;
use binopt_market::MarketConfig;
use binopt_types::{
    Address, OpenTradeRequest, PublisherPrice, QueueId, Timestamp, TradeIntent, TxOutcome,
};

pub(crate) const ETH: Address = Address([0xe1; 20]);
pub(crate) const NOW: Timestamp = 1_700_000_000;
pub(crate) const PRICE: u128 = 200_000_000_000;
pub(crate) const TOTAL_FEE: u128 = 5_000_000;
pub(crate) const PERIOD: u64 = 300;
pub(crate) const LIQUIDITY: u128 = 1_000_000_000;
pub(crate) const FUNDING: u128 = 100_000_000;

pub(crate) struct Harness {
    pub state: ProtocolState,
    pub keeper: Address,
    pub publisher: PricePublisher,
    pub fees: FeePublisher,
    pub alice: Trader,
}

pub(crate) fn trader(state: &ProtocolState, label: &str) -> Trader {
    Trader::new(
        Signer::from_label(label).unwrap(),
        Signer::from_label(&format!("{label}-1ct")).unwrap(),
        state.signing().clone(),
    )
}

impl Harness {
    /// One ETHUSD market, a funded pool and a funded, registered, approved trader
    pub fn new() -> Self {
        let publisher = Signer::from_label("publisher").unwrap();
        let sf_publisher = Signer::from_label("sf-publisher").unwrap();

        let mut config = EngineConfig::default();
        config.signers.publisher = publisher.address();
        config.signers.sf_publisher = sf_publisher.address();
        config.markets.push(MarketConfig::new(ETH, "ETHUSD"));

        let mut state = ProtocolState::with_ecdsa(config).unwrap();
        let lp = Address([0x1f; 20]);
        state.mint(lp, LIQUIDITY).unwrap();
        state.provide_liquidity(lp, LIQUIDITY, 0).unwrap();

        let alice = trader(&state, "alice");
        Self::fund(&mut state, &alice);

        Self {
            fees: FeePublisher::new(sf_publisher, state.signing().clone()),
            publisher: PricePublisher::new(publisher),
            keeper: Address([0x0b; 20]),
            state,
            alice,
        }
    }

    /// Mint, approve the router and register the one-click key
    pub fn fund(state: &mut ProtocolState, trader: &Trader) {
        let router = state.config().contracts.router;
        state.mint(trader.address(), FUNDING).unwrap();
        state.approve(trader.address(), router, u128::MAX);
        let nonce = state.account_mapping(&trader.address()).nonce;
        let params = trader.register(nonce).unwrap();
        state
            .register_account(trader.address(), params.one_ct, &params.signature)
            .unwrap();
    }

    pub fn price(&self, timestamp: Timestamp, price: u128) -> PublisherPrice {
        self.publisher.sign("ETHUSD", timestamp, price).unwrap()
    }

    /// Market order at [`PRICE`] with a 15% fee quote, signed and priced at `now`
    pub fn trade<'a>(&self, trader: &'a Trader, queue_id: u64, now: Timestamp) -> TradeBuilder<'a> {
        trader
            .trade(ETH, QueueId(queue_id))
            .total_fee(TOTAL_FEE)
            .period(PERIOD)
            .strike(PRICE)
            .slippage(100)
            .settlement_fee(self.fees.quote("ETHUSD", 1500, now + 3600).unwrap())
            .price(self.price(now, PRICE))
            .signed_at(now)
    }

    pub fn open(&mut self, now: Timestamp, intents: Vec<TradeIntent>) -> TxOutcome {
        let requests: Vec<_> = intents.into_iter().map(OpenTradeRequest::new).collect();
        self.state.open_trades(&self.keeper, now, &requests).unwrap()
    }
}
