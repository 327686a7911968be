//! End-to-end protocol lifecycle
//!
//! Drives the engine only through its public surface: configuration, the
//! client signers and the keeper calls.

use binopt_crypto::Signer;
use binopt_engine::{EngineConfig, FeePublisher, PricePublisher, ProtocolState, Trader};
use binopt_market::MarketConfig;
use binopt_types::{
    Address, FailureReason, OpenTradeRequest, OptionId, ProtocolEvent, PublisherPrice, QueueId,
    Timestamp, TradeIntent,
};

const ETH: Address = Address([0xe1; 20]);
const BTC: Address = Address([0xb1; 20]);
const LP: Address = Address([0x1f; 20]);
const KEEPER: Address = Address([0x0b; 20]);
const NOW: Timestamp = 1_700_000_000;
const ETH_PRICE: u128 = 200_000_000_000;
const BTC_PRICE: u128 = 3_000_000_000_000;

struct Protocol {
    state: ProtocolState,
    publisher: PricePublisher,
    fees: FeePublisher,
}

impl Protocol {
    fn new() -> Self {
        let publisher = Signer::from_label("lifecycle-publisher").unwrap();
        let sf_publisher = Signer::from_label("lifecycle-sf").unwrap();

        let mut config = EngineConfig::default();
        config.signers.publisher = publisher.address();
        config.signers.sf_publisher = sf_publisher.address();
        config.markets.push(MarketConfig::new(ETH, "ETHUSD"));
        let mut btc = MarketConfig::new(BTC, "BTCUSD");
        btc.early_close_enabled = true;
        config.markets.push(btc);

        let mut state = ProtocolState::with_ecdsa(config).unwrap();
        state.mint(LP, 1_000_000_000).unwrap();
        state.provide_liquidity(LP, 1_000_000_000, 0).unwrap();

        Self {
            fees: FeePublisher::new(sf_publisher, state.signing().clone()),
            publisher: PricePublisher::new(publisher),
            state,
        }
    }

    fn trader(&self, label: &str) -> Trader {
        Trader::new(
            Signer::from_label(label).unwrap(),
            Signer::from_label(&format!("{label}-session")).unwrap(),
            self.state.signing().clone(),
        )
    }

    fn onboard(&mut self, trader: &Trader) {
        let router = self.state.config().contracts.router;
        self.state.mint(trader.address(), 50_000_000).unwrap();
        self.state.approve(trader.address(), router, u128::MAX);
        let nonce = self.state.account_mapping(&trader.address()).nonce;
        let params = trader.register(nonce).unwrap();
        self.state
            .register_account(trader.address(), params.one_ct, &params.signature)
            .unwrap();
    }

    fn price(&self, pair: &str, timestamp: Timestamp, price: u128) -> PublisherPrice {
        self.publisher.sign(pair, timestamp, price).unwrap()
    }

    fn intent(
        &self,
        trader: &Trader,
        market: Address,
        pair: &str,
        queue_id: u64,
        price: u128,
        period: u64,
    ) -> TradeIntent {
        trader
            .trade(market, QueueId(queue_id))
            .total_fee(5_000_000)
            .period(period)
            .strike(price)
            .slippage(100)
            .settlement_fee(self.fees.quote(pair, 1500, NOW + 3600).unwrap())
            .price(self.price(pair, NOW, price))
            .signed_at(NOW)
            .build()
            .unwrap()
    }

    fn accounts(&self) -> Vec<Address> {
        let config = self.state.config();
        vec![
            LP,
            config.contracts.router,
            config.contracts.pool,
            config.contracts.booster,
            config.accounts.treasury,
            config.accounts.settlement_fee_disbursal,
            ETH,
            BTC,
        ]
    }

    fn circulating(&self, traders: &[&Trader]) -> u128 {
        let mut holders = self.accounts();
        holders.extend(traders.iter().map(|t| t.address()));
        holders.iter().map(|a| self.state.balance_of(a)).sum()
    }
}

#[test]
fn test_full_lifecycle() {
    let mut protocol = Protocol::new();
    let alice = protocol.trader("alice");
    let bob = protocol.trader("bob");
    let carol = protocol.trader("carol");
    let router = protocol.state.config().contracts.router;

    protocol.onboard(&alice);
    protocol.state.mint(bob.address(), 50_000_000).unwrap();
    protocol.state.mint(carol.address(), 50_000_000).unwrap();
    protocol.state.approve(carol.address(), router, u128::MAX);

    // bob approves and registers inside the batch, carol never registers
    let alice_intent = protocol.intent(&alice, ETH, "ETHUSD", 0, ETH_PRICE, 300);
    let bob_intent = protocol.intent(&bob, BTC, "BTCUSD", 1, BTC_PRICE, 600);
    let carol_intent = protocol.intent(&carol, ETH, "ETHUSD", 2, ETH_PRICE, 300);
    let requests = vec![
        OpenTradeRequest::new(alice_intent.clone()),
        OpenTradeRequest::new(bob_intent.clone())
            .with_permit(bob.permit(router, u128::MAX, 0, NOW + 3600).unwrap())
            .with_register(bob.register(0).unwrap()),
        OpenTradeRequest::new(carol_intent),
    ];
    let outcome = protocol.state.open_trades(&KEEPER, NOW, &requests).unwrap();

    assert_eq!(
        outcome.opened(),
        vec![(QueueId(0), OptionId(0)), (QueueId(1), OptionId(0))]
    );
    assert_eq!(
        outcome.fail_reason(QueueId(2)),
        Some(FailureReason::UserSignatureMismatch)
    );
    assert_eq!(protocol.state.total_pool_oi(), 10_000_000);
    assert_eq!(protocol.state.total_market_oi(&ETH).unwrap(), 5_000_000);
    assert_eq!(protocol.state.total_market_oi(&BTC).unwrap(), 5_000_000);
    assert!(protocol.state.account_mapping(&bob.address()).is_registered());

    // bob takes profit early on BTC
    let close = bob
        .close_params(
            &bob_intent,
            OptionId(0),
            true,
            protocol.price("BTCUSD", NOW + 120, BTC_PRICE + 1_000_000_000),
        )
        .unwrap();
    let request = bob.close_anytime("BTCUSD", close, NOW + 120).unwrap();
    let before = protocol.state.balance_of(&bob.address());
    let outcome = protocol
        .state
        .close_anytime(&KEEPER, NOW + 120, &[request])
        .unwrap();
    assert!(outcome.unlock_failure(OptionId(0)).is_none());
    assert!(protocol.state.balance_of(&bob.address()) > before);

    // alice wins at expiry
    let close = alice
        .close_params(
            &alice_intent,
            OptionId(0),
            true,
            protocol.price("ETHUSD", NOW + 300, ETH_PRICE + 1),
        )
        .unwrap();
    let before = protocol.state.balance_of(&alice.address());
    let outcome = protocol
        .state
        .execute_options(&KEEPER, NOW + 300, &[close.clone()])
        .unwrap();
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, ProtocolEvent::Exercise { id, .. } if *id == OptionId(0))));
    let option = protocol.state.options(&ETH, OptionId(0)).unwrap();
    assert_eq!(
        protocol.state.balance_of(&alice.address()),
        before + option.amount
    );

    // settling twice is rejected per item
    let outcome = protocol
        .state
        .execute_options(&KEEPER, NOW + 301, &[close])
        .unwrap();
    assert_eq!(
        outcome.unlock_failure(OptionId(0)),
        Some(FailureReason::OptionNotActive)
    );

    assert_eq!(protocol.state.total_pool_oi(), 0);
    assert_eq!(protocol.state.pool().total_locked(), 0);
    assert_eq!(
        protocol.circulating(&[&alice, &bob, &carol]),
        protocol.state.token().total_supply()
    );

    let snapshot = protocol.state.snapshot(NOW + 301);
    assert_eq!(snapshot.active_options().count(), 0);
    assert_eq!(snapshot.opened_queue_ids, vec![QueueId(0), QueueId(1)]);
    assert_eq!(snapshot.accounts.len(), 2);

    protocol
        .state
        .withdraw_liquidity(LP, 1_000_000, NOW + 301)
        .unwrap();
}

#[test]
fn test_settlement_survives_key_rotation() {
    let mut protocol = Protocol::new();
    let mut alice = protocol.trader("alice");
    protocol.onboard(&alice);

    let intent = protocol.intent(&alice, BTC, "BTCUSD", 0, BTC_PRICE, 300);
    let outcome = protocol
        .state
        .open_trades(&KEEPER, NOW, &[OpenTradeRequest::new(intent.clone())])
        .unwrap();
    assert_eq!(outcome.opened().len(), 1);

    // early close request signed by the session key about to be replaced
    let stale_close = alice
        .close_params(
            &intent,
            OptionId(0),
            true,
            protocol.price("BTCUSD", NOW + 100, BTC_PRICE + 1),
        )
        .unwrap();
    let stale_request = alice.close_anytime("BTCUSD", stale_close, NOW + 100).unwrap();
    let expiry_close = alice
        .close_params(
            &intent,
            OptionId(0),
            false,
            protocol.price("BTCUSD", NOW + 300, BTC_PRICE + 1),
        )
        .unwrap();

    let nonce = protocol.state.account_mapping(&alice.address()).nonce;
    let signature = alice.deregister(nonce).unwrap();
    protocol
        .state
        .deregister_account(alice.address(), &signature)
        .unwrap();
    alice.rotate_one_ct(Signer::from_label("alice-session-2").unwrap());
    protocol.onboard(&alice);

    let outcome = protocol
        .state
        .close_anytime(&KEEPER, NOW + 100, &[stale_request])
        .unwrap();
    assert_eq!(
        outcome.unlock_failure(OptionId(0)),
        Some(FailureReason::UserSignatureMismatch)
    );

    // the direction was committed by the key that opened the trade
    let outcome = protocol
        .state
        .execute_options(&KEEPER, NOW + 300, &[expiry_close])
        .unwrap();
    assert!(outcome.unlock_failure(OptionId(0)).is_none());
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, ProtocolEvent::Expire { id, .. } if *id == OptionId(0))));
}

#[test]
fn test_snapshot_json_round_trip() {
    let mut protocol = Protocol::new();
    let alice = protocol.trader("alice");
    protocol.onboard(&alice);
    let intent = protocol.intent(&alice, ETH, "ETHUSD", 9, ETH_PRICE, 300);
    protocol
        .state
        .open_trades(&KEEPER, NOW, &[OpenTradeRequest::new(intent)])
        .unwrap();

    let snapshot = protocol.state.snapshot(NOW);
    let json = snapshot.to_json().unwrap();
    let restored = binopt_engine::StateSnapshot::from_json(&json).unwrap();
    assert_eq!(restored, snapshot);
    assert_eq!(restored.active_options().count(), 1);
    assert_eq!(restored.pool_oi.total, 5_000_000);
}
