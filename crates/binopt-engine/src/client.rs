//! Client-side signing
//!
//! Builders that produce the signed payloads a keeper submits: trade
//! intents, direction reveals, close requests, registrations and permits,
//! plus the two publishers that sign prices and settlement-fee quotes.
//!
//! ```ignore
//! let trader = Trader::new(user, one_ct, state.signing().clone());
//! let intent = trader
//!     .trade(market, queue_id)
//!     .total_fee(5_000_000)
//!     .period(300)
//!     .strike(price.price)
//!     .settlement_fee(quote)
//!     .price(price)
//!     .signed_at(now)
//!     .build()?;
//! ```

use crate::signing::SigningContext;
use binopt_crypto::{CryptoResult, Signer};
use binopt_types::{
    Address, Amount, CloseAnytimeRequest, CloseParams, EcdsaSignature, OpenTradeRequest,
    OptionId, PermitParams, PublisherPrice, QueueId, RegisterParams, RevokeRequest,
    SettlementFeeAttestation, SignatureInfo, Timestamp, TradeIntent, TraderNftId,
};

/// Signs asset prices
#[derive(Debug, Clone)]
pub struct PricePublisher {
    signer: Signer,
}

impl PricePublisher {
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn sign(&self, asset_pair: &str, timestamp: Timestamp, price: u128) -> CryptoResult<PublisherPrice> {
        let digest = binopt_crypto::publisher_price_digest(asset_pair, timestamp, price);
        Ok(PublisherPrice {
            price,
            timestamp,
            signature: self.signer.sign_digest(&digest)?,
        })
    }
}

/// Signs settlement-fee quotes
#[derive(Debug, Clone)]
pub struct FeePublisher {
    signer: Signer,
    signing: SigningContext,
}

impl FeePublisher {
    pub fn new(signer: Signer, signing: SigningContext) -> Self {
        Self { signer, signing }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn quote(
        &self,
        asset_pair: &str,
        settlement_fee: u128,
        expiry_timestamp: Timestamp,
    ) -> CryptoResult<SettlementFeeAttestation> {
        let digest = self
            .signing
            .settlement_fee(asset_pair, settlement_fee, expiry_timestamp);
        Ok(SettlementFeeAttestation {
            settlement_fee,
            expiry_timestamp,
            signature: self.signer.sign_digest(&digest)?,
        })
    }
}

/// A trader: the account key that owns funds and the one-click key that
/// signs trades
#[derive(Debug, Clone)]
pub struct Trader {
    user: Signer,
    one_ct: Signer,
    signing: SigningContext,
}

impl Trader {
    pub fn new(user: Signer, one_ct: Signer, signing: SigningContext) -> Self {
        Self {
            user,
            one_ct,
            signing,
        }
    }

    pub fn address(&self) -> Address {
        self.user.address()
    }

    pub fn one_ct(&self) -> Address {
        self.one_ct.address()
    }

    /// Switch to a new one-click key
    pub fn rotate_one_ct(&mut self, one_ct: Signer) {
        self.one_ct = one_ct;
    }

    /// Registration of the current one-click key at the registrar `nonce`
    pub fn register(&self, nonce: u64) -> CryptoResult<RegisterParams> {
        let digest = self.signing.register(self.address(), self.one_ct(), nonce);
        Ok(RegisterParams {
            one_ct: self.one_ct(),
            signature: self.user.sign_digest(&digest)?,
        })
    }

    pub fn deregister(&self, nonce: u64) -> CryptoResult<EcdsaSignature> {
        let digest = self.signing.deregister(self.address(), nonce);
        self.user.sign_digest(&digest)
    }

    /// Approval of `spender` at the token `nonce`
    pub fn permit(
        &self,
        spender: Address,
        value: Amount,
        nonce: u64,
        deadline: Timestamp,
    ) -> CryptoResult<PermitParams> {
        let digest = self
            .signing
            .permit(self.address(), spender, value, nonce, deadline);
        Ok(PermitParams {
            value,
            deadline,
            signature: self.user.sign_digest(&digest)?,
        })
    }

    /// Zero-value permit that revokes the router's allowance
    pub fn revoke(&self, nonce: u64, deadline: Timestamp) -> CryptoResult<RevokeRequest> {
        let permit = self.permit(self.signing.router, 0, nonce, deadline)?;
        Ok(RevokeRequest {
            token: self.signing.token,
            user: self.address(),
            deadline,
            signature: permit.signature,
        })
    }

    pub fn trade(&self, target_contract: Address, queue_id: QueueId) -> TradeBuilder<'_> {
        TradeBuilder::new(self, target_contract, queue_id)
    }

    /// Direction reveal for an opened intent
    pub fn direction(&self, intent: &TradeIntent, is_above: bool) -> CryptoResult<EcdsaSignature> {
        let (_, digest) = self.signing.direction(intent, is_above);
        self.one_ct.sign_digest(&digest)
    }

    /// Settlement instruction for an option opened from `intent`
    pub fn close_params(
        &self,
        intent: &TradeIntent,
        option_id: OptionId,
        is_above: bool,
        price: PublisherPrice,
    ) -> CryptoResult<CloseParams> {
        Ok(CloseParams {
            option_id,
            target_contract: intent.target_contract,
            is_above,
            direction_signature: self.direction(intent, is_above)?,
            publisher_price: price,
        })
    }

    /// Early-close request signed with the current one-click key
    pub fn close_anytime(
        &self,
        asset_pair: &str,
        close: CloseParams,
        timestamp: Timestamp,
    ) -> CryptoResult<CloseAnytimeRequest> {
        let digest = self
            .signing
            .close_anytime(asset_pair, timestamp, close.option_id);
        Ok(CloseAnytimeRequest {
            close,
            register: None,
            user_signature: SignatureInfo {
                signature: self.one_ct.sign_digest(&digest)?,
                timestamp,
            },
        })
    }
}

/// Fluent builder for a signed [`TradeIntent`]
#[derive(Debug)]
pub struct TradeBuilder<'a> {
    trader: &'a Trader,
    intent: TradeIntent,
}

impl<'a> TradeBuilder<'a> {
    fn new(trader: &'a Trader, target_contract: Address, queue_id: QueueId) -> Self {
        let blank = EcdsaSignature([0; 65]);
        Self {
            trader,
            intent: TradeIntent {
                queue_id,
                user: trader.address(),
                total_fee: 0,
                period: 0,
                target_contract,
                strike: 0,
                slippage: 0,
                allow_partial_fill: false,
                referral_code: String::new(),
                trader_nft_id: TraderNftId(0),
                is_limit_order: false,
                limit_order_expiry: 0,
                settlement_fee_attestation: SettlementFeeAttestation {
                    settlement_fee: 0,
                    expiry_timestamp: 0,
                    signature: blank,
                },
                user_signature: SignatureInfo {
                    signature: blank,
                    timestamp: 0,
                },
                publisher_price: PublisherPrice {
                    price: 0,
                    timestamp: 0,
                    signature: blank,
                },
            },
        }
    }

    pub fn total_fee(mut self, total_fee: Amount) -> Self {
        self.intent.total_fee = total_fee;
        self
    }

    pub fn period(mut self, period: u64) -> Self {
        self.intent.period = period;
        self
    }

    pub fn strike(mut self, strike: u128) -> Self {
        self.intent.strike = strike;
        self
    }

    pub fn slippage(mut self, slippage: u128) -> Self {
        self.intent.slippage = slippage;
        self
    }

    pub fn allow_partial_fill(mut self) -> Self {
        self.intent.allow_partial_fill = true;
        self
    }

    pub fn referral_code(mut self, code: impl Into<String>) -> Self {
        self.intent.referral_code = code.into();
        self
    }

    pub fn trader_nft(mut self, id: TraderNftId) -> Self {
        self.intent.trader_nft_id = id;
        self
    }

    pub fn limit_order(mut self, expiry: Timestamp) -> Self {
        self.intent.is_limit_order = true;
        self.intent.limit_order_expiry = expiry;
        self
    }

    pub fn settlement_fee(mut self, attestation: SettlementFeeAttestation) -> Self {
        self.intent.settlement_fee_attestation = attestation;
        self
    }

    pub fn price(mut self, price: PublisherPrice) -> Self {
        self.intent.publisher_price = price;
        self
    }

    pub fn signed_at(mut self, timestamp: Timestamp) -> Self {
        self.intent.user_signature.timestamp = timestamp;
        self
    }

    /// Sign the intent with the trader's one-click key
    pub fn build(mut self) -> CryptoResult<TradeIntent> {
        let (_, digest) = self.trader.signing.trade(&self.intent);
        self.intent.user_signature.signature = self.trader.one_ct.sign_digest(&digest)?;
        Ok(self.intent)
    }

    /// Sign and wrap in a request without in-flight registration or approval
    pub fn request(self) -> CryptoResult<OpenTradeRequest> {
        Ok(OpenTradeRequest::new(self.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binopt_crypto::recover_address;

    fn signing() -> SigningContext {
        SigningContext {
            chain_id: 1337,
            router: Address([1; 20]),
            registrar: Address([2; 20]),
            token: Address([3; 20]),
        }
    }

    #[test]
    fn test_intent_signed_by_one_ct() {
        let trader = Trader::new(
            Signer::from_label("alice").unwrap(),
            Signer::from_label("alice-1ct").unwrap(),
            signing(),
        );
        let intent = trader
            .trade(Address([4; 20]), QueueId(3))
            .total_fee(5_000_000)
            .period(300)
            .signed_at(100)
            .build()
            .unwrap();

        let (_, digest) = signing().trade(&intent);
        let recovered = recover_address(&digest, &intent.user_signature.signature).unwrap();
        assert_eq!(recovered, trader.one_ct());
        assert_ne!(recovered, trader.address());
        assert_eq!(intent.user, trader.address());
    }

    #[test]
    fn test_registration_signed_by_user() {
        let trader = Trader::new(
            Signer::from_label("bob").unwrap(),
            Signer::from_label("bob-1ct").unwrap(),
            signing(),
        );
        let params = trader.register(0).unwrap();
        let digest = signing().register(trader.address(), trader.one_ct(), 0);
        assert_eq!(recover_address(&digest, &params.signature).unwrap(), trader.address());
    }

    #[test]
    fn test_price_publisher() {
        let publisher = PricePublisher::new(Signer::from_label("publisher").unwrap());
        let price = publisher.sign("ETHUSD", 100, 200_000_000_000).unwrap();
        let digest = binopt_crypto::publisher_price_digest("ETHUSD", 100, 200_000_000_000);
        assert_eq!(recover_address(&digest, &price.signature).unwrap(), publisher.address());
    }
}
