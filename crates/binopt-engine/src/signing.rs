//! Digests of every message the engine verifies
//!
//! Clients sign these digests; the router and settlement engine recompute
//! them from the submitted parameters. Both sides use [`SigningContext`] so
//! they cannot disagree on domains or field order.

use binopt_crypto::{
    publisher_price_digest, typed_data_hash, CloseAnytimeMessage, DeregisterAccountMessage,
    Domain, MessageKind, PermitMessage, RegisterAccountMessage, SettlementFeeMessage,
    UserTradeMessage,
};
use binopt_types::{Address, Amount, OptionId, Timestamp, TradeIntent};

/// Chain and contract identity used to build signing domains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    pub chain_id: u64,
    pub router: Address,
    pub registrar: Address,
    pub token: Address,
}

impl SigningContext {
    pub fn router_domain(&self) -> Domain {
        Domain::validator(self.chain_id, self.router)
    }

    pub fn registrar_domain(&self) -> Domain {
        Domain::validator(self.chain_id, self.registrar)
    }

    pub fn token_domain(&self) -> Domain {
        Domain::token(self.chain_id, self.token)
    }

    /// Trade signature digest for an intent, with its message kind
    pub fn trade(&self, intent: &TradeIntent) -> (MessageKind, [u8; 32]) {
        let message = UserTradeMessage::from_intent(intent);
        (message.kind(), typed_data_hash(&self.router_domain(), &message))
    }

    /// Direction reveal digest for an intent, with its message kind
    pub fn direction(&self, intent: &TradeIntent, is_above: bool) -> (MessageKind, [u8; 32]) {
        let message = UserTradeMessage::from_intent(intent).with_direction(is_above);
        (message.kind(), typed_data_hash(&self.router_domain(), &message))
    }

    pub fn settlement_fee(
        &self,
        asset_pair: &str,
        settlement_fee: u128,
        expiry_timestamp: Timestamp,
    ) -> [u8; 32] {
        typed_data_hash(
            &self.router_domain(),
            &SettlementFeeMessage {
                asset_pair: asset_pair.to_string(),
                expiry_timestamp,
                settlement_fee,
            },
        )
    }

    pub fn close_anytime(&self, asset_pair: &str, timestamp: Timestamp, option_id: OptionId) -> [u8; 32] {
        typed_data_hash(
            &self.router_domain(),
            &CloseAnytimeMessage {
                asset_pair: asset_pair.to_string(),
                timestamp,
                option_id,
            },
        )
    }

    pub fn register(&self, user: Address, one_ct: Address, nonce: u64) -> [u8; 32] {
        typed_data_hash(
            &self.registrar_domain(),
            &RegisterAccountMessage {
                one_ct,
                user,
                nonce,
            },
        )
    }

    pub fn deregister(&self, user: Address, nonce: u64) -> [u8; 32] {
        typed_data_hash(&self.registrar_domain(), &DeregisterAccountMessage { user, nonce })
    }

    pub fn permit(
        &self,
        owner: Address,
        spender: Address,
        value: Amount,
        nonce: u64,
        deadline: Timestamp,
    ) -> [u8; 32] {
        typed_data_hash(
            &self.token_domain(),
            &PermitMessage {
                owner,
                spender,
                value,
                nonce,
                deadline,
            },
        )
    }

    pub fn publisher_price(&self, asset_pair: &str, timestamp: Timestamp, price: u128) -> [u8; 32] {
        publisher_price_digest(asset_pair, timestamp, price)
    }
}
