//! Messages signed by users, publishers and token owners

use crate::eip712::{uint_word, Eip712Field, Eip712Value, TypedMessage};
use crate::hash::{eth_signed_message_hash, keccak256_concat};
use binopt_types::{Address, Amount, OptionId, Timestamp, TradeIntent};

/// Every kind of message the engine verifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    UserTrade,
    UserTradeWithSettlementFee,
    MarketDirection,
    MarketDirectionWithSettlementFee,
    SettlementFee,
    CloseAnytime,
    RegisterAccount,
    DeregisterAccount,
    Permit,
    PublisherPrice,
}

impl MessageKind {
    /// EIP-712 primary type name (or a label for non-typed messages)
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::UserTrade => "UserTradeSignature",
            MessageKind::UserTradeWithSettlementFee => "UserTradeSignatureWithSettlementFee",
            MessageKind::MarketDirection => "MarketDirectionSignature",
            MessageKind::MarketDirectionWithSettlementFee => {
                "MarketDirectionSignatureWithSettlementFee"
            }
            MessageKind::SettlementFee => "SettlementFeeSignature",
            MessageKind::CloseAnytime => "CloseAnytimeSignature",
            MessageKind::RegisterAccount => "RegisterAccount",
            MessageKind::DeregisterAccount => "DeregisterAccount",
            MessageKind::Permit => "Permit",
            MessageKind::PublisherPrice => "PublisherPrice",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Trade terms signed by the user's one-click key
///
/// Market orders bind the attested settlement fee; limit orders do not.
/// Adding a direction turns the message into the direction reveal that is
/// checked at settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTradeMessage {
    pub user: Address,
    pub total_fee: Amount,
    pub period: u64,
    pub target_contract: Address,
    pub strike: u128,
    pub slippage: u128,
    pub allow_partial_fill: bool,
    pub referral_code: String,
    pub trader_nft_id: u64,
    pub is_above: Option<bool>,
    pub timestamp: Timestamp,
    pub settlement_fee: Option<u128>,
}

impl UserTradeMessage {
    /// Trade message for an intent, as signed at submission time
    pub fn from_intent(intent: &TradeIntent) -> Self {
        let settlement_fee = (!intent.is_limit_order)
            .then_some(intent.settlement_fee_attestation.settlement_fee);
        Self {
            user: intent.user,
            total_fee: intent.total_fee,
            period: intent.period,
            target_contract: intent.target_contract,
            strike: intent.strike,
            slippage: intent.slippage,
            allow_partial_fill: intent.allow_partial_fill,
            referral_code: intent.referral_code.clone(),
            trader_nft_id: intent.trader_nft_id.value(),
            is_above: None,
            timestamp: intent.user_signature.timestamp,
            settlement_fee,
        }
    }

    /// The direction reveal for the same trade
    pub fn with_direction(mut self, is_above: bool) -> Self {
        self.is_above = Some(is_above);
        self
    }

    pub fn kind(&self) -> MessageKind {
        match (self.is_above.is_some(), self.settlement_fee.is_some()) {
            (false, false) => MessageKind::UserTrade,
            (false, true) => MessageKind::UserTradeWithSettlementFee,
            (true, false) => MessageKind::MarketDirection,
            (true, true) => MessageKind::MarketDirectionWithSettlementFee,
        }
    }
}

impl TypedMessage for UserTradeMessage {
    fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    fn fields(&self) -> Vec<Eip712Field> {
        let mut fields = vec![
            Eip712Field::new("user", Eip712Value::Address(self.user)),
            Eip712Field::new("totalFee", Eip712Value::Uint(self.total_fee)),
            Eip712Field::new("period", Eip712Value::Uint(u128::from(self.period))),
            Eip712Field::new("targetContract", Eip712Value::Address(self.target_contract)),
            Eip712Field::new("strike", Eip712Value::Uint(self.strike)),
            Eip712Field::new("slippage", Eip712Value::Uint(self.slippage)),
            Eip712Field::new("allowPartialFill", Eip712Value::Bool(self.allow_partial_fill)),
            Eip712Field::new("referralCode", Eip712Value::String(self.referral_code.clone())),
            Eip712Field::new("traderNFTId", Eip712Value::Uint(u128::from(self.trader_nft_id))),
        ];
        if let Some(is_above) = self.is_above {
            fields.push(Eip712Field::new("isAbove", Eip712Value::Bool(is_above)));
        }
        fields.push(Eip712Field::new(
            "timestamp",
            Eip712Value::Uint(u128::from(self.timestamp)),
        ));
        if let Some(fee) = self.settlement_fee {
            fields.push(Eip712Field::new("settlementFee", Eip712Value::Uint(fee)));
        }
        fields
    }
}

/// Settlement-fee quote for an asset pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementFeeMessage {
    pub asset_pair: String,
    pub expiry_timestamp: Timestamp,
    pub settlement_fee: u128,
}

impl TypedMessage for SettlementFeeMessage {
    fn type_name(&self) -> &'static str {
        MessageKind::SettlementFee.name()
    }

    fn fields(&self) -> Vec<Eip712Field> {
        vec![
            Eip712Field::new("assetPair", Eip712Value::String(self.asset_pair.clone())),
            Eip712Field::new(
                "expiryTimestamp",
                Eip712Value::Uint(u128::from(self.expiry_timestamp)),
            ),
            Eip712Field::new("settlementFee", Eip712Value::Uint(self.settlement_fee)),
        ]
    }
}

/// Request to close an option before expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseAnytimeMessage {
    pub asset_pair: String,
    pub timestamp: Timestamp,
    pub option_id: OptionId,
}

impl TypedMessage for CloseAnytimeMessage {
    fn type_name(&self) -> &'static str {
        MessageKind::CloseAnytime.name()
    }

    fn fields(&self) -> Vec<Eip712Field> {
        vec![
            Eip712Field::new("assetPair", Eip712Value::String(self.asset_pair.clone())),
            Eip712Field::new("timestamp", Eip712Value::Uint(u128::from(self.timestamp))),
            Eip712Field::new("optionId", Eip712Value::Uint(u128::from(self.option_id.value()))),
        ]
    }
}

/// Authorization to map a one-click key to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterAccountMessage {
    pub one_ct: Address,
    pub user: Address,
    pub nonce: u64,
}

impl TypedMessage for RegisterAccountMessage {
    fn type_name(&self) -> &'static str {
        MessageKind::RegisterAccount.name()
    }

    fn fields(&self) -> Vec<Eip712Field> {
        vec![
            Eip712Field::new("oneCT", Eip712Value::Address(self.one_ct)),
            Eip712Field::new("user", Eip712Value::Address(self.user)),
            Eip712Field::new("nonce", Eip712Value::Uint(u128::from(self.nonce))),
        ]
    }
}

/// Authorization to clear the user's one-click key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeregisterAccountMessage {
    pub user: Address,
    pub nonce: u64,
}

impl TypedMessage for DeregisterAccountMessage {
    fn type_name(&self) -> &'static str {
        MessageKind::DeregisterAccount.name()
    }

    fn fields(&self) -> Vec<Eip712Field> {
        vec![
            Eip712Field::new("user", Eip712Value::Address(self.user)),
            Eip712Field::new("nonce", Eip712Value::Uint(u128::from(self.nonce))),
        ]
    }
}

/// EIP-2612 permit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitMessage {
    pub owner: Address,
    pub spender: Address,
    pub value: Amount,
    pub nonce: u64,
    pub deadline: Timestamp,
}

impl TypedMessage for PermitMessage {
    fn type_name(&self) -> &'static str {
        MessageKind::Permit.name()
    }

    fn fields(&self) -> Vec<Eip712Field> {
        vec![
            Eip712Field::new("owner", Eip712Value::Address(self.owner)),
            Eip712Field::new("spender", Eip712Value::Address(self.spender)),
            Eip712Field::new("value", Eip712Value::Uint(self.value)),
            Eip712Field::new("nonce", Eip712Value::Uint(u128::from(self.nonce))),
            Eip712Field::new("deadline", Eip712Value::Uint(u128::from(self.deadline))),
        ]
    }
}

/// Digest a price publisher signs for `(asset_pair, timestamp, price)`
///
/// `keccak256(abi.encodePacked(assetPair, uint256 timestamp, uint256 price))`
/// wrapped in the personal-sign prefix.
pub fn publisher_price_digest(asset_pair: &str, timestamp: Timestamp, price: u128) -> [u8; 32] {
    let packed = keccak256_concat(&[
        asset_pair.as_bytes(),
        &uint_word(u128::from(timestamp)),
        &uint_word(price),
    ]);
    eth_signed_message_hash(&packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eip712::{typed_data_hash, Domain};

    fn trade_message() -> UserTradeMessage {
        UserTradeMessage {
            user: Address([1; 20]),
            total_fee: 5_000_000,
            period: 86_400,
            target_contract: Address([2; 20]),
            strike: 400_00000000,
            slippage: 100,
            allow_partial_fill: true,
            referral_code: String::new(),
            trader_nft_id: 0,
            is_above: None,
            timestamp: 1_700_000_000,
            settlement_fee: Some(1500),
        }
    }

    #[test]
    fn test_user_trade_type_strings() {
        let market = trade_message();
        assert_eq!(
            market.type_string(),
            "UserTradeSignatureWithSettlementFee(address user,uint256 totalFee,uint256 period,\
             address targetContract,uint256 strike,uint256 slippage,bool allowPartialFill,\
             string referralCode,uint256 traderNFTId,uint256 timestamp,uint256 settlementFee)"
        );

        let limit = UserTradeMessage {
            settlement_fee: None,
            ..trade_message()
        };
        assert_eq!(limit.kind(), MessageKind::UserTrade);
        assert!(!limit.type_string().contains("settlementFee"));

        let direction = trade_message().with_direction(true);
        assert_eq!(direction.kind(), MessageKind::MarketDirectionWithSettlementFee);
        assert!(direction
            .type_string()
            .contains("uint256 traderNFTId,bool isAbove,uint256 timestamp"));
    }

    #[test]
    fn test_direction_changes_digest() {
        let domain = Domain::validator(1, Address([9; 20]));
        let up = typed_data_hash(&domain, &trade_message().with_direction(true));
        let down = typed_data_hash(&domain, &trade_message().with_direction(false));
        let plain = typed_data_hash(&domain, &trade_message());
        assert_ne!(up, down);
        assert_ne!(up, plain);
    }

    #[test]
    fn test_permit_type_string() {
        let permit = PermitMessage {
            owner: Address::ZERO,
            spender: Address::ZERO,
            value: 0,
            nonce: 0,
            deadline: 0,
        };
        assert_eq!(
            permit.type_string(),
            "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)"
        );
    }

    #[test]
    fn test_publisher_digest_binds_pair() {
        let a = publisher_price_digest("ETHUSD", 100, 400_00000000);
        let b = publisher_price_digest("BTCUSD", 100, 400_00000000);
        let c = publisher_price_digest("ETHUSD", 101, 400_00000000);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
