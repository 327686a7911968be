//! Trade intents and the requests the keeper submits on a user's behalf
//!
//! A user signs a [`TradeIntent`] off-chain with their one-click key. The
//! keeper batches intents into [`OpenTradeRequest`]s, optionally bundling an
//! in-flight account registration and an in-flight token approval.

use crate::address::{Address, EcdsaSignature};
use crate::ids::{OptionId, QueueId, TraderNftId};
use crate::{Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// A signature together with the timestamp it was produced at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: EcdsaSignature,
    pub timestamp: Timestamp,
}

/// A price signed by the price publisher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherPrice {
    /// Price with 8 decimals
    pub price: u128,
    pub timestamp: Timestamp,
    pub signature: EcdsaSignature,
}

/// Settlement-fee quote signed by the settlement-fee publisher
///
/// The asset pair is not carried: it is taken from the target market when
/// the attestation is verified, so a quote for another pair fails to verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementFeeAttestation {
    /// Settlement fee percentage with 1e2 precision (1500 = 15%)
    pub settlement_fee: u128,
    pub expiry_timestamp: Timestamp,
    pub signature: EcdsaSignature,
}

/// A signed request to open one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub queue_id: QueueId,
    pub user: Address,
    /// Fee the user is willing to pay, excluding the platform fee
    pub total_fee: Amount,
    /// Option lifetime in seconds
    pub period: u64,
    /// Options contract (market) the trade targets
    pub target_contract: Address,
    /// Requested strike with 8 decimals
    pub strike: u128,
    /// Allowed strike deviation with 1e2 precision (100 = 1%)
    pub slippage: u128,
    pub allow_partial_fill: bool,
    pub referral_code: String,
    pub trader_nft_id: TraderNftId,
    pub is_limit_order: bool,
    /// Only meaningful for limit orders
    pub limit_order_expiry: Timestamp,
    pub settlement_fee_attestation: SettlementFeeAttestation,
    pub user_signature: SignatureInfo,
    pub publisher_price: PublisherPrice,
}

/// In-flight registration of a one-click key, signed by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParams {
    pub one_ct: Address,
    pub signature: EcdsaSignature,
}

/// In-flight EIP-2612 approval, signed by the token owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitParams {
    pub value: Amount,
    pub deadline: Timestamp,
    pub signature: EcdsaSignature,
}

/// One element of an `open_trades` batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTradeRequest {
    pub intent: TradeIntent,
    pub register: Option<RegisterParams>,
    pub permit: Option<PermitParams>,
}

impl OpenTradeRequest {
    /// Request without in-flight registration or approval
    pub fn new(intent: TradeIntent) -> Self {
        Self {
            intent,
            register: None,
            permit: None,
        }
    }

    pub fn with_register(mut self, register: RegisterParams) -> Self {
        self.register = Some(register);
        self
    }

    pub fn with_permit(mut self, permit: PermitParams) -> Self {
        self.permit = Some(permit);
        self
    }
}

/// Settlement instruction for one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseParams {
    pub option_id: OptionId,
    pub target_contract: Address,
    /// Revealed direction
    pub is_above: bool,
    /// Direction reveal signed by the key that signed the trade
    pub direction_signature: EcdsaSignature,
    pub publisher_price: PublisherPrice,
}

/// One element of a `close_anytime` batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAnytimeRequest {
    pub close: CloseParams,
    pub register: Option<RegisterParams>,
    /// Close request signed by the currently registered one-click key
    pub user_signature: SignatureInfo,
}

/// One element of a `revoke_approvals` batch: a zero-value permit for the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeRequest {
    pub token: Address,
    pub user: Address,
    pub deadline: Timestamp,
    pub signature: EcdsaSignature,
}
