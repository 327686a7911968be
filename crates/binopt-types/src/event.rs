//! Protocol events and failure reasons
//!
//! Every engine call returns a [`TxOutcome`] holding the events it emitted,
//! in emission order. Per-item rejections inside a batch are reported as
//! `FailResolve` / `CancelTrade` / `FailUnlock` events rather than errors.

use crate::address::Address;
use crate::ids::{OptionId, QueueId};
use crate::{Amount, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an intent or settlement was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    // Resolver
    UnauthorizedContract,
    InsufficientBalance,
    PermitExpiredDeadline,
    PermitInvalidSignature,
    WrongRegisterSignature,
    AccountAlreadyRegistered,
    IncorrectAllowance,
    TradeAlreadyOpened,
    SignatureAlreadyUsed,
    WrongSettlementFee,
    SettlementFeeExpired,
    UserSignatureMismatch,
    InvalidUserSignatureTimestamp,
    LimitOrderExpired,
    PublisherSignatureMismatch,
    InvalidPriceTimestamp,
    WrongPeriod,
    IncorrectMarketHours,
    FeeBelowMinimum,
    SlippageExceeded,
    PoolAmountTooLarge,
    /// Token ledger fault while moving funds
    TokenTransferFailed,

    // Settlement
    OptionDoesNotExist,
    OptionNotActive,
    WrongPrice,
    WrongMarketDirection,
    WrongClosingTime,
    EarlyCloseNotAllowed,
}

impl FailureReason {
    /// Human-readable reason string
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::UnauthorizedContract => "Router: Unauthorized contract",
            FailureReason::InsufficientBalance => "Router: Insufficient balance",
            FailureReason::PermitExpiredDeadline => "ERC20Permit: expired deadline",
            FailureReason::PermitInvalidSignature => "ERC20Permit: invalid signature",
            FailureReason::WrongRegisterSignature => "Router: Wrong register signature",
            FailureReason::AccountAlreadyRegistered => "Router: Account already registered",
            FailureReason::IncorrectAllowance => "Router: Incorrect allowance",
            FailureReason::TradeAlreadyOpened => "Router: Trade has already been opened",
            FailureReason::SignatureAlreadyUsed => "Router: Signature already used",
            FailureReason::WrongSettlementFee => "Router: Wrong settlement fee",
            FailureReason::SettlementFeeExpired => "Router: Settlement fee has expired",
            FailureReason::UserSignatureMismatch => "Router: User signature didn't match",
            FailureReason::InvalidUserSignatureTimestamp => {
                "Router: Invalid user signature timestamp"
            }
            FailureReason::LimitOrderExpired => "Router: Limit order has already expired",
            FailureReason::PublisherSignatureMismatch => "Router: Publisher signature didn't match",
            FailureReason::InvalidPriceTimestamp => "Router: Invalid price timestamp",
            FailureReason::WrongPeriod => "Router: Wrong period",
            FailureReason::IncorrectMarketHours => "Router: Incorrect market hours",
            FailureReason::FeeBelowMinimum => "Router: Fee below minimum",
            FailureReason::SlippageExceeded => "Router: Slippage limit exceeds",
            FailureReason::PoolAmountTooLarge => "Pool: Amount is too large",
            FailureReason::TokenTransferFailed => "Router: Token transfer failed",
            FailureReason::OptionDoesNotExist => "Router: Option does not exist",
            FailureReason::OptionNotActive => "Router: Option is not active",
            FailureReason::WrongPrice => "Router: Wrong price",
            FailureReason::WrongMarketDirection => "Router: Wrong market direction",
            FailureReason::WrongClosingTime => "Router: Wrong closing time",
            FailureReason::EarlyCloseNotAllowed => "Router: Early close is not allowed",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open-interest cancel codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelCode {
    /// Fee exceeds remaining capacity and partial fill is not allowed
    O29,
    /// No capacity remains
    O36,
}

impl CancelCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelCode::O29 => "O29",
            CancelCode::O36 => "O36",
        }
    }
}

impl fmt::Display for CancelCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by engine calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ProtocolEvent {
    OpenTrade {
        account: Address,
        queue_id: QueueId,
        option_id: OptionId,
        target_contract: Address,
    },
    FailResolve {
        queue_id: QueueId,
        reason: FailureReason,
    },
    CancelTrade {
        account: Address,
        queue_id: QueueId,
        reason: CancelCode,
    },
    Create {
        account: Address,
        id: OptionId,
        settlement_fee: Amount,
        total_fee: Amount,
    },
    UpdatePoolOI {
        is_increased: bool,
        interest: Amount,
    },
    Transfer {
        from: Address,
        to: Address,
        value: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: Amount,
    },
    RegisterAccount {
        user: Address,
        one_ct: Address,
    },
    DeregisterAccount {
        user: Address,
    },
    Exercise {
        account: Address,
        id: OptionId,
        profit: Amount,
        price_at_expiration: u128,
        is_above: bool,
    },
    Expire {
        id: OptionId,
        premium: Amount,
        price_at_expiration: u128,
        is_above: bool,
    },
    LpProfit {
        id: OptionId,
        amount: Amount,
    },
    LpLoss {
        id: OptionId,
        amount: Amount,
    },
    FailUnlock {
        option_id: OptionId,
        target_contract: Address,
        reason: FailureReason,
    },
    RevokeRouter {
        token: Address,
        user: Address,
        revoked_at: Timestamp,
    },
    Provide {
        account: Address,
        amount: Amount,
    },
    Withdraw {
        account: Address,
        amount: Amount,
    },
    /// Ownership of an option moved between accounts
    OptionTransfer {
        market: Address,
        id: OptionId,
        from: Address,
        to: Address,
    },
    BuyCoupon {
        token: Address,
        user: Address,
        coupons: u32,
        price: Amount,
    },
}

/// Result of one engine call: the events it emitted, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    pub events: Vec<ProtocolEvent>,
}

impl TxOutcome {
    pub fn new(events: Vec<ProtocolEvent>) -> Self {
        Self { events }
    }

    /// `(queue_id, option_id)` of every trade opened by this call
    pub fn opened(&self) -> Vec<(QueueId, OptionId)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProtocolEvent::OpenTrade {
                    queue_id, option_id, ..
                } => Some((*queue_id, *option_id)),
                _ => None,
            })
            .collect()
    }

    /// Resolver failure recorded for a queue id, if any
    pub fn fail_reason(&self, queue_id: QueueId) -> Option<FailureReason> {
        self.events.iter().find_map(|e| match e {
            ProtocolEvent::FailResolve { queue_id: q, reason } if *q == queue_id => Some(*reason),
            _ => None,
        })
    }

    /// Cancel code recorded for a queue id, if any
    pub fn cancel_code(&self, queue_id: QueueId) -> Option<CancelCode> {
        self.events.iter().find_map(|e| match e {
            ProtocolEvent::CancelTrade {
                queue_id: q, reason, ..
            } if *q == queue_id => Some(*reason),
            _ => None,
        })
    }

    /// Settlement failure recorded for an option, if any
    pub fn unlock_failure(&self, option_id: OptionId) -> Option<FailureReason> {
        self.events.iter().find_map(|e| match e {
            ProtocolEvent::FailUnlock {
                option_id: id,
                reason,
                ..
            } if *id == option_id => Some(*reason),
            _ => None,
        })
    }

    /// All `Transfer` events as `(from, to, value)`
    pub fn transfers(&self) -> Vec<(Address, Address, Amount)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProtocolEvent::Transfer { from, to, value } => Some((*from, *to, *value)),
                _ => None,
            })
            .collect()
    }

    pub fn extend(&mut self, other: TxOutcome) {
        self.events.extend(other.events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings() {
        assert_eq!(
            FailureReason::UserSignatureMismatch.to_string(),
            "Router: User signature didn't match"
        );
        assert_eq!(FailureReason::PoolAmountTooLarge.as_str(), "Pool: Amount is too large");
        assert_eq!(CancelCode::O29.to_string(), "O29");
    }

    #[test]
    fn test_outcome_queries() {
        let user = Address([1; 20]);
        let outcome = TxOutcome::new(vec![
            ProtocolEvent::FailResolve {
                queue_id: QueueId(0),
                reason: FailureReason::WrongPeriod,
            },
            ProtocolEvent::CancelTrade {
                account: user,
                queue_id: QueueId(1),
                reason: CancelCode::O36,
            },
            ProtocolEvent::OpenTrade {
                account: user,
                queue_id: QueueId(2),
                option_id: OptionId(0),
                target_contract: Address([2; 20]),
            },
        ]);

        assert_eq!(outcome.fail_reason(QueueId(0)), Some(FailureReason::WrongPeriod));
        assert_eq!(outcome.fail_reason(QueueId(2)), None);
        assert_eq!(outcome.cancel_code(QueueId(1)), Some(CancelCode::O36));
        assert_eq!(outcome.opened(), vec![(QueueId(2), OptionId(0))]);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(ProtocolEvent::UpdatePoolOI {
            is_increased: true,
            interest: 5,
        })
        .unwrap();
        assert_eq!(json["event"], "UpdatePoolOI");
        assert_eq!(json["is_increased"], true);
    }
}
