//! Option positions

use crate::address::Address;
use crate::ids::{OptionId, QueueId};
use crate::{Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an option
///
/// ```text
/// Active ──exercise (win)──▶ Exercised
///   │  └───expire (loss)───▶ Expired
///   └─────close anytime────▶ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionState {
    Active,
    Exercised,
    Expired,
    Closed,
}

impl OptionState {
    /// Whether the option has been settled
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OptionState::Active)
    }
}

/// An open or settled option held by a trader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionPosition {
    pub id: OptionId,
    /// Options contract that issued the position
    pub market: Address,
    pub owner: Address,
    pub queue_id: QueueId,
    pub state: OptionState,
    /// Strike with 8 decimals
    pub strike: u128,
    /// Payout on a win
    pub amount: Amount,
    /// Pool liquidity reserved for this option
    pub locked_amount: Amount,
    pub premium: Amount,
    pub expiration: Timestamp,
    /// Direction, unknown until revealed at settlement
    pub is_above: Option<bool>,
    /// Fee applied at open (after any partial fill), excluding the platform fee
    pub total_fee: Amount,
    pub settlement_fee: Amount,
    pub created_at: Timestamp,
}

impl OptionPosition {
    pub fn is_active(&self) -> bool {
        self.state == OptionState::Active
    }

    /// Seconds between creation and expiration
    pub fn period(&self) -> u64 {
        self.expiration.saturating_sub(self.created_at)
    }
}
