//! Point-in-time view of protocol state
//!
//! Snapshots are read-only exports for keepers and dashboards. They carry
//! positions, open interest and registrations, not balances; token history
//! lives in the ledger entries.

use crate::state::ProtocolState;
use crate::{EngineError, Result};
use binopt_market::{MarketOi, PoolOi};
use binopt_registrar::AccountMapping;
use binopt_types::{Address, OptionId, OptionPosition, QueueId, Timestamp};
use serde::{Deserialize, Serialize};

/// One market in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub address: Address,
    pub asset_pair: String,
    pub oi: MarketOi,
    pub next_option_id: OptionId,
    pub options: Vec<OptionPosition>,
    #[serde(default)]
    pub approved_addresses: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub user: Address,
    #[serde(flatten)]
    pub mapping: AccountMapping,
}

/// Serializable export of a [`ProtocolState`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub taken_at: Timestamp,
    pub chain_id: u64,
    pub pool_oi: PoolOi,
    pub pool_locked: u128,
    pub markets: Vec<MarketSnapshot>,
    pub accounts: Vec<AccountSnapshot>,
    pub opened_queue_ids: Vec<QueueId>,
}

impl StateSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Snapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Snapshot(e.to_string()))
    }

    /// Options still awaiting settlement
    pub fn active_options(&self) -> impl Iterator<Item = &OptionPosition> {
        self.markets
            .iter()
            .flat_map(|m| m.options.iter())
            .filter(|o| o.is_active())
    }
}

impl ProtocolState {
    pub fn snapshot(&self, taken_at: Timestamp) -> StateSnapshot {
        let markets = self
            .markets()
            .map(|m| MarketSnapshot {
                address: m.config().address,
                asset_pair: m.config().asset_pair.clone(),
                oi: *m.oi(),
                next_option_id: m.next_option_id(),
                options: m.options().cloned().collect(),
                approved_addresses: m.approved_addresses().copied().collect(),
            })
            .collect();

        let mut accounts: Vec<_> = self
            .registrar()
            .mappings()
            .map(|(user, mapping)| AccountSnapshot {
                user: *user,
                mapping: *mapping,
            })
            .collect();
        accounts.sort_by_key(|a| a.user);

        let mut opened_queue_ids: Vec<_> = self.queued_trades.keys().copied().collect();
        opened_queue_ids.sort();

        StateSnapshot {
            taken_at,
            chain_id: self.config().chain_id,
            pool_oi: self.pool_oi,
            pool_locked: self.pool().total_locked(),
            markets,
            accounts,
            opened_queue_ids,
        }
    }
}
