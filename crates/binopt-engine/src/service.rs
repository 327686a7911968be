//! Keeper service
//!
//! Async front for a shared [`ProtocolState`]. Keepers call batch operations
//! concurrently; each call takes the state's write lock for its whole batch,
//! so batches are applied one at a time in arrival order.

use crate::config::EngineConfig;
use crate::snapshot::StateSnapshot;
use crate::state::ProtocolState;
use crate::Result;
use binopt_types::{
    Address, CloseAnytimeRequest, CloseParams, OpenTradeRequest, RevokeRequest, Timestamp,
    TxOutcome,
};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Source of the current unix time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Manually driven clock for simulations and tests
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Shared protocol handle used by one keeper
#[derive(Clone)]
pub struct KeeperService {
    state: Arc<RwLock<ProtocolState>>,
    keeper: Address,
    clock: Arc<dyn Clock>,
}

impl KeeperService {
    pub fn new(state: Arc<RwLock<ProtocolState>>, keeper: Address, clock: Arc<dyn Clock>) -> Self {
        Self {
            state,
            keeper,
            clock,
        }
    }

    /// Build a fresh protocol from configuration on the wall clock
    pub fn from_config(config: EngineConfig, keeper: Address) -> Result<Self> {
        let state = ProtocolState::with_ecdsa(config)?;
        Ok(Self::new(
            Arc::new(RwLock::new(state)),
            keeper,
            Arc::new(SystemClock),
        ))
    }

    /// Another keeper on the same protocol
    pub fn for_keeper(&self, keeper: Address) -> Self {
        Self {
            state: Arc::clone(&self.state),
            keeper,
            clock: Arc::clone(&self.clock),
        }
    }

    pub fn keeper(&self) -> Address {
        self.keeper
    }

    pub fn state(&self) -> Arc<RwLock<ProtocolState>> {
        Arc::clone(&self.state)
    }

    pub async fn open_trades(&self, requests: Vec<OpenTradeRequest>) -> Result<TxOutcome> {
        let now = self.clock.now();
        let outcome = self
            .state
            .write()
            .await
            .open_trades(&self.keeper, now, &requests)?;
        info!(keeper = %self.keeper, submitted = requests.len(), opened = outcome.opened().len(), "open batch processed");
        Ok(outcome)
    }

    pub async fn execute_options(&self, params: Vec<CloseParams>) -> Result<TxOutcome> {
        let now = self.clock.now();
        let outcome = self
            .state
            .write()
            .await
            .execute_options(&self.keeper, now, &params)?;
        info!(keeper = %self.keeper, submitted = params.len(), "execute batch processed");
        Ok(outcome)
    }

    pub async fn close_anytime(&self, requests: Vec<CloseAnytimeRequest>) -> Result<TxOutcome> {
        let now = self.clock.now();
        let outcome = self
            .state
            .write()
            .await
            .close_anytime(&self.keeper, now, &requests)?;
        info!(keeper = %self.keeper, submitted = requests.len(), "close batch processed");
        Ok(outcome)
    }

    pub async fn revoke_approvals(&self, requests: Vec<RevokeRequest>) -> Result<TxOutcome> {
        let now = self.clock.now();
        self.state
            .write()
            .await
            .revoke_approvals(&self.keeper, now, &requests)
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let now = self.clock.now();
        self.state.read().await.snapshot(now)
    }
}
