//! Liquidity pool backing every option
//!
//! Liquidity providers deposit the quote token and receive shares. Each
//! open option reserves `amount` of the pool's balance until it settles.
//! Premiums flow into the pool at open; payouts flow out at settlement.

use crate::token::TokenLedger;
use crate::{LedgerError, Result};
use binopt_types::{Address, Amount, OptionId, ProtocolEvent, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// A provider's stake in the pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPosition {
    pub shares: u128,
    pub last_provide: Timestamp,
}

/// Collateral reserved for one option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedLiquidity {
    pub amount: Amount,
    pub premium: Amount,
}

/// The pool
#[derive(Debug, Clone)]
pub struct LiquidityPool {
    address: Address,
    lockup_period: u64,
    providers: HashMap<Address, ProviderPosition>,
    total_shares: u128,
    locked: HashMap<(Address, OptionId), LockedLiquidity>,
    total_locked: Amount,
}

impl LiquidityPool {
    pub fn new(address: Address, lockup_period: u64) -> Self {
        Self {
            address,
            lockup_period,
            providers: HashMap::new(),
            total_shares: 0,
            locked: HashMap::new(),
            total_locked: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn total_locked(&self) -> Amount {
        self.total_locked
    }

    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    pub fn position(&self, provider: &Address) -> ProviderPosition {
        self.providers.get(provider).copied().unwrap_or_default()
    }

    pub fn locked_liquidity(&self, market: &Address, option_id: OptionId) -> Option<LockedLiquidity> {
        self.locked.get(&(*market, option_id)).copied()
    }

    /// Token balance not reserved for open options
    pub fn available_balance(&self, token: &TokenLedger) -> Amount {
        token.balance_of(&self.address).saturating_sub(self.total_locked)
    }

    /// Token value of a provider's shares
    pub fn provider_balance(&self, token: &TokenLedger, provider: &Address) -> Amount {
        if self.total_shares == 0 {
            return 0;
        }
        self.position(provider).shares * token.balance_of(&self.address) / self.total_shares
    }

    /// Deposit `amount` from `provider` and mint shares
    pub fn provide(
        &mut self,
        token: &mut TokenLedger,
        provider: Address,
        amount: Amount,
        now: Timestamp,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<u128> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let balance = token.balance_of(&self.address);
        let shares = if self.total_shares == 0 || balance == 0 {
            amount
        } else {
            amount * self.total_shares / balance
        };
        if shares == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        token.transfer(provider, self.address, amount, events)?;

        let position = self.providers.entry(provider).or_default();
        position.shares += shares;
        position.last_provide = now;
        self.total_shares += shares;

        info!(%provider, amount, shares, "liquidity provided");
        events.push(ProtocolEvent::Provide {
            account: provider,
            amount,
        });
        Ok(shares)
    }

    /// Withdraw `amount` of unlocked liquidity to `provider`
    pub fn withdraw(
        &mut self,
        token: &mut TokenLedger,
        provider: Address,
        amount: Amount,
        now: Timestamp,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<u128> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let position = self.position(&provider);
        let unlocks_at = position.last_provide + self.lockup_period;
        if now < unlocks_at {
            return Err(LedgerError::LockupNotExpired { unlocks_at });
        }
        let available = self.available_balance(token);
        if amount > available {
            return Err(LedgerError::AmountTooLarge {
                requested: amount,
                available,
            });
        }
        let balance = token.balance_of(&self.address);
        let burn = (amount * self.total_shares).div_ceil(balance);
        if burn > position.shares {
            return Err(LedgerError::InsufficientShares {
                available: position.shares,
                required: burn,
            });
        }

        token.transfer(self.address, provider, amount, events)?;
        if let Some(p) = self.providers.get_mut(&provider) {
            p.shares -= burn;
        }
        self.total_shares -= burn;

        info!(%provider, amount, burn, "liquidity withdrawn");
        events.push(ProtocolEvent::Withdraw {
            account: provider,
            amount,
        });
        Ok(burn)
    }

    /// Reserve `amount` of collateral for an option
    pub fn lock(
        &mut self,
        token: &TokenLedger,
        market: Address,
        option_id: OptionId,
        amount: Amount,
        premium: Amount,
    ) -> Result<()> {
        let key = (market, option_id);
        if self.locked.contains_key(&key) {
            return Err(LedgerError::AlreadyLocked(option_id));
        }
        let available = self.available_balance(token);
        if amount > available {
            return Err(LedgerError::AmountTooLarge {
                requested: amount,
                available,
            });
        }
        self.locked.insert(key, LockedLiquidity { amount, premium });
        self.total_locked += amount;
        debug!(%market, %option_id, amount, premium, "collateral locked");
        Ok(())
    }

    /// Release an option's collateral and pay `payout` to `to`
    ///
    /// Funds route through the options contract: the pool sends the full
    /// locked amount to `market`, `market` pays `payout` to `to` and returns
    /// the rest. The difference to the premium is reported as the pool's
    /// profit or loss.
    pub fn unlock_and_pay(
        &mut self,
        token: &mut TokenLedger,
        market: Address,
        option_id: OptionId,
        to: Address,
        payout: Amount,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<()> {
        let key = (market, option_id);
        let locked = self
            .locked
            .get(&key)
            .copied()
            .ok_or(LedgerError::NotLocked(option_id))?;
        let payout = payout.min(locked.amount);

        if payout > 0 {
            token.transfer(self.address, market, locked.amount, events)?;
            token.transfer(market, to, payout, events)?;
            token.transfer(market, self.address, locked.amount - payout, events)?;
        }

        self.locked.remove(&key);
        self.total_locked -= locked.amount;

        if payout > locked.premium {
            events.push(ProtocolEvent::LpLoss {
                id: option_id,
                amount: payout - locked.premium,
            });
        } else {
            events.push(ProtocolEvent::LpProfit {
                id: option_id,
                amount: locked.premium - payout,
            });
        }
        debug!(%market, %option_id, payout, "collateral released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        token: TokenLedger,
        pool: LiquidityPool,
        lp: Address,
        market: Address,
        events: Vec<ProtocolEvent>,
    }

    fn fixture() -> Fixture {
        let mut token = TokenLedger::new(Address([0xee; 20]), 1);
        let mut pool = LiquidityPool::new(Address([0xaa; 20]), 600);
        let lp = Address([1; 20]);
        let mut events = Vec::new();
        token.mint(lp, 1_000_000, &mut events).unwrap();
        pool.provide(&mut token, lp, 1_000_000, 0, &mut events).unwrap();
        Fixture {
            token,
            pool,
            lp,
            market: Address([0xbb; 20]),
            events,
        }
    }

    #[test]
    fn test_lock_respects_available_balance() {
        let mut f = fixture();
        f.pool.lock(&f.token, f.market, OptionId(0), 600_000, 300_000).unwrap();
        assert_eq!(f.pool.available_balance(&f.token), 400_000);

        let err = f
            .pool
            .lock(&f.token, f.market, OptionId(1), 400_001, 1)
            .unwrap_err();
        assert_eq!(err.to_string(), "Pool: Amount is too large");
        assert_eq!(
            f.pool.lock(&f.token, f.market, OptionId(0), 1, 1),
            Err(LedgerError::AlreadyLocked(OptionId(0)))
        );
    }

    #[test]
    fn test_winner_payout_reports_loss() {
        let mut f = fixture();
        let trader = Address([9; 20]);
        // premium arrives at open
        f.token.mint(f.pool.address(), 50, &mut f.events).unwrap();
        f.pool.lock(&f.token, f.market, OptionId(0), 100, 50).unwrap();

        let mut events = Vec::new();
        f.pool
            .unlock_and_pay(&mut f.token, f.market, OptionId(0), trader, 100, &mut events)
            .unwrap();

        assert_eq!(f.token.balance_of(&trader), 100);
        assert_eq!(f.pool.total_locked(), 0);
        assert_eq!(
            events.last(),
            Some(&ProtocolEvent::LpLoss {
                id: OptionId(0),
                amount: 50
            })
        );
    }

    #[test]
    fn test_loser_reports_profit_without_transfers() {
        let mut f = fixture();
        f.pool.lock(&f.token, f.market, OptionId(3), 100, 50).unwrap();
        let mut events = Vec::new();
        f.pool
            .unlock_and_pay(&mut f.token, f.market, OptionId(3), Address([9; 20]), 0, &mut events)
            .unwrap();
        assert_eq!(
            events,
            vec![ProtocolEvent::LpProfit {
                id: OptionId(3),
                amount: 50
            }]
        );
        assert!(f
            .pool
            .unlock_and_pay(&mut f.token, f.market, OptionId(3), Address([9; 20]), 0, &mut events)
            .is_err());
    }

    #[test]
    fn test_partial_payout_returns_remainder() {
        let mut f = fixture();
        let trader = Address([9; 20]);
        f.pool.lock(&f.token, f.market, OptionId(0), 100, 50).unwrap();
        let before = f.token.balance_of(&f.pool.address());
        let mut events = Vec::new();
        f.pool
            .unlock_and_pay(&mut f.token, f.market, OptionId(0), trader, 40, &mut events)
            .unwrap();

        assert_eq!(f.token.balance_of(&f.pool.address()), before - 40);
        assert_eq!(f.token.balance_of(&f.market), 0);
        assert_eq!(
            events.last(),
            Some(&ProtocolEvent::LpProfit {
                id: OptionId(0),
                amount: 10
            })
        );
    }

    #[test]
    fn test_withdraw_lockup_and_locked_funds() {
        let mut f = fixture();
        let lp = f.lp;
        let err = f.pool.withdraw(&mut f.token, lp, 10, 100, &mut f.events).unwrap_err();
        assert_eq!(err, LedgerError::LockupNotExpired { unlocks_at: 600 });

        f.pool.lock(&f.token, f.market, OptionId(0), 900_000, 0).unwrap();
        assert!(matches!(
            f.pool.withdraw(&mut f.token, lp, 200_000, 600, &mut f.events),
            Err(LedgerError::AmountTooLarge { .. })
        ));

        let burned = f.pool.withdraw(&mut f.token, lp, 100_000, 600, &mut f.events).unwrap();
        assert_eq!(burned, 100_000);
        assert_eq!(f.token.balance_of(&lp), 100_000);
        assert_eq!(f.pool.position(&lp).shares, 900_000);
    }
}
