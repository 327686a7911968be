//! ERC-20 style token ledger with EIP-2612 permits

use crate::{LedgerError, Result};
use binopt_crypto::{typed_data_hash, Domain, MessageKind, PermitMessage, SignatureVerifier};
use binopt_types::{Address, Amount, EcdsaSignature, ProtocolEvent, Timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Unique identifier for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(format!("entry_{}", Uuid::new_v4()))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Credit,
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// Test or faucet funding
    Mint,
    /// Movement between two accounts
    Transfer { counterparty: Address },
}

/// A single ledger entry (one side of a movement)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account: Address,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub balance_after: Amount,
    pub reason: EntryReason,
    /// Shared by both sides of one transfer
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

/// The quote token
#[derive(Debug, Clone)]
pub struct TokenLedger {
    address: Address,
    chain_id: u64,
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    nonces: HashMap<Address, u64>,
    total_supply: Amount,
    entries: Vec<LedgerEntry>,
}

impl TokenLedger {
    pub fn new(address: Address, chain_id: u64) -> Self {
        Self {
            address,
            chain_id,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            nonces: HashMap::new(),
            total_supply: 0,
            entries: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Current permit nonce of `owner`
    pub fn nonces(&self, owner: &Address) -> u64 {
        self.nonces.get(owner).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Domain permits are signed under
    pub fn domain(&self) -> Domain {
        Domain::token(self.chain_id, self.address)
    }

    fn record(
        &mut self,
        account: Address,
        entry_type: EntryType,
        amount: Amount,
        balance_after: Amount,
        reason: EntryReason,
        correlation_id: &str,
    ) {
        self.entries.push(LedgerEntry {
            entry_id: EntryId::new(),
            account,
            entry_type,
            amount,
            balance_after,
            reason,
            correlation_id: correlation_id.to_string(),
            created_at: Utc::now(),
        });
    }

    /// Create new tokens for `to`
    pub fn mint(&mut self, to: Address, amount: Amount, events: &mut Vec<ProtocolEvent>) -> Result<()> {
        let new_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        self.balances.insert(to, new_balance);
        self.total_supply = new_supply;
        let correlation_id = Uuid::new_v4().to_string();
        self.record(to, EntryType::Credit, amount, new_balance, EntryReason::Mint, &correlation_id);
        events.push(ProtocolEvent::Transfer {
            from: Address::ZERO,
            to,
            value: amount,
        });
        Ok(())
    }

    /// Move `value` from `from` to `to`
    ///
    /// Zero-value transfers succeed without effect.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        value: Amount,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<()> {
        if value == 0 {
            return Ok(());
        }
        let available = self.balance_of(&from);
        if available < value {
            return Err(LedgerError::InsufficientBalance {
                account: from,
                available,
                required: value,
            });
        }
        if from == to {
            events.push(ProtocolEvent::Transfer { from, to, value });
            return Ok(());
        }
        let to_balance = self
            .balance_of(&to)
            .checked_add(value)
            .ok_or(LedgerError::Overflow)?;
        let from_balance = available - value;

        self.balances.insert(from, from_balance);
        self.balances.insert(to, to_balance);

        let correlation_id = Uuid::new_v4().to_string();
        self.record(
            from,
            EntryType::Debit,
            value,
            from_balance,
            EntryReason::Transfer { counterparty: to },
            &correlation_id,
        );
        self.record(
            to,
            EntryType::Credit,
            value,
            to_balance,
            EntryReason::Transfer { counterparty: from },
            &correlation_id,
        );
        debug!(%from, %to, value, "token transfer");
        events.push(ProtocolEvent::Transfer { from, to, value });
        Ok(())
    }

    /// Move `value` from `from` to `to` using `spender`'s allowance
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        value: Amount,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<()> {
        let allowance = self.allowance(&from, &spender);
        if allowance < value {
            return Err(LedgerError::InsufficientAllowance {
                owner: from,
                spender,
                allowance,
                required: value,
            });
        }
        self.transfer(from, to, value, events)?;
        if allowance != Amount::MAX {
            self.allowances.insert((from, spender), allowance - value);
        }
        Ok(())
    }

    /// Set `spender`'s allowance over `owner`'s funds
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        value: Amount,
        events: &mut Vec<ProtocolEvent>,
    ) {
        self.allowances.insert((owner, spender), value);
        events.push(ProtocolEvent::Approval {
            owner,
            spender,
            value,
        });
    }

    /// Digest `owner` signs to approve `spender` for `value` at `nonce`
    pub fn permit_digest(
        &self,
        owner: Address,
        spender: Address,
        value: Amount,
        nonce: u64,
        deadline: Timestamp,
    ) -> [u8; 32] {
        let message = PermitMessage {
            owner,
            spender,
            value,
            nonce,
            deadline,
        };
        typed_data_hash(&self.domain(), &message)
    }

    /// Apply an EIP-2612 permit signed by `owner`
    ///
    /// The signature must cover the owner's current nonce; on success the
    /// nonce advances, so the same signature cannot be replayed.
    #[allow(clippy::too_many_arguments)]
    pub fn permit(
        &mut self,
        owner: Address,
        spender: Address,
        value: Amount,
        deadline: Timestamp,
        signature: &EcdsaSignature,
        now: Timestamp,
        verifier: &dyn SignatureVerifier,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<()> {
        if now > deadline {
            return Err(LedgerError::PermitExpired { deadline, now });
        }
        let nonce = self.nonces(&owner);
        let digest = self.permit_digest(owner, spender, value, nonce, deadline);
        if !verifier.verify(MessageKind::Permit, &digest, signature, &owner) {
            return Err(LedgerError::PermitInvalidSignature);
        }
        self.nonces.insert(owner, nonce + 1);
        self.approve(owner, spender, value, events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binopt_crypto::{EcdsaVerifier, Signer};

    fn token() -> TokenLedger {
        TokenLedger::new(Address([0xee; 20]), 1)
    }

    #[test]
    fn test_mint_and_transfer() {
        let mut token = token();
        let mut events = Vec::new();
        let alice = Address([1; 20]);
        let bob = Address([2; 20]);

        token.mint(alice, 100, &mut events).unwrap();
        token.transfer(alice, bob, 40, &mut events).unwrap();

        assert_eq!(token.balance_of(&alice), 60);
        assert_eq!(token.balance_of(&bob), 40);
        assert_eq!(token.total_supply(), 100);
        assert_eq!(token.entries().len(), 3);
        assert_eq!(
            events.last(),
            Some(&ProtocolEvent::Transfer {
                from: alice,
                to: bob,
                value: 40
            })
        );
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut token = token();
        let mut events = Vec::new();
        let alice = Address([1; 20]);
        token.mint(alice, 10, &mut events).unwrap();

        let err = token.transfer(alice, Address([2; 20]), 11, &mut events).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                account: alice,
                available: 10,
                required: 11
            }
        );
        assert_eq!(token.balance_of(&alice), 10);
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut token = token();
        let mut events = Vec::new();
        let alice = Address([1; 20]);
        let router = Address([3; 20]);
        let pool = Address([4; 20]);
        token.mint(alice, 100, &mut events).unwrap();

        assert!(token.transfer_from(router, alice, pool, 10, &mut events).is_err());

        token.approve(alice, router, 30, &mut events);
        token.transfer_from(router, alice, pool, 10, &mut events).unwrap();
        assert_eq!(token.allowance(&alice, &router), 20);
        assert_eq!(token.balance_of(&pool), 10);
    }

    #[test]
    fn test_permit_nonce_replay() {
        let mut token = token();
        let mut events = Vec::new();
        let owner = Signer::random();
        let spender = Address([3; 20]);
        let verifier = EcdsaVerifier;

        let digest = token.permit_digest(owner.address(), spender, 500, 0, 1000);
        let sig = owner.sign_digest(&digest).unwrap();

        token
            .permit(owner.address(), spender, 500, 1000, &sig, 10, &verifier, &mut events)
            .unwrap();
        assert_eq!(token.allowance(&owner.address(), &spender), 500);
        assert_eq!(token.nonces(&owner.address()), 1);

        let replay = token.permit(owner.address(), spender, 500, 1000, &sig, 10, &verifier, &mut events);
        assert_eq!(replay, Err(LedgerError::PermitInvalidSignature));
        assert_eq!(token.nonces(&owner.address()), 1);
    }

    #[test]
    fn test_permit_expired() {
        let mut token = token();
        let mut events = Vec::new();
        let owner = Signer::random();
        let spender = Address([3; 20]);
        let digest = token.permit_digest(owner.address(), spender, 1, 0, 100);
        let sig = owner.sign_digest(&digest).unwrap();

        let err = token
            .permit(owner.address(), spender, 1, 100, &sig, 101, &EcdsaVerifier, &mut events)
            .unwrap_err();
        assert_eq!(err.to_string(), "ERC20Permit: expired deadline");
        assert_eq!(token.nonces(&owner.address()), 0);
    }
}
