//! binopt Registrar - One-click trading key registry
//!
//! A user authorizes a secondary "one-click" key to sign trades on their
//! behalf by signing a `RegisterAccount` message with their own key. The
//! registrar keeps one mapping per user:
//!
//! ```text
//! Unregistered ──register──▶ Registered(key) ──deregister──▶ Unregistered
//!                              │        ▲
//!                              └────────┘ register(same key): no-op
//! ```
//!
//! # Invariants
//!
//! 1. Every state change bumps the user's nonce, invalidating old signatures
//! 2. A user has at most one one-click key at a time
//! 3. Deregistration resets the key to the zero address

use binopt_crypto::{
    typed_data_hash, DeregisterAccountMessage, Domain, MessageKind, RegisterAccountMessage,
    SignatureVerifier,
};
use binopt_types::{Address, EcdsaSignature, ProtocolEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur in registrar operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrarError {
    #[error("Router: Wrong register signature")]
    InvalidSignature { user: Address },

    #[error("Router: Account already registered")]
    AlreadyRegistered { user: Address, one_ct: Address },

    #[error("Account {user} is not registered")]
    NotRegistered { user: Address },

    #[error("One-click key cannot be the zero address")]
    ZeroKey,
}

pub type Result<T> = std::result::Result<T, RegistrarError>;

/// A user's registration state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMapping {
    /// Registered one-click key, zero when unregistered
    pub one_ct: Address,
    /// Count of successful register/deregister operations
    pub nonce: u64,
}

impl AccountMapping {
    pub fn is_registered(&self) -> bool {
        !self.one_ct.is_zero()
    }
}

/// What a `register` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    /// The key was already mapped; nothing changed
    Unchanged,
}

/// The registrar
#[derive(Debug, Clone)]
pub struct AccountRegistrar {
    address: Address,
    chain_id: u64,
    accounts: HashMap<Address, AccountMapping>,
}

impl AccountRegistrar {
    pub fn new(address: Address, chain_id: u64) -> Self {
        Self {
            address,
            chain_id,
            accounts: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn domain(&self) -> Domain {
        Domain::validator(self.chain_id, self.address)
    }

    /// Current mapping for `user` (default when never seen)
    pub fn account_mapping(&self, user: &Address) -> AccountMapping {
        self.accounts.get(user).copied().unwrap_or_default()
    }

    /// Registered one-click key, zero when unregistered
    pub fn one_ct(&self, user: &Address) -> Address {
        self.account_mapping(user).one_ct
    }

    /// Digest `user` signs to register `one_ct` at `nonce`
    pub fn register_digest(&self, user: Address, one_ct: Address, nonce: u64) -> [u8; 32] {
        typed_data_hash(
            &self.domain(),
            &RegisterAccountMessage {
                one_ct,
                user,
                nonce,
            },
        )
    }

    /// Digest `user` signs to deregister at `nonce`
    pub fn deregister_digest(&self, user: Address, nonce: u64) -> [u8; 32] {
        typed_data_hash(&self.domain(), &DeregisterAccountMessage { user, nonce })
    }

    /// Map `one_ct` to `user`, authorized by `signature` from `user`
    pub fn register(
        &mut self,
        user: Address,
        one_ct: Address,
        signature: &EcdsaSignature,
        verifier: &dyn SignatureVerifier,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<RegistrationOutcome> {
        if one_ct.is_zero() {
            return Err(RegistrarError::ZeroKey);
        }
        let mapping = self.account_mapping(&user);
        if mapping.one_ct == one_ct {
            debug!(%user, %one_ct, "one-click key already registered");
            return Ok(RegistrationOutcome::Unchanged);
        }
        if mapping.is_registered() {
            warn!(%user, current = %mapping.one_ct, "register rejected, account already registered");
            return Err(RegistrarError::AlreadyRegistered {
                user,
                one_ct: mapping.one_ct,
            });
        }

        let digest = self.register_digest(user, one_ct, mapping.nonce);
        if !verifier.verify(MessageKind::RegisterAccount, &digest, signature, &user) {
            warn!(%user, nonce = mapping.nonce, "register rejected, bad signature");
            return Err(RegistrarError::InvalidSignature { user });
        }

        self.accounts.insert(
            user,
            AccountMapping {
                one_ct,
                nonce: mapping.nonce + 1,
            },
        );
        info!(%user, %one_ct, "account registered");
        events.push(ProtocolEvent::RegisterAccount { user, one_ct });
        Ok(RegistrationOutcome::Registered)
    }

    /// Clear `user`'s one-click key, authorized by `signature` from `user`
    pub fn deregister(
        &mut self,
        user: Address,
        signature: &EcdsaSignature,
        verifier: &dyn SignatureVerifier,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<()> {
        let mapping = self.account_mapping(&user);
        if !mapping.is_registered() {
            return Err(RegistrarError::NotRegistered { user });
        }
        let digest = self.deregister_digest(user, mapping.nonce);
        if !verifier.verify(MessageKind::DeregisterAccount, &digest, signature, &user) {
            warn!(%user, nonce = mapping.nonce, "deregister rejected, bad signature");
            return Err(RegistrarError::InvalidSignature { user });
        }

        self.accounts.insert(
            user,
            AccountMapping {
                one_ct: Address::ZERO,
                nonce: mapping.nonce + 1,
            },
        );
        info!(%user, "account deregistered");
        events.push(ProtocolEvent::DeregisterAccount { user });
        Ok(())
    }

    /// Every known mapping
    pub fn mappings(&self) -> impl Iterator<Item = (&Address, &AccountMapping)> {
        self.accounts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binopt_crypto::{EcdsaVerifier, Signer};

    fn registrar() -> AccountRegistrar {
        AccountRegistrar::new(Address([0x42; 20]), 1)
    }

    fn register_sig(reg: &AccountRegistrar, user: &Signer, one_ct: Address) -> EcdsaSignature {
        let nonce = reg.account_mapping(&user.address()).nonce;
        user.sign_digest(&reg.register_digest(user.address(), one_ct, nonce))
            .unwrap()
    }

    #[test]
    fn test_register_sets_key_and_bumps_nonce() {
        let mut reg = registrar();
        let user = Signer::random();
        let one_ct = Signer::random();
        let mut events = Vec::new();

        let sig = register_sig(&reg, &user, one_ct.address());
        let outcome = reg
            .register(user.address(), one_ct.address(), &sig, &EcdsaVerifier, &mut events)
            .unwrap();

        assert_eq!(outcome, RegistrationOutcome::Registered);
        assert_eq!(
            reg.account_mapping(&user.address()),
            AccountMapping {
                one_ct: one_ct.address(),
                nonce: 1
            }
        );
        assert_eq!(
            events,
            vec![ProtocolEvent::RegisterAccount {
                user: user.address(),
                one_ct: one_ct.address()
            }]
        );
    }

    #[test]
    fn test_register_same_key_is_noop() {
        let mut reg = registrar();
        let user = Signer::random();
        let one_ct = Signer::random();
        let mut events = Vec::new();

        let sig = register_sig(&reg, &user, one_ct.address());
        reg.register(user.address(), one_ct.address(), &sig, &EcdsaVerifier, &mut events)
            .unwrap();

        // Stale signature is fine: nothing is verified when nothing changes
        let outcome = reg
            .register(user.address(), one_ct.address(), &sig, &EcdsaVerifier, &mut events)
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Unchanged);
        assert_eq!(reg.account_mapping(&user.address()).nonce, 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_register_different_key_rejected() {
        let mut reg = registrar();
        let user = Signer::random();
        let first = Signer::random();
        let second = Signer::random();
        let mut events = Vec::new();

        let sig = register_sig(&reg, &user, first.address());
        reg.register(user.address(), first.address(), &sig, &EcdsaVerifier, &mut events)
            .unwrap();

        let sig = register_sig(&reg, &user, second.address());
        let err = reg
            .register(user.address(), second.address(), &sig, &EcdsaVerifier, &mut events)
            .unwrap_err();
        assert_eq!(err.to_string(), "Router: Account already registered");
        assert_eq!(reg.one_ct(&user.address()), first.address());
    }

    #[test]
    fn test_register_wrong_signer() {
        let mut reg = registrar();
        let user = Signer::random();
        let attacker = Signer::random();
        let one_ct = Signer::random();
        let mut events = Vec::new();

        let sig = register_sig(&reg, &attacker, one_ct.address());
        let err = reg
            .register(user.address(), one_ct.address(), &sig, &EcdsaVerifier, &mut events)
            .unwrap_err();
        assert_eq!(err, RegistrarError::InvalidSignature { user: user.address() });
        assert_eq!(reg.account_mapping(&user.address()), AccountMapping::default());
    }

    #[test]
    fn test_deregister_then_reregister() {
        let mut reg = registrar();
        let user = Signer::random();
        let first = Signer::random();
        let second = Signer::random();
        let mut events = Vec::new();

        let sig = register_sig(&reg, &user, first.address());
        reg.register(user.address(), first.address(), &sig, &EcdsaVerifier, &mut events)
            .unwrap();

        let dereg_sig = user
            .sign_digest(&reg.deregister_digest(user.address(), 1))
            .unwrap();
        reg.deregister(user.address(), &dereg_sig, &EcdsaVerifier, &mut events)
            .unwrap();
        assert_eq!(
            reg.account_mapping(&user.address()),
            AccountMapping {
                one_ct: Address::ZERO,
                nonce: 2
            }
        );

        // Replaying the deregistration fails: nothing to deregister
        assert!(reg
            .deregister(user.address(), &dereg_sig, &EcdsaVerifier, &mut events)
            .is_err());

        // The first registration signature was for nonce 0 and is now stale
        let stale = user
            .sign_digest(&reg.register_digest(user.address(), second.address(), 0))
            .unwrap();
        assert!(reg
            .register(user.address(), second.address(), &stale, &EcdsaVerifier, &mut events)
            .is_err());

        let sig = register_sig(&reg, &user, second.address());
        reg.register(user.address(), second.address(), &sig, &EcdsaVerifier, &mut events)
            .unwrap();
        assert_eq!(reg.account_mapping(&user.address()).nonce, 3);
        assert_eq!(reg.one_ct(&user.address()), second.address());
    }
}
