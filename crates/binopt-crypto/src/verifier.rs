//! Signature verification seam
//!
//! The engine never calls ECDSA recovery directly. It asks a
//! [`SignatureVerifier`] whether a signature over a digest belongs to an
//! expected signer, so tests can swap recovery for a deterministic table.

use crate::keys::recover_address;
use crate::messages::MessageKind;
use binopt_types::{Address, EcdsaSignature};
use std::collections::HashMap;
use tracing::debug;

/// Decides whether `signature` over `digest` was produced by `expected`
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        kind: MessageKind,
        digest: &[u8; 32],
        signature: &EcdsaSignature,
        expected: &Address,
    ) -> bool;
}

/// Production verifier backed by secp256k1 public-key recovery
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaVerifier;

impl SignatureVerifier for EcdsaVerifier {
    fn verify(
        &self,
        kind: MessageKind,
        digest: &[u8; 32],
        signature: &EcdsaSignature,
        expected: &Address,
    ) -> bool {
        if expected.is_zero() {
            return false;
        }
        match recover_address(digest, signature) {
            Ok(recovered) => {
                let ok = recovered == *expected;
                if !ok {
                    debug!(%kind, %recovered, %expected, "signer mismatch");
                }
                ok
            }
            Err(e) => {
                debug!(%kind, error = %e, "signature recovery failed");
                false
            }
        }
    }
}

/// Deterministic verifier for tests: a digest is valid only for the signer
/// it was approved for
#[derive(Debug, Clone, Default)]
pub struct FixtureVerifier {
    approved: HashMap<(MessageKind, [u8; 32]), Address>,
}

impl FixtureVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `digest` of `kind` as signed by `signer`
    pub fn approve(&mut self, kind: MessageKind, digest: [u8; 32], signer: Address) {
        self.approved.insert((kind, digest), signer);
    }

    pub fn len(&self) -> usize {
        self.approved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.approved.is_empty()
    }
}

impl SignatureVerifier for FixtureVerifier {
    fn verify(
        &self,
        kind: MessageKind,
        digest: &[u8; 32],
        _signature: &EcdsaSignature,
        expected: &Address,
    ) -> bool {
        !expected.is_zero() && self.approved.get(&(kind, *digest)) == Some(expected)
    }
}
