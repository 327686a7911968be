//! binopt Crypto - Signature validation primitives
//!
//! This crate provides:
//! - Hashing (keccak256, EIP-191 personal-sign prefix)
//! - EIP-712 typed-data hashing for every message the protocol signs
//! - secp256k1 signing with Ethereum `r || s || v` layout
//! - ECDSA public-key recovery
//! - A pluggable [`SignatureVerifier`] seam with a production and a fixture implementation
//!
//! # Security Invariant
//!
//! **A signature is only ever accepted if it recovers to the expected,
//! non-zero address.**

pub mod hash;
pub mod eip712;
pub mod messages;
pub mod keys;
pub mod verifier;

pub use hash::*;
pub use eip712::*;
pub use messages::*;
pub use keys::*;
pub use verifier::*;

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
