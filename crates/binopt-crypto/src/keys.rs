//! secp256k1 keys, Ethereum-style signing and address recovery

use crate::hash::keccak256;
use crate::{CryptoError, CryptoResult};
use binopt_types::{Address, EcdsaSignature};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint as _;

/// A secp256k1 signing key with a cached EVM address
///
/// Used for users, one-click keys and publishers alike.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
    address: Address,
}

impl Signer {
    /// Create from 32 bytes of secret key material
    pub fn from_bytes(secret: &[u8; 32]) -> CryptoResult<Self> {
        let key = SigningKey::from_bytes(secret.into())
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        Ok(Self::from_key(key))
    }

    /// Parse a hex-encoded private key (with or without `0x`)
    pub fn from_hex(secret: &str) -> CryptoResult<Self> {
        let secret = secret.strip_prefix("0x").unwrap_or(secret);
        let bytes = hex::decode(secret).map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyFormat(format!("expected 32 bytes, got {}", bytes.len())))?;
        Self::from_bytes(&array)
    }

    /// Generate a fresh random key
    pub fn random() -> Self {
        Self::from_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Deterministic key for a label (stable test and demo identities)
    pub fn from_label(label: &str) -> CryptoResult<Self> {
        let seed = blake3::derive_key("binopt deterministic secp256k1 key v1", label.as_bytes());
        Self::from_bytes(&seed)
    }

    fn from_key(key: SigningKey) -> Self {
        let address = address_from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest, returning `r || s || v` with `v` in {27, 28}
    pub fn sign_digest(&self, digest: &[u8; 32]) -> CryptoResult<EcdsaSignature> {
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recovery_id.to_byte() + 27;
        Ok(EcdsaSignature(out))
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").field("address", &self.address).finish()
    }
}

/// EVM address of a public key: `keccak256(uncompressed_pubkey[1..])[12..]`
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Address(out)
}

/// Recover the address that produced `signature` over `digest`
///
/// Accepts `v` as 27/28 or as a raw recovery id 0/1.
pub fn recover_address(digest: &[u8; 32], signature: &EcdsaSignature) -> CryptoResult<Address> {
    let v = signature.v();
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id =
        RecoveryId::from_byte(recovery_byte).ok_or(CryptoError::InvalidRecoveryId(v))?;
    let sig = Signature::from_slice(&signature.as_bytes()[..64])
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
    Ok(address_from_verifying_key(&key))
}
