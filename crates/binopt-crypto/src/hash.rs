//! Hashing utilities

use binopt_types::Address;
use sha3::{Digest, Keccak256};

/// Keccak-256 of a byte slice
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Keccak-256 over several byte slices, as if concatenated
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Hash of `"\x19Ethereum Signed Message:\n32" || hash` (EIP-191 personal sign)
pub fn eth_signed_message_hash(hash: &[u8; 32]) -> [u8; 32] {
    keccak256_concat(&[b"\x19Ethereum Signed Message:\n32", hash])
}

/// Deterministic address for a named contract
///
/// Contracts in the engine have no deployer, so their addresses are derived
/// from a label: `keccak256(label)[12..]`.
pub fn contract_address(label: &str) -> Address {
    let hash = keccak256(label.as_bytes());
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Address(out)
}

/// Hex-encode a hash with `0x` prefix
pub fn hash_to_hex(hash: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hash_to_hex(&keccak256(b"")),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak_concat_matches_single() {
        assert_eq!(keccak256_concat(&[b"hello ", b"world"]), keccak256(b"hello world"));
    }

    #[test]
    fn test_contract_address_is_stable() {
        let a = contract_address("router");
        assert_eq!(a, contract_address("router"));
        assert_ne!(a, contract_address("registrar"));
        assert!(!a.is_zero());
    }
}
