//! Fixed-size byte types: EVM addresses and recoverable ECDSA signatures
//!
//! Both render as `0x`-prefixed lowercase hex and serialize as hex strings.

use crate::error::{Result, TypesError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Macro to generate hex-encoded fixed-size byte types
macro_rules! define_hex_bytes {
    ($name:ident, $len:literal, $kind:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Byte length
            pub const LEN: usize = $len;

            /// Build from a slice of exactly `LEN` bytes
            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                let array: [u8; $len] =
                    bytes.try_into().map_err(|_| TypesError::InvalidLength {
                        kind: $kind,
                        expected: $len,
                        actual: bytes.len(),
                    })?;
                Ok(Self(array))
            }

            /// Parse from hex, with or without the `0x` prefix
            pub fn parse(s: &str) -> Result<Self> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }

            /// Raw bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_hex_bytes!(Address, 20, "address", "20-byte EVM account or contract address");
define_hex_bytes!(
    EcdsaSignature,
    65,
    "signature",
    "Recoverable secp256k1 signature laid out as `r || s || v`"
);

impl Address {
    /// The null address; an unregistered one-click key maps here
    pub const ZERO: Address = Address([0u8; 20]);

    /// Whether this is the null address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::ZERO
    }
}

impl EcdsaSignature {
    /// Recovery byte `v`
    pub fn v(&self) -> u8 {
        self.0[64]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_display() {
        let addr = Address([0xab; 20]);
        let s = addr.to_string();
        assert_eq!(s, format!("0x{}", "ab".repeat(20)));
        assert_eq!(Address::parse(&s).unwrap(), addr);
        assert_eq!(s.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        let err = Address::parse("0x1234").unwrap_err();
        assert_eq!(
            err,
            TypesError::InvalidLength {
                kind: "address",
                expected: 20,
                actual: 2
            }
        );
        assert!(matches!(Address::parse("0xzz"), Err(TypesError::InvalidHex(_))));
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(Address::default().is_zero());
        assert!(!Address([1; 20]).is_zero());
    }

    #[test]
    fn test_signature_serde_as_hex() {
        let mut bytes = [7u8; 65];
        bytes[64] = 28;
        let sig = EcdsaSignature(bytes);
        let json = serde_json::to_string(&sig).unwrap();
        assert!(json.starts_with("\"0x0707"));
        let back: EcdsaSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
        assert_eq!(back.v(), 28);
    }
}
