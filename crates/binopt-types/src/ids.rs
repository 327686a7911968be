//! Identifier types
//!
//! Queue ids are chosen by the submitter and are global across markets.
//! Option ids are assigned by the engine and are monotonic per options
//! contract.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate numeric ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[derive(Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create from a raw value
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Raw value
            pub const fn value(&self) -> u64 {
                self.0
            }

            /// The id following this one
            pub const fn next(&self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

define_id_type!(QueueId, "queue", "Identifier of a trade intent in the resolver queue");
define_id_type!(OptionId, "option", "Identifier of an option within its options contract");
define_id_type!(TraderNftId, "nft", "Identifier of a trader NFT (0 means none)");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_next() {
        let id = OptionId::new(0);
        assert_eq!(id.next(), OptionId(1));
        assert_eq!(id.to_string(), "option_0");
        assert_eq!(QueueId::from(7).to_string(), "queue_7");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&QueueId(42)).unwrap();
        assert_eq!(json, "42");
    }
}
