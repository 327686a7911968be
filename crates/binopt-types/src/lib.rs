//! binopt Types - Canonical domain types for the binary-options engine
//!
//! This crate contains all foundational types with zero dependencies on other
//! binopt crates. It defines:
//!
//! - Addresses, signatures and identifier types
//! - Trade intents and the requests that carry them to the resolver
//! - Option positions and their lifecycle states
//! - Protocol events, failure reasons and cancel codes
//!
//! # Invariants
//!
//! 1. Queue ids and user signatures are single-use once a trade opens
//! 2. Failed attempts never consume a queue id or a signature
//! 3. Open interest never exceeds the configured pool or market caps
//! 4. A settled option is terminal and cannot be settled again

pub mod address;
pub mod ids;
pub mod trade;
pub mod option;
pub mod event;
pub mod error;

pub use address::*;
pub use ids::*;
pub use trade::*;
pub use option::*;
pub use event::*;
pub use error::*;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Token amount in base units
pub type Amount = u128;

/// Decimals of the quote token (USDC style)
pub const TOKEN_DECIMALS: u32 = 6;

/// Decimals of publisher prices
pub const PRICE_DECIMALS: u32 = 8;
