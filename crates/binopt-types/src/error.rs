//! Error types for the foundation layer

use thiserror::Error;

/// Result type for foundation operations
pub type Result<T> = std::result::Result<T, TypesError>;

/// Errors raised while parsing or constructing foundation types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Input was not valid hex
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Decoded bytes have the wrong length
    #[error("Invalid length for {kind}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}
