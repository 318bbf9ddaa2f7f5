//! Error types for ABI mapping, encoding and decoding.

use thiserror::Error;

/// Errors raised while mapping an ABI or encoding/decoding against it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    /// An ABI entry is missing a required field or declares an invalid type.
    #[error("Malformed ABI: {reason}")]
    MalformedAbi { reason: String },

    /// The number of supplied arguments differs from the declared inputs.
    #[error("Invalid number of arguments for {method}: expected {expected}, got {got}")]
    ArgumentCountMismatch {
        method: String,
        expected: usize,
        got: usize,
    },

    /// An argument cannot be converted to its declared Solidity type.
    #[error("Invalid value for parameter '{param}': {reason}")]
    InvalidValue { param: String, reason: String },

    /// ABI-encoded bytes could not be decoded with the expected types.
    #[error("ABI decode failed: {reason}")]
    DecodeFailed { reason: String },

    /// A log is structurally inconsistent with its event definition.
    #[error("Invalid log: {reason}")]
    InvalidLog { reason: String },

    #[error("Invalid hex: {reason}")]
    InvalidHex { reason: String },
}

impl From<serde_json::Error> for AbiError {
    fn from(e: serde_json::Error) -> Self {
        AbiError::MalformedAbi {
            reason: format!("invalid ABI JSON: {e}"),
        }
    }
}
