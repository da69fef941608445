//! Parse errors for primitive types

use thiserror::Error;

/// Error while parsing a primitive from its text form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Invalid contract address: {0}")]
    InvalidAddress(String),

    #[error("Invalid token id (expected `chain:0x<40 hex>`): {0}")]
    InvalidTokenId(String),

    #[error("Invalid order id: {0}")]
    InvalidOrderId(String),
}
