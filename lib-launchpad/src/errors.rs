//! Trading Engine Errors
//!
//! Every variant is recoverable at the caller boundary. None of them should
//! take the engine process down.

use thiserror::Error;

use lib_fees::FeeError;
use lib_types::{Amount, Bps, ChainId, OrderId, TokenId};

use crate::storage::StorageError;

/// Error during quoting, order placement or settlement
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradingError {
    #[error("Insufficient liquidity: trade needs {requested} but only {available} is backed")]
    InsufficientLiquidity { requested: Amount, available: Amount },

    #[error("Price impact {impact_bps} bps exceeds max slippage {max_slippage_bps} bps")]
    SlippageExceeded { impact_bps: Bps, max_slippage_bps: Bps },

    #[error("Bonding curve inactive: {0} has graduated")]
    CurveInactive(TokenId),

    #[error("Unknown order: {0}")]
    UnknownOrder(OrderId),

    #[error(
        "Stale quote on order {order_id}: quoted {quoted}, settled {actual} ({deviation_bps} bps)"
    )]
    StaleQuoteMismatch {
        order_id: OrderId,
        quoted: Amount,
        actual: Amount,
        deviation_bps: Bps,
    },

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Token not found: {0}")]
    TokenNotFound(TokenId),

    #[error("Token with {field} `{value}` already exists on {chain}")]
    DuplicateToken {
        chain: ChainId,
        field: String,
        value: String,
    },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Contract `{contract}` unavailable on {chain}: {reason}")]
    ContractUnavailable {
        chain: ChainId,
        contract: String,
        reason: String,
    },

    #[error("Invalid order transition for {order_id}: {reason}")]
    InvalidTransition { order_id: OrderId, reason: String },

    #[error("Concurrent writer conflict on {token_id} after {attempts} attempts")]
    VersionConflict { token_id: TokenId, attempts: u32 },

    #[error("Fee error: {0}")]
    Fee(#[from] FeeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl TradingError {
    /// The caller can fix this by changing the request (amount, tolerance)
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            TradingError::InsufficientLiquidity { .. }
                | TradingError::SlippageExceeded { .. }
                | TradingError::ZeroAmount
                | TradingError::InvalidParameters(_)
                | TradingError::DuplicateToken { .. }
        )
    }

    /// Retrying the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TradingError::SlippageExceeded { .. }
                | TradingError::VersionConflict { .. }
                | TradingError::ContractUnavailable { .. }
                | TradingError::Storage(_)
        )
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TradingError::InsufficientLiquidity { .. } => "insufficient_liquidity",
            TradingError::SlippageExceeded { .. } => "slippage_exceeded",
            TradingError::CurveInactive(_) => "curve_inactive",
            TradingError::UnknownOrder(_) => "unknown_order",
            TradingError::StaleQuoteMismatch { .. } => "stale_quote_mismatch",
            TradingError::ZeroAmount => "zero_amount",
            TradingError::Overflow => "overflow",
            TradingError::TokenNotFound(_) => "token_not_found",
            TradingError::DuplicateToken { .. } => "duplicate_token",
            TradingError::InvalidParameters(_) => "invalid_parameters",
            TradingError::ContractUnavailable { .. } => "contract_unavailable",
            TradingError::InvalidTransition { .. } => "invalid_transition",
            TradingError::VersionConflict { .. } => "version_conflict",
            TradingError::Fee(_) => "fee",
            TradingError::Storage(_) => "storage",
        }
    }
}

/// Result type for trading operations
pub type TradingResult<T> = Result<T, TradingError>;
