//! Bonding Curve Types
//!
//! Reserve snapshots, quotes and curve statistics.
//!
//! # Lifecycle
//! ```text
//!   ┌────────┐     market cap ≥ threshold     ┌───────────┐
//!   │ Active │ ─────────────────────────────▶ │ Graduated │
//!   └────────┘         (irreversible)          └───────────┘
//! ```
//!
//! `ReserveState` is immutable: every transition returns a new value built
//! through the same validation as `ReserveStateBuilder`.

use serde::{Deserialize, Serialize};

use lib_types::{Amount, Bps, TokenId};

use crate::errors::{TradingError, TradingResult};

/// Curve lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Curve pricing active, trades accepted
    Active,
    /// Threshold met, curve frozen
    Graduated,
}

impl Phase {
    pub fn is_curve_active(&self) -> bool {
        matches!(self, Phase::Active)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Active => write!(f, "active"),
            Phase::Graduated => write!(f, "graduated"),
        }
    }
}

/// Trade direction, from the user's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// ETH in, tokens out
    Buy,
    /// Tokens in, ETH out
    Sell,
}

impl TradeSide {
    /// Contract method that settles this side
    pub fn contract_method(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buyTokens",
            TradeSide::Sell => "sellTokens",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

// ============================================================================
// RESERVES
// ============================================================================

/// Snapshot of one token's curve reserves
///
/// # Invariants
/// - virtual reserves are strictly positive
/// - each real reserve is at most its virtual counterpart
/// - a graduated snapshot never returns to active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveState {
    token_id: TokenId,
    virtual_token_reserves: Amount,
    virtual_eth_reserves: Amount,
    real_token_reserves: Amount,
    real_eth_reserves: Amount,
    is_graduated: bool,
}

impl ReserveState {
    pub fn builder(token_id: TokenId) -> ReserveStateBuilder {
        ReserveStateBuilder::new(token_id)
    }

    pub fn token_id(&self) -> TokenId {
        self.token_id
    }

    pub fn virtual_token_reserves(&self) -> Amount {
        self.virtual_token_reserves
    }

    pub fn virtual_eth_reserves(&self) -> Amount {
        self.virtual_eth_reserves
    }

    pub fn real_token_reserves(&self) -> Amount {
        self.real_token_reserves
    }

    pub fn real_eth_reserves(&self) -> Amount {
        self.real_eth_reserves
    }

    pub fn is_graduated(&self) -> bool {
        self.is_graduated
    }

    pub fn phase(&self) -> Phase {
        if self.is_graduated {
            Phase::Graduated
        } else {
            Phase::Active
        }
    }

    /// Constant-product invariant `k = vT × vE`
    pub fn k(&self) -> Option<Amount> {
        self.virtual_token_reserves
            .checked_mul(self.virtual_eth_reserves)
    }

    /// Same reserves, frozen
    pub fn graduated(&self) -> ReserveState {
        ReserveState {
            is_graduated: true,
            ..*self
        }
    }

    /// Copy with new reserve values, revalidated
    pub(crate) fn with_reserves(
        &self,
        virtual_token_reserves: Amount,
        virtual_eth_reserves: Amount,
        real_token_reserves: Amount,
        real_eth_reserves: Amount,
    ) -> TradingResult<ReserveState> {
        ReserveStateBuilder {
            token_id: self.token_id,
            virtual_token_reserves,
            virtual_eth_reserves,
            real_token_reserves,
            real_eth_reserves,
            is_graduated: self.is_graduated,
        }
        .build()
    }
}

/// Validated constructor for `ReserveState`
#[derive(Debug, Clone)]
pub struct ReserveStateBuilder {
    token_id: TokenId,
    virtual_token_reserves: Amount,
    virtual_eth_reserves: Amount,
    real_token_reserves: Amount,
    real_eth_reserves: Amount,
    is_graduated: bool,
}

impl ReserveStateBuilder {
    pub fn new(token_id: TokenId) -> Self {
        Self {
            token_id,
            virtual_token_reserves: Amount::zero(),
            virtual_eth_reserves: Amount::zero(),
            real_token_reserves: Amount::zero(),
            real_eth_reserves: Amount::zero(),
            is_graduated: false,
        }
    }

    pub fn virtual_reserves(mut self, tokens: Amount, eth: Amount) -> Self {
        self.virtual_token_reserves = tokens;
        self.virtual_eth_reserves = eth;
        self
    }

    pub fn real_reserves(mut self, tokens: Amount, eth: Amount) -> Self {
        self.real_token_reserves = tokens;
        self.real_eth_reserves = eth;
        self
    }

    pub fn graduated(mut self, is_graduated: bool) -> Self {
        self.is_graduated = is_graduated;
        self
    }

    pub fn build(self) -> TradingResult<ReserveState> {
        if self.virtual_token_reserves.is_zero() || self.virtual_eth_reserves.is_zero() {
            return Err(TradingError::InvalidParameters(
                "virtual reserves must be positive".to_string(),
            ));
        }
        if self.real_token_reserves > self.virtual_token_reserves {
            return Err(TradingError::InvalidParameters(format!(
                "real token reserves {} exceed virtual {}",
                self.real_token_reserves, self.virtual_token_reserves
            )));
        }
        if self.real_eth_reserves > self.virtual_eth_reserves {
            return Err(TradingError::InvalidParameters(format!(
                "real ETH reserves {} exceed virtual {}",
                self.real_eth_reserves, self.virtual_eth_reserves
            )));
        }

        Ok(ReserveState {
            token_id: self.token_id,
            virtual_token_reserves: self.virtual_token_reserves,
            virtual_eth_reserves: self.virtual_eth_reserves,
            real_token_reserves: self.real_token_reserves,
            real_eth_reserves: self.real_eth_reserves,
            is_graduated: self.is_graduated,
        })
    }
}

// ============================================================================
// QUOTES AND STATS
// ============================================================================

/// Result of pricing a trade against a reserve snapshot
///
/// Prices are ETH base units per whole token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub side: TradeSide,
    pub input_amount: Amount,
    pub output_amount: Amount,
    /// Curve output before the sell haircut (equal to `output_amount` on buys)
    pub gross_output_amount: Amount,
    /// Uncapped, used for slippage rejection
    pub price_impact_bps: Bps,
    /// Capped, shown to users
    pub display_price_impact_bps: Bps,
    pub spot_price: Amount,
    pub execution_price: Amount,
    /// Reserves if this trade settled exactly as quoted
    pub new_reserves: ReserveState,
}

/// Point-in-time market view of a curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveStats {
    pub spot_price: Amount,
    pub circulating_supply: Amount,
    pub market_cap: Amount,
    /// Graduation threshold progress (0-100)
    pub graduation_progress_percent: u8,
    /// Whether threshold is currently met
    pub can_graduate: bool,
    pub phase: Phase,
}
