//! Fee primitives for the launchpad.
//!
//! Pure data types for fee and reward calculation. Behavior lives in lib-fees.
//!
//! Rule: These types must remain behavior-free and serialization-stable.

use serde::{Deserialize, Serialize};

use crate::primitives::{Amount, Bps};

/// Venue a fee is charged on. Rates are configured per venue, never per trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FeeVenue {
    /// Bonding-curve buy/sell
    Trading = 0,
    /// Token-to-token swap router
    Swap = 1,
    /// Cross-chain bridge transfer
    Bridge = 2,
}

/// Action that earns reward points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RewardAction {
    /// Confirmed bonding-curve trade
    Trade = 0,
    /// Confirmed swap
    Swap = 1,
    /// Completed bridge transfer
    Bridge = 2,
    /// New token listed
    TokenCreation = 3,
}

/// Fee and reward schedule
///
/// Reward points are a flat lookup per action and are not derived from the
/// notional value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Bonding-curve trading fee
    pub trading_fee_bps: Bps,
    /// Swap router fee
    pub swap_fee_bps: Bps,
    /// Bridge base fee (gas is charged separately by the bridge)
    pub bridge_fee_bps: Bps,
    /// Points for a confirmed trade
    pub trade_reward_points: u64,
    /// Points for a confirmed swap
    pub swap_reward_points: u64,
    /// Points for a bridge transfer
    pub bridge_reward_points: u64,
    /// Points for listing a token
    pub token_creation_reward_points: u64,
    /// Flat fee for listing a token
    pub token_creation_fee: Amount,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            trading_fee_bps: 100,
            swap_fee_bps: 25,
            bridge_fee_bps: 30,
            trade_reward_points: 10,
            swap_reward_points: 15,
            bridge_reward_points: 20,
            token_creation_reward_points: 50,
            // 0.02 ETH
            token_creation_fee: Amount::from_base_units(20_000_000_000_000_000),
        }
    }
}

impl FeeSchedule {
    /// Zero-fee schedule for testing; reward points unchanged
    pub fn for_testing() -> Self {
        Self {
            trading_fee_bps: 0,
            swap_fee_bps: 0,
            bridge_fee_bps: 0,
            token_creation_fee: Amount::zero(),
            ..Self::default()
        }
    }
}

/// Result of a fee computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOutcome {
    /// Venue the fee was charged on
    pub venue: FeeVenue,
    /// Notional the fee was computed from
    pub notional: Amount,
    /// Protocol fee
    pub fee: Amount,
    /// Reward points credited alongside the fee
    pub reward_points: u64,
}
