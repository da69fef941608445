//! Fee Calculator (Pure Functions)
//!
//! # Rules (enforced in code)
//!
//! - `fee = notional × fee_bps / 10000`, rounded down
//! - Rates are looked up by venue, never supplied by the trade
//! - Reward points are a flat lookup by action, independent of notional
//! - Fee and points are computed in the same pass so the caller can write
//!   both atomically with the order's terminal state

use thiserror::Error;

use lib_types::{Amount, Bps, BPS_DENOMINATOR};
use lib_types::fees::{FeeOutcome, FeeSchedule, FeeVenue, RewardAction};

/// Error during fee computation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("Fee rate {0} bps exceeds 100%")]
    InvalidRate(Bps),

    #[error("Arithmetic overflow computing fee on {0}")]
    Overflow(Amount),

    #[error("Fee {fee} exceeds amount {amount}")]
    FeeExceedsAmount { fee: Amount, amount: Amount },
}

/// Result type for fee operations
pub type FeeResult<T> = Result<T, FeeError>;

// =============================================================================
// LOOKUPS
// =============================================================================

/// Fee rate configured for a venue
pub const fn fee_bps_for(venue: FeeVenue, schedule: &FeeSchedule) -> Bps {
    match venue {
        FeeVenue::Trading => schedule.trading_fee_bps,
        FeeVenue::Swap => schedule.swap_fee_bps,
        FeeVenue::Bridge => schedule.bridge_fee_bps,
    }
}

/// Flat reward points for an action
pub const fn reward_points_for(action: RewardAction, schedule: &FeeSchedule) -> u64 {
    match action {
        RewardAction::Trade => schedule.trade_reward_points,
        RewardAction::Swap => schedule.swap_reward_points,
        RewardAction::Bridge => schedule.bridge_reward_points,
        RewardAction::TokenCreation => schedule.token_creation_reward_points,
    }
}

/// Reward action that accompanies a fee charged on a venue
const fn action_for(venue: FeeVenue) -> RewardAction {
    match venue {
        FeeVenue::Trading => RewardAction::Trade,
        FeeVenue::Swap => RewardAction::Swap,
        FeeVenue::Bridge => RewardAction::Bridge,
    }
}

// =============================================================================
// COMPUTATION
// =============================================================================

/// Compute the protocol fee and reward points for a notional on a venue
///
/// # Algorithm
///
/// ```text
/// fee_bps = schedule[venue]
/// fee = floor(notional * fee_bps / 10000)
/// reward_points = schedule[action(venue)]
/// ```
pub fn compute_fee(
    venue: FeeVenue,
    notional: Amount,
    schedule: &FeeSchedule,
) -> FeeResult<FeeOutcome> {
    let bps = fee_bps_for(venue, schedule);
    if bps > BPS_DENOMINATOR {
        return Err(FeeError::InvalidRate(bps));
    }

    let fee = notional.apply_bps(bps).ok_or(FeeError::Overflow(notional))?;

    Ok(FeeOutcome {
        venue,
        notional,
        fee,
        reward_points: reward_points_for(action_for(venue), schedule),
    })
}

/// Fee and reward points for a confirmed bonding-curve trade
pub fn compute_trade_fee(notional: Amount, schedule: &FeeSchedule) -> FeeResult<FeeOutcome> {
    compute_fee(FeeVenue::Trading, notional, schedule)
}

/// Amount remaining after deducting a fee
pub fn net_of_fee(amount: Amount, fee: Amount) -> FeeResult<Amount> {
    amount
        .checked_sub(fee)
        .ok_or(FeeError::FeeExceedsAmount { fee, amount })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_rates() {
        let schedule = FeeSchedule::default();
        assert_eq!(fee_bps_for(FeeVenue::Trading, &schedule), 100);
        assert_eq!(fee_bps_for(FeeVenue::Swap, &schedule), 25);
        assert_eq!(fee_bps_for(FeeVenue::Bridge, &schedule), 30);
    }

    #[test]
    fn test_reward_points_ignore_notional() {
        let schedule = FeeSchedule::default();
        let small = compute_fee(FeeVenue::Swap, Amount::from(1u64), &schedule).unwrap();
        let large = compute_fee(FeeVenue::Swap, Amount::from_whole(1_000), &schedule).unwrap();
        assert_eq!(small.reward_points, 15);
        assert_eq!(large.reward_points, 15);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let schedule = FeeSchedule {
            trading_fee_bps: 10_001,
            ..FeeSchedule::default()
        };
        let result = compute_trade_fee(Amount::from_whole(1), &schedule);
        assert_eq!(result, Err(FeeError::InvalidRate(10_001)));
    }

    #[test]
    fn test_net_of_fee() {
        let amount = Amount::from(1_000u64);
        assert_eq!(net_of_fee(amount, Amount::from(10u64)).unwrap(), Amount::from(990u64));
        assert!(net_of_fee(amount, Amount::from(1_001u64)).is_err());
    }

    #[test]
    fn test_zero_fee_schedule() {
        let schedule = FeeSchedule::for_testing();
        let outcome = compute_trade_fee(Amount::from_whole(5), &schedule).unwrap();
        assert!(outcome.fee.is_zero());
        assert_eq!(outcome.reward_points, schedule.trade_reward_points);
    }
}
