//! Launchpad Fee Model
//!
//! Pure, deterministic fee and reward computation.
//!
//! # Design Principles
//!
//! 1. **Pure functions** - No side effects, no global state
//! 2. **Deterministic** - Same inputs produce identical outputs on every node
//! 3. **No floats** - All arithmetic is 256-bit integer
//! 4. **Rates per venue** - A trade never carries its own fee rate
//!
//! # Type Architecture
//!
//! Pure data types (`FeeVenue`, `RewardAction`, `FeeSchedule`, `FeeOutcome`)
//! are defined in `lib-types::fees` and re-exported here for convenience.
//!
//! # Usage
//!
//! ```
//! use lib_fees::{compute_trade_fee, FeeSchedule};
//! use lib_types::Amount;
//!
//! let schedule = FeeSchedule::default();
//! let outcome = compute_trade_fee(Amount::from_whole(1), &schedule).unwrap();
//! assert_eq!(outcome.fee, Amount::from_base_units(10_000_000_000_000_000)); // 1%
//! assert_eq!(outcome.reward_points, 10);
//! ```

pub mod calculator;

#[cfg(test)]
mod golden_vectors;

// Re-export pure data types from lib-types (canonical location)
pub use lib_types::fees::{FeeOutcome, FeeSchedule, FeeVenue, RewardAction};

pub use calculator::{
    compute_fee, compute_trade_fee, fee_bps_for, net_of_fee, reward_points_for, FeeError,
    FeeResult,
};
