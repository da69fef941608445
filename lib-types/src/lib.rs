//! Launchpad primitives.
//! Stable, transport-neutral, behavior-free.
//!
//! Rule: amounts never leave this crate as floats. Interchange form for
//! 256-bit values is a decimal string.

pub mod primitives;
pub mod errors;
pub mod fees;

pub use primitives::{
    Amount, BlockNumber, Bps, ChainId, OrderId, TokenId, UserId, U256,
    BPS_DENOMINATOR, DECIMALS,
};
pub use errors::PrimitiveError;
pub use fees::{FeeOutcome, FeeSchedule, FeeVenue, RewardAction};
