//! Bonding Curve Token System
//!
//! Constant-product pricing over virtual reserves with a one-way
//! graduation once the market cap crosses the configured threshold.
//!
//! # Architecture
//! - `engine`: Pure quote and market math over a reserve snapshot
//! - `token`: Stored token aggregate (metadata, reserves, metrics, version)
//! - `registry`: Listing and phase queries
//! - `types`: Reserve snapshots, quotes, phases
//! - `events`: Event types and the outbound publisher

pub mod types;
pub mod engine;
pub mod events;
pub mod token;
pub mod registry;

pub use types::{CurveStats, Phase, Quote, ReserveState, ReserveStateBuilder, TradeSide};
pub use engine::{
    circulating_supply, curve_stats, graduation_progress_percent, market_cap, price_impact_bps,
    spot_price, BondingCurveEngine,
};
pub use events::{EventPublisher, TradingEvent};
pub use token::{TokenCategory, TokenMetadata, TokenMetrics, TokenRecord};
pub use registry::{ListingReceipt, RegistryStats, TokenRegistry};
