//! Listed Token Record
//!
//! A token's metadata, current reserves and running metrics, stored as one
//! unit and versioned for optimistic concurrency.
//!
//! # Invariants
//! - `version` increases by one on every committed reserve change
//! - `last_applied_block` never decreases
//! - once graduated, a record never returns to the active phase

use serde::{Deserialize, Serialize};

use lib_types::{Amount, BlockNumber, TokenId, UserId};

use super::engine;
use super::types::{CurveStats, ReserveState, TradeSide};
use crate::errors::{TradingError, TradingResult};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_SYMBOL_LEN: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 1_000;
pub const MAX_TAG_LEN: usize = 20;

/// Listing category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenCategory {
    Meme,
    Utility,
    Gaming,
    Defi,
    Nft,
    #[default]
    Other,
}

/// User-supplied token description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: TokenCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    pub creator: UserId,
}

impl TokenMetadata {
    pub fn validate(&self) -> TradingResult<()> {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return Err(TradingError::InvalidParameters(format!(
                "name must be 1-{} characters",
                MAX_NAME_LEN
            )));
        }
        let symbol_len = self.symbol.trim().chars().count();
        if symbol_len == 0 || symbol_len > MAX_SYMBOL_LEN {
            return Err(TradingError::InvalidParameters(format!(
                "symbol must be 1-{} characters",
                MAX_SYMBOL_LEN
            )));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(TradingError::InvalidParameters(format!(
                "description exceeds {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
        if let Some(tag) = self.tags.iter().find(|t| t.chars().count() > MAX_TAG_LEN) {
            return Err(TradingError::InvalidParameters(format!(
                "tag `{}` exceeds {} characters",
                tag, MAX_TAG_LEN
            )));
        }
        Ok(())
    }
}

/// Running trade statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetrics {
    /// ETH notional across all confirmed trades
    pub volume_all_time: Amount,
    pub trades_all_time: u64,
    pub buys: u64,
    pub sells: u64,
    /// Spot price after the latest confirmed trade
    pub last_price: Amount,
    pub last_trade_at: Option<u64>,
}

impl TokenMetrics {
    pub fn average_trade_size(&self) -> Amount {
        if self.trades_all_time == 0 {
            return Amount::zero();
        }
        self.volume_all_time
            .mul_div_floor(Amount::from(1u64), Amount::from(self.trades_all_time))
            .unwrap_or_default()
    }
}

/// A listed token with its curve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    metadata: TokenMetadata,
    reserves: ReserveState,
    total_supply: Amount,
    metrics: TokenMetrics,
    version: u64,
    last_applied_block: BlockNumber,
    created_at: u64,
    graduated_at: Option<u64>,
}

impl TokenRecord {
    /// New listing at version zero
    pub fn list(
        metadata: TokenMetadata,
        reserves: ReserveState,
        total_supply: Amount,
        created_at: u64,
    ) -> TradingResult<Self> {
        metadata.validate()?;
        if reserves.real_token_reserves() > total_supply {
            return Err(TradingError::InvalidParameters(
                "real token reserves exceed total supply".to_string(),
            ));
        }

        let metrics = TokenMetrics {
            last_price: engine::spot_price(&reserves)?,
            ..TokenMetrics::default()
        };

        Ok(Self {
            metadata,
            reserves,
            total_supply,
            metrics,
            version: 0,
            last_applied_block: 0,
            created_at,
            graduated_at: if reserves.is_graduated() { Some(created_at) } else { None },
        })
    }

    pub fn token_id(&self) -> TokenId {
        self.reserves.token_id()
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn reserves(&self) -> &ReserveState {
        &self.reserves
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn metrics(&self) -> &TokenMetrics {
        &self.metrics
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_applied_block(&self) -> BlockNumber {
        self.last_applied_block
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn graduated_at(&self) -> Option<u64> {
        self.graduated_at
    }

    pub fn is_graduated(&self) -> bool {
        self.reserves.is_graduated()
    }

    pub fn market_cap(&self) -> TradingResult<Amount> {
        engine::market_cap(&self.reserves, self.total_supply)
    }

    pub fn stats(&self, graduation_threshold: Amount) -> TradingResult<CurveStats> {
        engine::curve_stats(&self.reserves, self.total_supply, graduation_threshold)
    }

    /// Next version after a confirmed trade moved the reserves
    pub fn after_trade(
        &self,
        reserves: ReserveState,
        side: TradeSide,
        eth_notional: Amount,
        block_number: BlockNumber,
        timestamp: u64,
    ) -> TradingResult<TokenRecord> {
        if reserves.token_id() != self.token_id() {
            return Err(TradingError::InvalidParameters(format!(
                "reserves for {} applied to {}",
                reserves.token_id(),
                self.token_id()
            )));
        }

        let mut metrics = self.metrics.clone();
        metrics.volume_all_time = metrics
            .volume_all_time
            .checked_add(eth_notional)
            .ok_or(TradingError::Overflow)?;
        metrics.trades_all_time += 1;
        match side {
            TradeSide::Buy => metrics.buys += 1,
            TradeSide::Sell => metrics.sells += 1,
        }
        metrics.last_price = engine::spot_price(&reserves)?;
        metrics.last_trade_at = Some(timestamp);

        Ok(TokenRecord {
            // Graduation is sticky even if a caller passes active reserves
            reserves: if self.is_graduated() { reserves.graduated() } else { reserves },
            metrics,
            version: self.version + 1,
            last_applied_block: self.last_applied_block.max(block_number),
            ..self.clone()
        })
    }

    /// Frozen copy of this record. No-op if already graduated.
    pub fn graduate(&self, timestamp: u64) -> TokenRecord {
        if self.is_graduated() {
            return self.clone();
        }
        TokenRecord {
            reserves: self.reserves.graduated(),
            graduated_at: Some(timestamp),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::ChainId;

    fn metadata() -> TokenMetadata {
        TokenMetadata {
            name: "Rocket".to_string(),
            symbol: "RKT".to_string(),
            description: String::new(),
            image: None,
            category: TokenCategory::Meme,
            tags: vec!["moon".to_string()],
            creator: UserId::from("alice"),
        }
    }

    fn reserves() -> ReserveState {
        ReserveState::builder(TokenId::new(ChainId::RiseChain, [1; 20]))
            .virtual_reserves(Amount::from_whole(800_000_000), Amount::from_whole(30))
            .real_reserves(Amount::from_whole(793_100_000), Amount::zero())
            .build()
            .unwrap()
    }

    fn record() -> TokenRecord {
        TokenRecord::list(metadata(), reserves(), Amount::from_whole(1_000_000_000), 10).unwrap()
    }

    #[test]
    fn test_listing_starts_at_version_zero() {
        let record = record();
        assert_eq!(record.version(), 0);
        assert_eq!(record.last_applied_block(), 0);
        assert!(!record.is_graduated());
        assert_eq!(record.metrics().last_price.to_string(), "37500000000");
    }

    #[test]
    fn test_metadata_limits() {
        let mut long_symbol = metadata();
        long_symbol.symbol = "ABCDEFGHIJK".to_string();
        assert!(long_symbol.validate().is_err());

        let mut empty_name = metadata();
        empty_name.name = "   ".to_string();
        assert!(empty_name.validate().is_err());

        let mut long_tag = metadata();
        long_tag.tags = vec!["x".repeat(21)];
        assert!(long_tag.validate().is_err());

        let mut long_description = metadata();
        long_description.description = "d".repeat(1_001);
        assert!(long_description.validate().is_err());
    }

    #[test]
    fn test_after_trade_bumps_version_and_metrics() {
        let record = record();
        let moved = reserves()
            .with_reserves(
                Amount::from_whole(700_000_000),
                Amount::from_whole(40),
                Amount::from_whole(693_100_000),
                Amount::from_whole(10),
            )
            .unwrap();

        let next = record
            .after_trade(moved, TradeSide::Buy, Amount::from_whole(10), 42, 100)
            .unwrap();
        assert_eq!(next.version(), 1);
        assert_eq!(next.last_applied_block(), 42);
        assert_eq!(next.metrics().buys, 1);
        assert_eq!(next.metrics().volume_all_time, Amount::from_whole(10));
        assert_eq!(next.metrics().average_trade_size(), Amount::from_whole(10));

        // A late block does not move the high-water mark back
        let later = next
            .after_trade(moved, TradeSide::Sell, Amount::from_whole(2), 40, 101)
            .unwrap();
        assert_eq!(later.last_applied_block(), 42);
        assert_eq!(later.version(), 2);
    }

    #[test]
    fn test_graduation_is_idempotent() {
        let graduated = record().graduate(500);
        assert!(graduated.is_graduated());
        assert_eq!(graduated.graduated_at(), Some(500));

        let again = graduated.graduate(900);
        assert_eq!(again.graduated_at(), Some(500));

        let traded = again
            .after_trade(reserves(), TradeSide::Buy, Amount::from_whole(1), 1, 901)
            .unwrap();
        assert!(traded.is_graduated());
    }
}
