//! Launchpad Configuration
//!
//! Loaded from TOML. Every section is optional and falls back to the
//! production defaults, so an empty file is a valid configuration.
//!
//! ```toml
//! [curve]
//! initial_virtual_eth_reserves = "30000000000000000000"
//!
//! [graduation]
//! threshold_usd = 69000
//! reference_eth_usd = 3000
//!
//! [fees]
//! trading_fee_bps = 100
//!
//! [settlement]
//! stale_quote_tolerance_bps = 500
//!
//! [trending]
//! half_life_secs = 21600
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use lib_types::{Amount, Bps, FeeSchedule, BPS_DENOMINATOR};

/// Configuration validation error
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Configuration parsing error: {0}")]
    Parsing(#[from] toml::de::Error),
}

// ============================================================================
// SECTIONS
// ============================================================================

/// Initial reserves for a freshly listed token and quote presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    pub initial_virtual_token_reserves: Amount,
    pub initial_virtual_eth_reserves: Amount,
    /// Tokens actually sellable from the curve
    pub initial_real_token_reserves: Amount,
    pub total_supply: Amount,
    /// Price impact shown to users is capped here. Rejection uses the true value.
    pub price_impact_display_cap_bps: Bps,
    /// Retained by the curve on every sell
    pub sell_haircut_bps: Bps,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            initial_virtual_token_reserves: Amount::from_whole(800_000_000),
            initial_virtual_eth_reserves: Amount::from_whole(30),
            initial_real_token_reserves: Amount::from_whole(793_100_000),
            total_supply: Amount::from_whole(1_000_000_000),
            price_impact_display_cap_bps: 1_500,
            sell_haircut_bps: 100,
        }
    }
}

/// Market-cap threshold at which a curve graduates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraduationConfig {
    pub threshold_usd: u64,
    /// USD price of one ETH used to convert the threshold into wei
    pub reference_eth_usd: u64,
}

impl Default for GraduationConfig {
    fn default() -> Self {
        Self {
            threshold_usd: 69_000,
            reference_eth_usd: 3_000,
        }
    }
}

impl GraduationConfig {
    /// Threshold expressed in ETH base units (23 ETH with defaults)
    pub fn threshold_market_cap(&self) -> Option<Amount> {
        Amount::from_whole(self.threshold_usd)
            .mul_div_floor(Amount::from(1u64), Amount::from(self.reference_eth_usd))
    }
}

/// Order placement and reconciliation knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Deviation between quoted and settled output that gets an audit flag
    pub stale_quote_tolerance_bps: Bps,
    /// Attempts at an optimistic commit before giving up
    pub max_commit_retries: u32,
    /// Used when the invoker cannot estimate gas
    pub default_gas_estimate: u64,
    /// Logical name of the trading contract passed to the invoker
    pub trading_contract: String,
    /// Confirmations buffered per token before a forced flush
    pub max_buffered_per_token: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            stale_quote_tolerance_bps: 500,
            max_commit_retries: 3,
            default_gas_estimate: 500_000,
            trading_contract: "tradingEngine".to_string(),
            max_buffered_per_token: 1_024,
        }
    }
}

/// Trending score window and decay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendingConfig {
    pub window_secs: u64,
    pub half_life_secs: u64,
    pub recompute_interval_secs: u64,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            window_secs: 86_400,
            half_life_secs: 21_600,
            recompute_interval_secs: 60,
        }
    }
}

// ============================================================================
// TOP LEVEL
// ============================================================================

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchpadConfig {
    pub curve: CurveConfig,
    pub graduation: GraduationConfig,
    pub fees: FeeSchedule,
    pub settlement: SettlementConfig,
    pub trending: TrendingConfig,
}

impl LaunchpadConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LaunchpadConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded launchpad configuration from {}", path.display());
        Ok(config)
    }

    /// Zero fees and a single commit attempt, otherwise production values
    pub fn for_testing() -> Self {
        Self {
            fees: FeeSchedule::for_testing(),
            settlement: SettlementConfig {
                max_commit_retries: 1,
                ..SettlementConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let curve = &self.curve;
        if curve.initial_virtual_token_reserves.is_zero() {
            return Err(invalid("curve.initial_virtual_token_reserves", "must be positive"));
        }
        if curve.initial_virtual_eth_reserves.is_zero() {
            return Err(invalid("curve.initial_virtual_eth_reserves", "must be positive"));
        }
        if curve.initial_real_token_reserves > curve.initial_virtual_token_reserves {
            return Err(invalid(
                "curve.initial_real_token_reserves",
                "cannot exceed the virtual token reserves",
            ));
        }
        if curve.initial_real_token_reserves > curve.total_supply {
            return Err(invalid(
                "curve.initial_real_token_reserves",
                "cannot exceed the total supply",
            ));
        }
        if curve.price_impact_display_cap_bps > BPS_DENOMINATOR {
            return Err(invalid("curve.price_impact_display_cap_bps", "must be at most 10000"));
        }
        if curve.sell_haircut_bps >= BPS_DENOMINATOR {
            return Err(invalid("curve.sell_haircut_bps", "must be below 10000"));
        }

        if self.graduation.reference_eth_usd == 0 {
            return Err(invalid("graduation.reference_eth_usd", "must be positive"));
        }
        match self.graduation.threshold_market_cap() {
            Some(threshold) if !threshold.is_zero() => {}
            _ => return Err(invalid("graduation.threshold_usd", "converts to a zero threshold")),
        }

        for (field, bps) in [
            ("fees.trading_fee_bps", self.fees.trading_fee_bps),
            ("fees.swap_fee_bps", self.fees.swap_fee_bps),
            ("fees.bridge_fee_bps", self.fees.bridge_fee_bps),
        ] {
            if bps > BPS_DENOMINATOR {
                return Err(invalid(field, "must be at most 10000"));
            }
        }

        if self.settlement.max_commit_retries == 0 {
            return Err(invalid("settlement.max_commit_retries", "must be at least 1"));
        }
        if self.settlement.trading_contract.is_empty() {
            return Err(invalid("settlement.trading_contract", "must not be empty"));
        }
        if self.settlement.max_buffered_per_token == 0 {
            return Err(invalid("settlement.max_buffered_per_token", "must be at least 1"));
        }

        if self.trending.window_secs == 0 || self.trending.half_life_secs == 0 {
            return Err(invalid("trending", "window and half-life must be positive"));
        }
        if self.trending.recompute_interval_secs == 0 {
            return Err(invalid("trending.recompute_interval_secs", "must be positive"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LaunchpadConfig::default();
        config.validate().unwrap();
        assert_eq!(config.graduation.threshold_market_cap(), Some(Amount::from_whole(23)));
        assert_eq!(config.fees.trading_fee_bps, 100);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = LaunchpadConfig::from_toml_str("").unwrap();
        assert_eq!(config, LaunchpadConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = LaunchpadConfig::from_toml_str(
            r#"
            [curve]
            initial_virtual_eth_reserves = "45000000000000000000"
            sell_haircut_bps = 0

            [settlement]
            stale_quote_tolerance_bps = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.curve.initial_virtual_eth_reserves, Amount::from_whole(45));
        assert_eq!(config.curve.sell_haircut_bps, 0);
        assert_eq!(config.curve.total_supply, Amount::from_whole(1_000_000_000));
        assert_eq!(config.settlement.stale_quote_tolerance_bps, 250);
        assert_eq!(config.settlement.max_commit_retries, 3);
    }

    #[test]
    fn test_rejects_real_above_virtual() {
        let result = LaunchpadConfig::from_toml_str(
            r#"
            [curve]
            initial_virtual_token_reserves = "100"
            initial_real_token_reserves = "200"
            "#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "curve.initial_real_token_reserves", .. })
        ));
    }

    #[test]
    fn test_rejects_zero_reference_price() {
        let mut config = LaunchpadConfig::default();
        config.graduation.reference_eth_usd = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = LaunchpadConfig::from_toml_str("[curve\nbroken");
        assert!(matches!(result, Err(ConfigError::Parsing(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launchpad.toml");
        std::fs::write(&path, "[trending]\nhalf_life_secs = 3600\n").unwrap();

        let config = LaunchpadConfig::load(&path).unwrap();
        assert_eq!(config.trending.half_life_secs, 3_600);
    }
}
