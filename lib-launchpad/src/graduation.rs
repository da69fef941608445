//! Graduation Monitor
//!
//! Evaluated after every confirmed buy, inside the same commit as the
//! trade that crossed the threshold. Graduation is one-way: a graduated
//! record is returned unchanged and produces no event.

use lib_types::{Amount, BlockNumber};

use crate::bonding_curve::{TokenRecord, TradingEvent};
use crate::config::GraduationConfig;
use crate::errors::{TradingError, TradingResult};

/// Outcome of a graduation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraduationCheck {
    pub market_cap: Amount,
    pub threshold: Amount,
    pub crossed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraduationMonitor {
    threshold: Amount,
}

impl GraduationMonitor {
    pub fn new(config: &GraduationConfig) -> TradingResult<Self> {
        let threshold = config.threshold_market_cap().ok_or(TradingError::Overflow)?;
        Ok(Self { threshold })
    }

    /// Threshold in ETH base units
    pub fn threshold(&self) -> Amount {
        self.threshold
    }

    pub fn check(&self, record: &TokenRecord) -> TradingResult<GraduationCheck> {
        let market_cap = record.market_cap()?;
        Ok(GraduationCheck {
            market_cap,
            threshold: self.threshold,
            crossed: !record.is_graduated() && market_cap >= self.threshold,
        })
    }

    /// Graduate the record if its market cap reached the threshold
    ///
    /// Returns the (possibly frozen) record and the event to publish once
    /// the record is committed.
    pub fn evaluate(
        &self,
        record: TokenRecord,
        block_number: BlockNumber,
        timestamp: u64,
    ) -> TradingResult<(TokenRecord, Option<TradingEvent>)> {
        let check = self.check(&record)?;
        if !check.crossed {
            return Ok((record, None));
        }

        let graduated = record.graduate(timestamp);
        let reserves = graduated.reserves();
        tracing::info!(
            "Token {} graduated at market cap {} ETH (threshold {} ETH)",
            graduated.token_id(),
            check.market_cap.to_decimal_string(),
            check.threshold.to_decimal_string()
        );
        let event = TradingEvent::Graduated {
            token_id: graduated.token_id(),
            final_market_cap: check.market_cap,
            real_eth_reserves: reserves.real_eth_reserves(),
            real_token_reserves: reserves.real_token_reserves(),
            block_number,
            timestamp,
        };
        Ok((graduated, Some(event)))
    }
}
