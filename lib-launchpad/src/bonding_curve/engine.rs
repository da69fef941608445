//! Constant-Product Bonding Curve Engine
//!
//! Pure pricing over a `ReserveState` snapshot. Nothing here reads storage
//! or the clock, so every function is deterministic.
//!
//! # Pricing
//! ```text
//! k = vT × vE
//!
//! buy  (ETH in):    out = vT − ceil(k / (vE + in))
//! sell (tokens in): gross = vE − ceil(k / (vT + in))
//!                   out   = gross − floor(gross × haircut / 10000)
//! ```
//!
//! The new output reserve is rounded up, so every rounding step favors the
//! curve. A buy followed by selling the received tokens never returns more
//! ETH than was put in.
//!
//! # Price Impact
//! `|execution − spot| / spot × 10000`, computed on the gross curve output
//! without intermediate rounding.

use lib_types::{Amount, Bps, U256, BPS_DENOMINATOR};

use super::types::{CurveStats, Quote, ReserveState, TradeSide};
use crate::config::CurveConfig;
use crate::errors::{TradingError, TradingResult};

/// Curve pricing with the configured haircut and display cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondingCurveEngine {
    sell_haircut_bps: Bps,
    price_impact_display_cap_bps: Bps,
}

impl BondingCurveEngine {
    pub fn new(config: &CurveConfig) -> Self {
        Self {
            sell_haircut_bps: config.sell_haircut_bps,
            price_impact_display_cap_bps: config.price_impact_display_cap_bps,
        }
    }

    pub fn sell_haircut_bps(&self) -> Bps {
        self.sell_haircut_bps
    }

    /// Price a trade without mutating anything
    ///
    /// # Errors
    /// - `CurveInactive` if the curve has graduated
    /// - `ZeroAmount` for a zero input
    /// - `InsufficientLiquidity` if the output would exhaust the real reserve
    pub fn quote(
        &self,
        reserves: &ReserveState,
        side: TradeSide,
        amount: Amount,
    ) -> TradingResult<Quote> {
        if reserves.is_graduated() {
            return Err(TradingError::CurveInactive(reserves.token_id()));
        }
        if amount.is_zero() {
            return Err(TradingError::ZeroAmount);
        }

        let v_token = reserves.virtual_token_reserves();
        let v_eth = reserves.virtual_eth_reserves();

        let (gross_output, output) = match side {
            TradeSide::Buy => {
                let new_v_eth = v_eth.checked_add(amount).ok_or(TradingError::Overflow)?;
                let new_v_token = v_token
                    .mul_div_ceil(v_eth, new_v_eth)
                    .ok_or(TradingError::Overflow)?;
                let out = v_token.saturating_sub(new_v_token);
                (out, out)
            }
            TradeSide::Sell => {
                let new_v_token = v_token.checked_add(amount).ok_or(TradingError::Overflow)?;
                let new_v_eth = v_eth
                    .mul_div_ceil(v_token, new_v_token)
                    .ok_or(TradingError::Overflow)?;
                let gross = v_eth.saturating_sub(new_v_eth);
                let haircut = gross
                    .apply_bps(self.sell_haircut_bps)
                    .ok_or(TradingError::Overflow)?;
                (gross, gross.saturating_sub(haircut))
            }
        };

        if output.is_zero() {
            return Err(TradingError::InvalidParameters(format!(
                "{} of {} is too small to produce any output",
                side, amount
            )));
        }

        let available = match side {
            TradeSide::Buy => reserves.real_token_reserves(),
            TradeSide::Sell => reserves.real_eth_reserves(),
        };
        if output >= available {
            return Err(TradingError::InsufficientLiquidity {
                requested: output,
                available,
            });
        }

        let (eth_leg, token_leg) = match side {
            TradeSide::Buy => (amount, gross_output),
            TradeSide::Sell => (gross_output, amount),
        };
        let price_impact_bps = price_impact_bps(reserves, eth_leg, token_leg)?;

        Ok(Quote {
            side,
            input_amount: amount,
            output_amount: output,
            gross_output_amount: gross_output,
            price_impact_bps,
            display_price_impact_bps: price_impact_bps.min(self.price_impact_display_cap_bps),
            spot_price: spot_price(reserves)?,
            execution_price: price_of(eth_leg, token_leg)?,
            new_reserves: self.apply_trade_delta(reserves, side, amount, output)?,
        })
    }

    /// Reserves after a settled trade with its actual amounts
    ///
    /// Accepts graduated reserves: a trade the chain confirmed is applied
    /// regardless of the curve's phase.
    pub fn apply_trade_delta(
        &self,
        reserves: &ReserveState,
        side: TradeSide,
        input: Amount,
        output: Amount,
    ) -> TradingResult<ReserveState> {
        if input.is_zero() {
            return Err(TradingError::ZeroAmount);
        }

        let (token_out, token_in, eth_out, eth_in) = match side {
            TradeSide::Buy => (output, Amount::zero(), Amount::zero(), input),
            TradeSide::Sell => (Amount::zero(), input, output, Amount::zero()),
        };

        let drain = |reserve: Amount, inflow: Amount, outflow: Amount| -> TradingResult<Amount> {
            reserve
                .checked_add(inflow)
                .ok_or(TradingError::Overflow)?
                .checked_sub(outflow)
                .ok_or(TradingError::InsufficientLiquidity {
                    requested: outflow,
                    available: reserve,
                })
        };

        reserves.with_reserves(
            drain(reserves.virtual_token_reserves(), token_in, token_out)?,
            drain(reserves.virtual_eth_reserves(), eth_in, eth_out)?,
            drain(reserves.real_token_reserves(), token_in, token_out)?,
            drain(reserves.real_eth_reserves(), eth_in, eth_out)?,
        )
    }
}

// ============================================================================
// MARKET VIEW
// ============================================================================

/// ETH base units per whole token at the margin: `vE × 10^18 / vT`
pub fn spot_price(reserves: &ReserveState) -> TradingResult<Amount> {
    reserves
        .virtual_eth_reserves()
        .mul_div_floor(Amount::one(), reserves.virtual_token_reserves())
        .ok_or(TradingError::Overflow)
}

/// Tokens held outside the curve
pub fn circulating_supply(reserves: &ReserveState, total_supply: Amount) -> Amount {
    total_supply.saturating_sub(reserves.real_token_reserves())
}

/// `spot × circulating`, in ETH base units
pub fn market_cap(reserves: &ReserveState, total_supply: Amount) -> TradingResult<Amount> {
    reserves
        .virtual_eth_reserves()
        .mul_div_floor(
            circulating_supply(reserves, total_supply),
            reserves.virtual_token_reserves(),
        )
        .ok_or(TradingError::Overflow)
}

/// Progress towards graduation, capped at 100
pub fn graduation_progress_percent(market_cap: Amount, threshold: Amount) -> u8 {
    if threshold.is_zero() || market_cap >= threshold {
        return 100;
    }
    market_cap
        .mul_div_floor(Amount::from(100u64), threshold)
        .map(|p| p.raw().low_u64().min(100) as u8)
        .unwrap_or(100)
}

pub fn curve_stats(
    reserves: &ReserveState,
    total_supply: Amount,
    threshold: Amount,
) -> TradingResult<CurveStats> {
    let market_cap = market_cap(reserves, total_supply)?;
    Ok(CurveStats {
        spot_price: spot_price(reserves)?,
        circulating_supply: circulating_supply(reserves, total_supply),
        market_cap,
        graduation_progress_percent: graduation_progress_percent(market_cap, threshold),
        can_graduate: !reserves.is_graduated() && market_cap >= threshold,
        phase: reserves.phase(),
    })
}

/// `|eth × vT − tokens × vE| × 10000 / (tokens × vE)`, saturating at `u32::MAX`
pub fn price_impact_bps(
    reserves: &ReserveState,
    eth_leg: Amount,
    token_leg: Amount,
) -> TradingResult<Bps> {
    let paid = eth_leg
        .checked_mul(reserves.virtual_token_reserves())
        .ok_or(TradingError::Overflow)?;
    let at_spot = token_leg
        .checked_mul(reserves.virtual_eth_reserves())
        .ok_or(TradingError::Overflow)?;
    let diff = if paid > at_spot {
        paid.saturating_sub(at_spot)
    } else {
        at_spot.saturating_sub(paid)
    };

    let impact = diff
        .mul_div_floor(Amount::from(BPS_DENOMINATOR as u64), at_spot)
        .ok_or(TradingError::Overflow)?;
    Ok(saturate_bps(impact))
}

fn price_of(eth_leg: Amount, token_leg: Amount) -> TradingResult<Amount> {
    eth_leg
        .mul_div_floor(Amount::one(), token_leg)
        .ok_or(TradingError::Overflow)
}

fn saturate_bps(value: Amount) -> Bps {
    let raw = value.raw();
    if raw > U256::from(u32::MAX) {
        u32::MAX
    } else {
        raw.low_u32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::{ChainId, TokenId};

    fn engine() -> BondingCurveEngine {
        BondingCurveEngine::new(&CurveConfig::default())
    }

    fn fresh() -> ReserveState {
        let config = CurveConfig::default();
        ReserveState::builder(TokenId::new(ChainId::RiseChain, [9; 20]))
            .virtual_reserves(
                config.initial_virtual_token_reserves,
                config.initial_virtual_eth_reserves,
            )
            .real_reserves(config.initial_real_token_reserves, Amount::zero())
            .build()
            .unwrap()
    }

    #[test]
    fn test_buy_one_eth_on_fresh_curve() {
        let quote = engine().quote(&fresh(), TradeSide::Buy, Amount::from_whole(1)).unwrap();

        // 800M × 30 / 31 = 774,193,548.387.. tokens remain
        let whole = quote.output_amount.to_whole_f64();
        assert!((whole - 25_806_451.6129).abs() < 1.0, "got {}", whole);

        // 1 / 30 of the virtual ETH reserve
        assert_eq!(quote.price_impact_bps, 333);
        assert_eq!(quote.display_price_impact_bps, 333);
        assert_eq!(quote.new_reserves.real_eth_reserves(), Amount::from_whole(1));
    }

    #[test]
    fn test_quote_does_not_mutate() {
        let reserves = fresh();
        let before = reserves;
        engine().quote(&reserves, TradeSide::Buy, Amount::from_whole(2)).unwrap();
        assert_eq!(reserves, before);
    }

    #[test]
    fn test_k_never_decreases() {
        let reserves = fresh();
        let k_before = reserves.k().unwrap();
        let quote = engine().quote(&reserves, TradeSide::Buy, Amount::from_whole(3)).unwrap();
        assert!(quote.new_reserves.k().unwrap() >= k_before);

        let sell = engine()
            .quote(&quote.new_reserves, TradeSide::Sell, quote.output_amount)
            .unwrap();
        assert!(sell.new_reserves.k().unwrap() >= quote.new_reserves.k().unwrap());
    }

    #[test]
    fn test_round_trip_never_profits() {
        let reserves = fresh();
        for eth in [1u64, 5, 12] {
            let amount = Amount::from_whole(eth);
            let buy = engine().quote(&reserves, TradeSide::Buy, amount).unwrap();
            let sell = engine()
                .quote(&buy.new_reserves, TradeSide::Sell, buy.output_amount)
                .unwrap();
            assert!(sell.output_amount <= amount);
            assert!(sell.gross_output_amount <= amount);
        }
    }

    #[test]
    fn test_sell_haircut_applied() {
        let buy = engine().quote(&fresh(), TradeSide::Buy, Amount::from_whole(4)).unwrap();
        let sell = engine()
            .quote(&buy.new_reserves, TradeSide::Sell, buy.output_amount)
            .unwrap();
        let haircut = sell.gross_output_amount.apply_bps(100).unwrap();
        assert_eq!(sell.output_amount, sell.gross_output_amount.saturating_sub(haircut));
    }

    #[test]
    fn test_larger_buys_move_price_more() {
        let reserves = fresh();
        let small = engine().quote(&reserves, TradeSide::Buy, Amount::from_whole(1)).unwrap();
        let large = engine().quote(&reserves, TradeSide::Buy, Amount::from_whole(10)).unwrap();
        assert!(large.price_impact_bps > small.price_impact_bps);
        assert!(large.execution_price > small.execution_price);
    }

    #[test]
    fn test_display_impact_capped() {
        let quote = engine().quote(&fresh(), TradeSide::Buy, Amount::from_whole(15)).unwrap();
        assert_eq!(quote.price_impact_bps, 5_000);
        assert_eq!(quote.display_price_impact_bps, 1_500);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let result = engine().quote(&fresh(), TradeSide::Buy, Amount::zero());
        assert_eq!(result, Err(TradingError::ZeroAmount));
    }

    #[test]
    fn test_graduated_curve_rejects_quotes() {
        let reserves = fresh().graduated();
        let result = engine().quote(&reserves, TradeSide::Buy, Amount::from_whole(1));
        assert_eq!(result, Err(TradingError::CurveInactive(reserves.token_id())));
    }

    #[test]
    fn test_sell_on_empty_eth_reserve() {
        let result = engine().quote(&fresh(), TradeSide::Sell, Amount::from_whole(1_000));
        assert!(matches!(result, Err(TradingError::InsufficientLiquidity { .. })));
    }

    #[test]
    fn test_buy_beyond_real_tokens() {
        // Would need more than the 793.1M sellable tokens
        let result = engine().quote(&fresh(), TradeSide::Buy, Amount::from_whole(10_000));
        assert!(matches!(result, Err(TradingError::InsufficientLiquidity { .. })));
    }

    #[test]
    fn test_apply_delta_moves_real_and_virtual_together() {
        let reserves = fresh();
        let out = Amount::from_whole(1_000);
        let next = engine()
            .apply_trade_delta(&reserves, TradeSide::Buy, Amount::from_whole(1), out)
            .unwrap();
        assert_eq!(
            next.virtual_token_reserves(),
            reserves.virtual_token_reserves().saturating_sub(out)
        );
        assert_eq!(
            next.real_token_reserves(),
            reserves.real_token_reserves().saturating_sub(out)
        );
        assert_eq!(next.virtual_eth_reserves(), Amount::from_whole(31));
    }

    #[test]
    fn test_market_cap_on_fresh_curve() {
        let reserves = fresh();
        let total = CurveConfig::default().total_supply;

        // 30 ETH × 206.9M / 800M = 7.75875 ETH
        let cap = market_cap(&reserves, total).unwrap();
        assert_eq!(cap.to_decimal_string(), "7.75875");
        assert_eq!(graduation_progress_percent(cap, Amount::from_whole(23)), 33);
    }

    #[test]
    fn test_progress_capped() {
        assert_eq!(
            graduation_progress_percent(Amount::from_whole(50), Amount::from_whole(23)),
            100
        );
        assert_eq!(graduation_progress_percent(Amount::zero(), Amount::from_whole(23)), 0);
    }

    #[test]
    fn test_curve_stats() {
        let stats = curve_stats(
            &fresh(),
            CurveConfig::default().total_supply,
            Amount::from_whole(23),
        )
        .unwrap();
        assert!(!stats.can_graduate);
        assert_eq!(stats.circulating_supply, Amount::from_whole(206_900_000));
        assert_eq!(stats.spot_price.to_string(), "37500000000");
    }
}
