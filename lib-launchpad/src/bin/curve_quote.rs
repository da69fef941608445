//! Offline curve calculator
//!
//! Prices a trade against a fresh curve built from the configuration,
//! optionally after replaying earlier buys, and prints the quote and the
//! resulting curve stats as JSON.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use lib_launchpad::bonding_curve::curve_stats;
use lib_launchpad::{BondingCurveEngine, CurveStats, LaunchpadConfig, Quote, ReserveState, TradeSide};
use lib_types::{Amount, ChainId, TokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Side {
    Buy,
    Sell,
}

impl From<Side> for TradeSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => TradeSide::Buy,
            Side::Sell => TradeSide::Sell,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Quote a trade against a bonding curve", long_about = None)]
struct Args {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long, env = "LAUNCHPAD_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "buy")]
    side: Side,

    /// ETH for buys, tokens for sells, in whole units (e.g. "1.5")
    #[arg(short, long)]
    amount: String,

    /// ETH buys to apply to the curve before quoting
    #[arg(long = "after-buy")]
    after_buys: Vec<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
struct Report {
    reserves_before: ReserveState,
    quote: Quote,
    stats_after: CurveStats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => LaunchpadConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LaunchpadConfig::default(),
    };
    let threshold = config
        .graduation
        .threshold_market_cap()
        .ok_or_else(|| anyhow!("graduation threshold overflows"))?;

    let engine = BondingCurveEngine::new(&config.curve);
    let curve = &config.curve;
    let mut reserves = ReserveState::builder(TokenId::new(ChainId::RiseChain, [0u8; 20]))
        .virtual_reserves(
            curve.initial_virtual_token_reserves,
            curve.initial_virtual_eth_reserves,
        )
        .real_reserves(curve.initial_real_token_reserves, Amount::zero())
        .build()?;

    for buy in &args.after_buys {
        let amount = Amount::from_decimal_str(buy)?;
        let quote = engine.quote(&reserves, TradeSide::Buy, amount)?;
        reserves = quote.new_reserves;
        tracing::debug!("Applied buy of {} ETH", amount.to_decimal_string());
    }

    let amount = Amount::from_decimal_str(&args.amount)?;
    let quote = engine.quote(&reserves, args.side.into(), amount)?;
    let stats_after = curve_stats(&quote.new_reserves, curve.total_supply, threshold)?;

    let report = Report {
        reserves_before: reserves,
        quote,
        stats_after,
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from([
            "curve-quote",
            "--amount",
            "1.5",
            "--after-buy",
            "3",
            "--after-buy",
            "3",
        ])
        .unwrap();
        assert_eq!(args.side, Side::Buy);
        assert_eq!(args.amount, "1.5");
        assert_eq!(args.after_buys, vec!["3".to_string(), "3".to_string()]);
        assert!(!args.pretty);
    }

    #[test]
    fn test_config_path_from_env() {
        std::env::set_var("LAUNCHPAD_CONFIG", "/etc/launchpad/curve.toml");
        let from_env = Args::try_parse_from(["curve-quote", "-a", "1"]).unwrap();
        let from_flag =
            Args::try_parse_from(["curve-quote", "-a", "1", "-c", "local.toml"]).unwrap();
        std::env::remove_var("LAUNCHPAD_CONFIG");

        assert_eq!(from_env.config, Some(PathBuf::from("/etc/launchpad/curve.toml")));
        assert_eq!(from_flag.config, Some(PathBuf::from("local.toml")));
    }

    #[test]
    fn test_amount_required() {
        assert!(Args::try_parse_from(["curve-quote", "--side", "sell"]).is_err());
    }
}
