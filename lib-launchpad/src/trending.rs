//! Trending Scores
//!
//! Score = Σ notional × weight(age) over the trades in a rolling window.
//! Scores are computed lazily from recorded samples; a background task can
//! refresh a cached ranking on an interval.
//!
//! Graduated tokens are excluded from rankings. Their samples are kept so
//! the windowed market stats (volume, trades, unique traders and price
//! change) stay available.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use lib_types::{Amount, TokenId, UserId, BPS_DENOMINATOR};

use crate::config::TrendingConfig;
use crate::errors::TradingResult;
use crate::orders::{Order, OrderStatus};
use crate::storage::TradingStore;

/// Weight of a trade as a function of its age
pub trait DecayStrategy: Send + Sync {
    /// Multiplier in `[0, 1]` for a trade `age_secs` old
    fn weight(&self, age_secs: u64) -> f64;

    fn name(&self) -> &'static str;
}

/// Halves a trade's weight every `half_life_secs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialDecay {
    half_life_secs: u64,
}

impl ExponentialDecay {
    pub fn new(half_life_secs: u64) -> Self {
        Self {
            half_life_secs: half_life_secs.max(1),
        }
    }
}

impl DecayStrategy for ExponentialDecay {
    fn weight(&self, age_secs: u64) -> f64 {
        0.5f64.powf(age_secs as f64 / self.half_life_secs as f64)
    }

    fn name(&self) -> &'static str {
        "exponential"
    }
}

/// One confirmed trade as seen by the scorer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeActivity {
    /// ETH leg of the trade
    pub notional: Amount,
    /// ETH base units per whole token
    pub price: Amount,
    pub trader: UserId,
    pub timestamp: u64,
}

impl TradeActivity {
    /// Activity of a confirmed order. `None` for pending or failed orders.
    pub fn from_order(order: &Order) -> Option<Self> {
        if order.status() != OrderStatus::Confirmed {
            return None;
        }
        let actual = order.actual_output_amount()?;
        Some(Self {
            notional: order.eth_notional(actual),
            price: order.execution_price()?,
            trader: order.user_id().clone(),
            timestamp: order.settled_at()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingScore {
    pub token_id: TokenId,
    pub score: f64,
    pub trades_in_window: usize,
}

/// Market activity over the trailing window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStats {
    pub token_id: TokenId,
    pub window_start: u64,
    pub volume: Amount,
    pub trades: usize,
    pub unique_traders: usize,
    /// Last versus first execution price in the window
    pub price_change_bps: i64,
}

pub struct TrendingScorer {
    window_secs: u64,
    strategy: Box<dyn DecayStrategy>,
    samples: RwLock<HashMap<TokenId, VecDeque<TradeActivity>>>,
    excluded: RwLock<HashSet<TokenId>>,
    cached: RwLock<Vec<TrendingScore>>,
}

impl std::fmt::Debug for TrendingScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrendingScorer")
            .field("window_secs", &self.window_secs)
            .field("strategy", &self.strategy.name())
            .field("tokens", &self.samples.read().len())
            .finish()
    }
}

impl TrendingScorer {
    pub fn new(config: &TrendingConfig) -> Self {
        Self::with_strategy(
            config.window_secs,
            Box::new(ExponentialDecay::new(config.half_life_secs)),
        )
    }

    pub fn with_strategy(window_secs: u64, strategy: Box<dyn DecayStrategy>) -> Self {
        Self {
            window_secs,
            strategy,
            samples: RwLock::new(HashMap::new()),
            excluded: RwLock::new(HashSet::new()),
            cached: RwLock::new(Vec::new()),
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Record a confirmed trade
    pub fn record_trade(&self, token_id: TokenId, activity: TradeActivity) {
        self.samples
            .write()
            .entry(token_id)
            .or_default()
            .push_back(activity);
    }

    /// Rebuild samples and exclusions from persisted state
    ///
    /// Graduated tokens are excluded and confirmed orders settled inside
    /// the window are replayed. Returns the number of trades restored.
    pub fn restore(&self, store: &dyn TradingStore, now: u64) -> TradingResult<usize> {
        for record in store.list_tokens()? {
            if record.is_graduated() {
                self.exclude(record.token_id());
            }
        }

        let since = now.saturating_sub(self.window_secs);
        let mut restored = 0;
        for order in store.settled_orders_since(since)? {
            if let Some(activity) = TradeActivity::from_order(&order) {
                self.record_trade(order.token_id(), activity);
                restored += 1;
            }
        }
        tracing::info!(
            "Restored {} trades and {} exclusions into trending",
            restored,
            self.excluded.read().len()
        );
        Ok(restored)
    }

    /// Drop a token from rankings (after graduation)
    pub fn exclude(&self, token_id: TokenId) {
        self.excluded.write().insert(token_id);
    }

    pub fn is_excluded(&self, token_id: &TokenId) -> bool {
        self.excluded.read().contains(token_id)
    }

    /// Current score. Zero for excluded tokens.
    pub fn score(&self, token_id: &TokenId, now: u64) -> TrendingScore {
        let (score, trades_in_window) = if self.is_excluded(token_id) {
            (0.0, 0)
        } else {
            self.samples
                .read()
                .get(token_id)
                .map(|s| self.score_samples(s, now))
                .unwrap_or((0.0, 0))
        };
        TrendingScore {
            token_id: *token_id,
            score,
            trades_in_window,
        }
    }

    /// Volume, trade count, unique traders and price change over the window
    pub fn window_stats(&self, token_id: &TokenId, now: u64) -> WindowStats {
        let window_start = now.saturating_sub(self.window_secs);
        let samples = self.samples.read();
        let in_window: Vec<&TradeActivity> = samples
            .get(token_id)
            .map(|queue| queue.iter().filter(|s| s.timestamp >= window_start).collect())
            .unwrap_or_default();

        let volume = in_window
            .iter()
            .fold(Amount::zero(), |acc, s| acc.checked_add(s.notional).unwrap_or(acc));
        let unique_traders = in_window
            .iter()
            .map(|s| &s.trader)
            .collect::<HashSet<_>>()
            .len();
        let first = in_window.iter().min_by_key(|s| s.timestamp).map(|s| s.price);
        let last = in_window.iter().max_by_key(|s| s.timestamp).map(|s| s.price);
        let price_change_bps = match (first, last) {
            (Some(first), Some(last)) => change_bps(first, last),
            _ => 0,
        };

        WindowStats {
            token_id: *token_id,
            window_start,
            volume,
            trades: in_window.len(),
            unique_traders,
            price_change_bps,
        }
    }

    /// Fresh ranking, highest first. Prunes samples outside the window and
    /// refreshes the cached ranking.
    pub fn recompute(&self, now: u64) -> Vec<TrendingScore> {
        let cutoff = now.saturating_sub(self.window_secs);
        let mut ranking = {
            let mut samples = self.samples.write();
            for queue in samples.values_mut() {
                while queue.front().map_or(false, |s| s.timestamp < cutoff) {
                    queue.pop_front();
                }
            }
            samples.retain(|_, queue| !queue.is_empty());

            let excluded = self.excluded.read();
            samples
                .iter()
                .filter(|(token_id, _)| !excluded.contains(token_id))
                .map(|(token_id, queue)| {
                    let (score, trades_in_window) = self.score_samples(queue, now);
                    TrendingScore {
                        token_id: *token_id,
                        score,
                        trades_in_window,
                    }
                })
                .filter(|s| s.trades_in_window > 0)
                .collect::<Vec<_>>()
        };

        ranking.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.token_id.cmp(&b.token_id))
        });
        *self.cached.write() = ranking.clone();
        ranking
    }

    pub fn top(&self, limit: usize, now: u64) -> Vec<TrendingScore> {
        let mut ranking = self.recompute(now);
        ranking.truncate(limit);
        ranking
    }

    /// Ranking from the last recompute
    pub fn cached(&self, limit: usize) -> Vec<TrendingScore> {
        self.cached.read().iter().take(limit).cloned().collect()
    }

    /// Recompute the cached ranking every `interval` until aborted
    pub fn spawn_recompute(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let ranking = self.recompute(crate::now_secs());
                tracing::debug!("Recomputed trending ranking over {} tokens", ranking.len());
            }
        })
    }

    fn score_samples(&self, samples: &VecDeque<TradeActivity>, now: u64) -> (f64, usize) {
        let cutoff = now.saturating_sub(self.window_secs);
        samples
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .fold((0.0, 0), |(score, count), s| {
                let age = now.saturating_sub(s.timestamp);
                let notional = s.notional.to_whole_f64();
                (score + notional * self.strategy.weight(age), count + 1)
            })
    }
}

/// `(last − first) / first` in bps, saturating at the i64 range
fn change_bps(first: Amount, last: Amount) -> i64 {
    if first.is_zero() {
        return 0;
    }
    let scale = Amount::from(BPS_DENOMINATOR as u64);
    let magnitude = |diff: Amount| -> i64 {
        diff.mul_div_floor(scale, first)
            .map(|bps| bps.raw().min((i64::MAX as u64).into()).low_u64() as i64)
            .unwrap_or(i64::MAX)
    };
    if last >= first {
        magnitude(last.saturating_sub(first))
    } else {
        -magnitude(first.saturating_sub(last))
    }
}
