//! Bonding-curve token launchpad trading engine
//!
//! Tokens are listed on a virtual-reserve constant-product curve. Orders
//! are quoted and persisted as pending; reserves move only when the chain
//! confirms a settlement. Once a token's market cap crosses the graduation
//! threshold its curve closes for good.
//!
//! `Launchpad` wires the components over one store and one event channel.

pub mod config;
pub mod errors;
pub mod bonding_curve;
pub mod orders;
pub mod graduation;
pub mod trending;
pub mod invoker;
pub mod locks;
pub mod storage;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use lib_types::{TokenId, UserId};

pub use config::{
    ConfigError, CurveConfig, GraduationConfig, LaunchpadConfig, SettlementConfig, TrendingConfig,
};
pub use errors::{TradingError, TradingResult};
pub use bonding_curve::{
    BondingCurveEngine, CurveStats, EventPublisher, Phase, Quote, ReserveState, TokenCategory,
    TokenMetadata, TokenRecord, TokenRegistry, TradeSide, TradingEvent,
};
pub use orders::{
    ConfirmationEvent, Order, OrderCoordinator, OrderStatus, PlaceOrderRequest, PlacedOrder,
    ReconcileOutcome, SettlementReconciler, WatcherMessage,
};
pub use graduation::GraduationMonitor;
pub use trending::{
    DecayStrategy, ExponentialDecay, TradeActivity, TrendingScore, TrendingScorer, WindowStats,
};
pub use invoker::{ContractCall, ContractInvoker, StaticContractInvoker};
pub use locks::TokenLocks;
pub use storage::{
    InMemoryTradingStore, SledTradingStore, StorageError, TradingStore, UserLedger,
};

/// Unix seconds, clamped to zero before the epoch
pub fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// The engine's components sharing one store, config and event stream
pub struct Launchpad {
    pub registry: TokenRegistry,
    pub coordinator: OrderCoordinator,
    pub reconciler: Arc<SettlementReconciler>,
    pub trending: Arc<TrendingScorer>,
    graduation: GraduationMonitor,
    store: Arc<dyn TradingStore>,
    config: Arc<LaunchpadConfig>,
}

impl Launchpad {
    /// Validate the config and wire every component. The receiver carries
    /// every `TradingEvent` the engine publishes.
    pub fn new(
        config: LaunchpadConfig,
        store: Arc<dyn TradingStore>,
        invoker: Arc<dyn ContractInvoker>,
    ) -> TradingResult<(Self, mpsc::UnboundedReceiver<TradingEvent>)> {
        config
            .validate()
            .map_err(|e| TradingError::InvalidParameters(e.to_string()))?;
        let config = Arc::new(config);
        let (events, rx) = EventPublisher::channel();

        let trending = Arc::new(TrendingScorer::new(&config.trending));
        trending.restore(store.as_ref(), now_secs())?;
        let locks = Arc::new(TokenLocks::new());
        let registry = TokenRegistry::new(store.clone(), config.clone(), events.clone());
        let coordinator =
            OrderCoordinator::new(store.clone(), invoker, config.clone(), events.clone());
        let reconciler = Arc::new(SettlementReconciler::new(
            store.clone(),
            config.clone(),
            trending.clone(),
            locks,
            events,
        )?);

        let launchpad = Self {
            registry,
            coordinator,
            reconciler,
            trending,
            graduation: GraduationMonitor::new(&config.graduation)?,
            store,
            config,
        };
        Ok((launchpad, rx))
    }

    pub fn config(&self) -> &LaunchpadConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TradingStore> {
        &self.store
    }

    /// Price, market cap and graduation progress of a listed token
    pub fn token_stats(&self, token_id: &TokenId) -> TradingResult<CurveStats> {
        self.registry.get(token_id)?.stats(self.graduation.threshold())
    }

    /// Volume, trades, unique traders and price change over the trending
    /// window
    pub fn token_window(&self, token_id: &TokenId) -> TradingResult<WindowStats> {
        self.registry.get(token_id)?;
        Ok(self.trending.window_stats(token_id, now_secs()))
    }

    /// Accumulated fees, points and volume for a user
    pub fn user_ledger(&self, user_id: &UserId) -> TradingResult<UserLedger> {
        Ok(self
            .store
            .get_user_ledger(user_id)?
            .unwrap_or_else(|| UserLedger::new(user_id.clone())))
    }

    /// Run the reconciliation loop over a watcher channel
    pub fn spawn_reconciler(&self, rx: mpsc::Receiver<WatcherMessage>) -> JoinHandle<()> {
        tokio::spawn(self.reconciler.clone().run(rx))
    }

    /// Refresh the cached trending ranking on the configured interval
    pub fn spawn_trending(&self) -> JoinHandle<()> {
        let interval =
            std::time::Duration::from_secs(self.config.trending.recompute_interval_secs.max(1));
        self.trending.clone().spawn_recompute(interval)
    }
}
