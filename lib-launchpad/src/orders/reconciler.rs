//! Settlement Reconciler
//!
//! Applies chain confirmations to stored state. For each confirmation the
//! order's terminal state, the token's new reserves, the graduation check
//! and the user's fee and reward credit are committed together.
//!
//! # Ordering
//! Confirmations for one token are applied one at a time under that
//! token's lock. Streamed confirmations are buffered until the chain
//! watermark passes their block, then released in block order.
//!
//! # Idempotence
//! A confirmation for an order that is already terminal is a no-op and
//! returns `AlreadySettled`.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use lib_fees::compute_trade_fee;
use lib_types::{BlockNumber, ChainId, OrderId, TokenId};

use super::reorder::ReorderBuffer;
use super::types::{ConfirmationEvent, Order, QuoteDeviation, ReconcileOutcome, WatcherMessage};
use crate::bonding_curve::{
    spot_price, BondingCurveEngine, EventPublisher, TradeSide, TradingEvent,
};
use crate::config::LaunchpadConfig;
use crate::errors::{TradingError, TradingResult};
use crate::graduation::GraduationMonitor;
use crate::locks::TokenLocks;
use crate::storage::{LedgerCredit, SettlementCommit, StorageError, TokenUpdate, TradingStore};
use crate::trending::{TradeActivity, TrendingScorer};

/// Result for one confirmation in a batch or flush
pub type ReconcileReport = Vec<(OrderId, TradingResult<ReconcileOutcome>)>;

/// A commit plus the side effects to run once it lands
struct PreparedSettlement {
    commit: SettlementCommit,
    events: Vec<TradingEvent>,
    outcome: ReconcileOutcome,
    trade_sample: Option<(TokenId, TradeActivity)>,
    graduated: bool,
}

pub struct SettlementReconciler {
    store: Arc<dyn TradingStore>,
    engine: BondingCurveEngine,
    graduation: GraduationMonitor,
    trending: Arc<TrendingScorer>,
    locks: Arc<TokenLocks>,
    buffer: Mutex<ReorderBuffer>,
    config: Arc<LaunchpadConfig>,
    events: EventPublisher,
}

impl SettlementReconciler {
    pub fn new(
        store: Arc<dyn TradingStore>,
        config: Arc<LaunchpadConfig>,
        trending: Arc<TrendingScorer>,
        locks: Arc<TokenLocks>,
        events: EventPublisher,
    ) -> TradingResult<Self> {
        Ok(Self {
            store,
            engine: BondingCurveEngine::new(&config.curve),
            graduation: GraduationMonitor::new(&config.graduation)?,
            trending,
            locks,
            buffer: Mutex::new(ReorderBuffer::new()),
            config,
            events,
        })
    }

    /// Apply one confirmation immediately
    ///
    /// # Errors
    /// - `UnknownOrder` if no such order was ever placed
    /// - `VersionConflict` if optimistic commits keep losing to another writer
    pub async fn apply_confirmation(
        &self,
        event: &ConfirmationEvent,
    ) -> TradingResult<ReconcileOutcome> {
        let order = self.load_order(&event.order_id)?;
        if order.is_terminal() {
            return Ok(already_settled(&order));
        }

        let token_id = order.token_id();
        let _guard = self.locks.lock(token_id).await;

        let max_attempts = self.config.settlement.max_commit_retries;
        for attempt in 1..=max_attempts {
            // Re-read under the lock: another task may have settled it
            let order = self.load_order(&event.order_id)?;
            if order.is_terminal() {
                return Ok(already_settled(&order));
            }

            let prepared = self.prepare(order, event)?;
            match self.store.commit_settlement(&prepared.commit) {
                Ok(()) => return Ok(self.finish(prepared)),
                Err(StorageError::VersionConflict { expected, found, .. }) => {
                    warn!(
                        "Version conflict settling {} on {} (attempt {}/{}): expected {}, found {}",
                        event.order_id, token_id, attempt, max_attempts, expected, found
                    );
                }
                Err(StorageError::OrderNotPending(_)) => {
                    let order = self.load_order(&event.order_id)?;
                    return Ok(already_settled(&order));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(TradingError::VersionConflict {
            token_id,
            attempts: max_attempts,
        })
    }

    /// Apply a batch, ordered by block within each token
    pub async fn reconcile_batch(&self, events: Vec<ConfirmationEvent>) -> ReconcileReport {
        let mut report = Vec::with_capacity(events.len());
        let mut by_token: BTreeMap<TokenId, Vec<(BlockNumber, usize, ConfirmationEvent)>> =
            BTreeMap::new();

        for (arrival, event) in events.into_iter().enumerate() {
            match self.load_order(&event.order_id) {
                Ok(order) => by_token
                    .entry(order.token_id())
                    .or_default()
                    .push((event.block_number, arrival, event)),
                Err(e) => report.push((event.order_id, Err(e))),
            }
        }

        for (_, mut queue) in by_token {
            queue.sort_by_key(|(block, arrival, _)| (*block, *arrival));
            let events = queue.into_iter().map(|(_, _, event)| event).collect();
            let (applied, deferred) = self.apply_with_deferral(events).await;
            report.extend(applied);
            report.extend(deferred.into_iter().map(|(event, e)| (event.order_id, Err(e))));
        }
        report
    }

    /// Buffer a streamed confirmation until its block is below the watermark
    pub async fn ingest(&self, event: ConfirmationEvent) -> TradingResult<ReconcileOutcome> {
        let order = self.load_order(&event.order_id)?;
        if order.is_terminal() {
            return Ok(already_settled(&order));
        }

        let token_id = order.token_id();
        let order_id = event.order_id;
        let overflow = {
            let mut buffer = self.buffer.lock();
            if !buffer.push(token_id, event) {
                debug!("Confirmation for {} already buffered", order_id);
            }
            if buffer.buffered_for(&token_id) > self.config.settlement.max_buffered_per_token {
                buffer.drain_token(&token_id)
            } else {
                Vec::new()
            }
        };

        if !overflow.is_empty() {
            warn!(
                "Reorder buffer for {} exceeded {} entries, flushing without watermark",
                token_id, self.config.settlement.max_buffered_per_token
            );
            self.apply_in_order(token_id, overflow).await;
        }
        Ok(ReconcileOutcome::Buffered { order_id })
    }

    /// Release and apply buffered confirmations at or below `block`
    pub async fn advance_watermark(&self, chain: ChainId, block: BlockNumber) -> ReconcileReport {
        let ready = self.buffer.lock().drain_ready(chain, block);
        let mut report = Vec::new();
        for (token_id, events) in ready {
            report.extend(self.apply_in_order(token_id, events).await);
        }
        report
    }

    /// Apply everything still buffered, regardless of watermark
    ///
    /// Confirmations that still depend on a missing trade stay buffered.
    pub async fn flush_all(&self) -> ReconcileReport {
        let drained = self.buffer.lock().drain_all();
        let mut report = Vec::new();
        for (token_id, events) in drained {
            debug!("Flushing {} buffered confirmations for {}", events.len(), token_id);
            report.extend(self.apply_in_order(token_id, events).await);
        }
        report
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Consume watcher messages until the channel closes
    ///
    /// Errors are logged and never stop the loop.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<WatcherMessage>) {
        info!("Settlement reconciler started");
        while let Some(message) = rx.recv().await {
            match message {
                WatcherMessage::Confirmation(event) => {
                    let order_id = event.order_id;
                    if let Err(e) = self.ingest(event).await {
                        log_failure(order_id, &e);
                    }
                }
                WatcherMessage::Watermark { chain, block } => {
                    for (order_id, result) in self.advance_watermark(chain, block).await {
                        if let Err(e) = result {
                            log_failure(order_id, &e);
                        }
                    }
                }
            }
        }

        let remaining = self.buffered();
        if remaining > 0 {
            info!("Watcher channel closed, flushing {} buffered confirmations", remaining);
            for (order_id, result) in self.flush_all().await {
                if let Err(e) = result {
                    log_failure(order_id, &e);
                }
            }
        }
        info!("Settlement reconciler stopped");
    }

    /// Apply released confirmations for one token. Any that still fail on
    /// reserve state go back into the buffer for the next watermark.
    async fn apply_in_order(
        &self,
        token_id: TokenId,
        events: Vec<ConfirmationEvent>,
    ) -> ReconcileReport {
        let (mut report, deferred) = self.apply_with_deferral(events).await;
        if deferred.is_empty() {
            return report;
        }

        let mut buffer = self.buffer.lock();
        for (event, e) in deferred {
            warn!(
                "Confirmation for {} at block {} re-buffered: {}",
                event.order_id, event.block_number, e
            );
            let order_id = event.order_id;
            buffer.push(token_id, event);
            report.push((order_id, Ok(ReconcileOutcome::Buffered { order_id })));
        }
        report
    }

    /// Apply in order, then retry confirmations that failed on reserve
    /// state until a pass makes no progress.
    ///
    /// Transactions in one block share a block number, so a trade can be
    /// delivered ahead of the trade its on-chain output depended on.
    async fn apply_with_deferral(
        &self,
        events: Vec<ConfirmationEvent>,
    ) -> (ReconcileReport, Vec<(ConfirmationEvent, TradingError)>) {
        let mut report = Vec::with_capacity(events.len());
        let mut pending = events;
        loop {
            let attempted = pending.len();
            let mut deferred = Vec::new();
            for event in pending {
                match self.apply_confirmation(&event).await {
                    Err(e) if depends_on_order(&e) => {
                        debug!("Deferring confirmation for {}: {}", event.order_id, e);
                        deferred.push((event, e));
                    }
                    result => report.push((event.order_id, result)),
                }
            }
            if deferred.is_empty() || deferred.len() == attempted {
                return (report, deferred);
            }
            pending = deferred.into_iter().map(|(event, _)| event).collect();
        }
    }

    fn load_order(&self, order_id: &OrderId) -> TradingResult<Order> {
        self.store.get_order(order_id)?.ok_or_else(|| {
            warn!("Confirmation for unknown order {}", order_id);
            TradingError::UnknownOrder(*order_id)
        })
    }

    fn prepare(&self, order: Order, event: &ConfirmationEvent) -> TradingResult<PreparedSettlement> {
        let now = crate::now_secs();
        let order_id = order.order_id();
        let token_id = order.token_id();

        if !event.success {
            let failed = order.fail(event.block_number, now)?;
            return Ok(PreparedSettlement {
                commit: SettlementCommit {
                    order: failed,
                    token_update: None,
                    ledger_credit: None,
                },
                events: vec![TradingEvent::TradeFailed {
                    order_id,
                    token_id,
                    block_number: event.block_number,
                    timestamp: now,
                }],
                outcome: ReconcileOutcome::Failed { order_id },
                trade_sample: None,
                graduated: false,
            });
        }

        let record = self
            .store
            .get_token(&token_id)?
            .ok_or(TradingError::TokenNotFound(token_id))?;
        if event.block_number < record.last_applied_block() {
            warn!(
                "Late confirmation for {} at block {} (token {} already at {})",
                order_id,
                event.block_number,
                token_id,
                record.last_applied_block()
            );
        }

        let side = order.side();
        let actual = event.actual_output_amount;
        let reserves =
            self.engine
                .apply_trade_delta(record.reserves(), side, order.input_amount(), actual)?;
        let notional = order.eth_notional(actual);
        let fee = compute_trade_fee(notional, &self.config.fees)?;

        let deviation = QuoteDeviation::between(order.quoted_output_amount(), actual);
        let audit = match deviation
            .ensure_within(order_id, self.config.settlement.stale_quote_tolerance_bps)
        {
            Ok(()) => None,
            Err(e) => {
                warn!("{}", e);
                Some(deviation)
            }
        };

        let updated = record.after_trade(reserves, side, notional, event.block_number, now)?;
        let (updated, graduation_event) = match side {
            TradeSide::Buy => self.graduation.evaluate(updated, event.block_number, now)?,
            TradeSide::Sell => (updated, None),
        };

        let user_id = order.user_id().clone();
        let confirmed =
            order.confirm(actual, event.block_number, fee.fee, fee.reward_points, audit, now)?;
        let trade_sample = TradeActivity::from_order(&confirmed).map(|a| (token_id, a));

        let mut events = vec![
            TradingEvent::TradeConfirmed {
                order_id,
                token_id,
                user_id: user_id.clone(),
                side,
                input_amount: confirmed.input_amount(),
                output_amount: actual,
                price: spot_price(updated.reserves())?,
                fee: fee.fee,
                reward_points: fee.reward_points,
                block_number: event.block_number,
                timestamp: now,
            },
            TradingEvent::ReservesUpdated {
                token_id,
                reserves: *updated.reserves(),
                market_cap: updated.market_cap()?,
                block_number: event.block_number,
                timestamp: now,
            },
        ];
        let graduated = graduation_event.is_some();
        events.extend(graduation_event);
        if let Some(deviation) = audit {
            events.push(TradingEvent::AuditFlagged {
                order_id,
                token_id,
                deviation,
                block_number: event.block_number,
            });
        }

        Ok(PreparedSettlement {
            commit: SettlementCommit {
                order: confirmed,
                token_update: Some(TokenUpdate {
                    record: updated,
                    expected_version: record.version(),
                }),
                ledger_credit: Some(LedgerCredit {
                    user_id,
                    reward_points: fee.reward_points,
                    fee: fee.fee,
                    volume: notional,
                }),
            },
            events,
            outcome: ReconcileOutcome::Confirmed {
                order_id,
                graduated,
                audit,
            },
            trade_sample,
            graduated,
        })
    }

    /// Side effects after a successful commit
    fn finish(&self, prepared: PreparedSettlement) -> ReconcileOutcome {
        if let Some((token_id, activity)) = prepared.trade_sample {
            self.trending.record_trade(token_id, activity);
            if prepared.graduated {
                self.trending.exclude(token_id);
            }
        }
        info!(
            "Order {} reconciled: {:?}",
            prepared.commit.order.order_id(),
            prepared.commit.order.status()
        );
        for event in prepared.events {
            self.events.publish(event);
        }
        prepared.outcome
    }
}

fn already_settled(order: &Order) -> ReconcileOutcome {
    debug!("Order {} already {}, ignoring confirmation", order.order_id(), order.status());
    ReconcileOutcome::AlreadySettled {
        order_id: order.order_id(),
        status: order.status(),
    }
}

/// Failures that another confirmation for the same token can resolve
fn depends_on_order(err: &TradingError) -> bool {
    matches!(
        err,
        TradingError::InsufficientLiquidity { .. } | TradingError::VersionConflict { .. }
    )
}

fn log_failure(order_id: OrderId, err: &TradingError) {
    match err {
        TradingError::UnknownOrder(_) => warn!("Dropping confirmation for {}: {}", order_id, err),
        _ => error!("Failed to reconcile {}: {}", order_id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonding_curve::{TokenCategory, TokenMetadata, TokenRegistry};
    use crate::invoker::StaticContractInvoker;
    use crate::orders::{OrderCoordinator, OrderStatus, PlaceOrderRequest};
    use crate::storage::InMemoryTradingStore;
    use lib_types::{Amount, UserId};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        store: Arc<InMemoryTradingStore>,
        coordinator: OrderCoordinator,
        reconciler: SettlementReconciler,
        trending: Arc<TrendingScorer>,
        events: UnboundedReceiver<TradingEvent>,
    }

    fn token() -> TokenId {
        TokenId::new(ChainId::RiseChain, [0x33; 20])
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryTradingStore::new());
        let config = Arc::new(LaunchpadConfig::default());
        let (publisher, events) = EventPublisher::channel();
        TokenRegistry::new(store.clone(), config.clone(), EventPublisher::disabled())
            .list_token(
                token(),
                TokenMetadata {
                    name: "Reconciled".to_string(),
                    symbol: "REC".to_string(),
                    description: String::new(),
                    image: None,
                    category: TokenCategory::Meme,
                    tags: Vec::new(),
                    creator: UserId::from("ivan"),
                },
                1,
            )
            .unwrap();

        let invoker = StaticContractInvoker::new()
            .with_contract(ChainId::RiseChain, "tradingEngine", "0xengine")
            .with_gas_estimate(200_000);
        let coordinator = OrderCoordinator::new(
            store.clone(),
            Arc::new(invoker),
            config.clone(),
            EventPublisher::disabled(),
        );
        let trending = Arc::new(TrendingScorer::new(&config.trending));
        let reconciler = SettlementReconciler::new(
            store.clone(),
            config,
            trending.clone(),
            Arc::new(TokenLocks::new()),
            publisher,
        )
        .unwrap();

        Harness {
            store,
            coordinator,
            reconciler,
            trending,
            events,
        }
    }

    async fn place_buy(h: &Harness, eth: u64) -> (OrderId, Amount) {
        let placed = h
            .coordinator
            .place_order(PlaceOrderRequest {
                user_id: UserId::from("judy"),
                token_id: token(),
                side: TradeSide::Buy,
                amount: Amount::from_whole(eth),
                max_slippage_bps: 5_000,
                social_note: None,
            })
            .await
            .unwrap();
        (placed.order_id, placed.quote.output_amount)
    }

    fn confirmation(order_id: OrderId, output: Amount, block: BlockNumber) -> ConfirmationEvent {
        ConfirmationEvent {
            order_id,
            actual_output_amount: output,
            block_number: block,
            success: true,
        }
    }

    fn drain_types(rx: &mut UnboundedReceiver<TradingEvent>) -> Vec<&'static str> {
        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type());
        }
        types
    }

    #[tokio::test]
    async fn test_confirmation_moves_reserves_and_credits_user() {
        let mut h = harness();
        let (order_id, output) = place_buy(&h, 1).await;

        let outcome = h
            .reconciler
            .apply_confirmation(&confirmation(order_id, output, 100))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Confirmed {
                order_id,
                graduated: false,
                audit: None
            }
        );

        let record = h.store.get_token(&token()).unwrap().unwrap();
        assert_eq!(record.version(), 1);
        assert_eq!(record.last_applied_block(), 100);
        assert_eq!(record.reserves().virtual_eth_reserves(), Amount::from_whole(31));
        assert_eq!(record.reserves().real_eth_reserves(), Amount::from_whole(1));

        let order = h.store.get_order(&order_id).unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.reward_points(), 10);

        let ledger = h.store.get_user_ledger(&UserId::from("judy")).unwrap().unwrap();
        assert_eq!(ledger.reward_points, 10);
        assert_eq!(ledger.fees_paid.to_string(), "10000000000000000");
        assert_eq!(ledger.volume, Amount::from_whole(1));

        assert_eq!(drain_types(&mut h.events), vec!["trade_confirmed", "reserves_updated"]);
        assert_eq!(h.trending.score(&token(), crate::now_secs()).trades_in_window, 1);
    }

    #[tokio::test]
    async fn test_failed_confirmation_leaves_reserves() {
        let mut h = harness();
        let (order_id, output) = place_buy(&h, 1).await;

        let mut event = confirmation(order_id, output, 100);
        event.success = false;
        let outcome = h.reconciler.apply_confirmation(&event).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Failed { order_id });

        let record = h.store.get_token(&token()).unwrap().unwrap();
        assert_eq!(record.version(), 0);
        assert_eq!(record.reserves().virtual_eth_reserves(), Amount::from_whole(30));
        assert!(h.store.get_user_ledger(&UserId::from("judy")).unwrap().is_none());
        assert_eq!(drain_types(&mut h.events), vec!["trade_failed"]);
    }

    #[tokio::test]
    async fn test_replay_is_noop() {
        let h = harness();
        let (order_id, output) = place_buy(&h, 1).await;
        let event = confirmation(order_id, output, 100);

        h.reconciler.apply_confirmation(&event).await.unwrap();
        let replay = h.reconciler.apply_confirmation(&event).await.unwrap();
        assert_eq!(
            replay,
            ReconcileOutcome::AlreadySettled {
                order_id,
                status: OrderStatus::Confirmed
            }
        );

        let record = h.store.get_token(&token()).unwrap().unwrap();
        assert_eq!(record.version(), 1);
        let ledger = h.store.get_user_ledger(&UserId::from("judy")).unwrap().unwrap();
        assert_eq!(ledger.trades, 1);
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let h = harness();
        let order_id = OrderId::new();
        let result = h
            .reconciler
            .apply_confirmation(&confirmation(order_id, Amount::one(), 1))
            .await;
        assert_eq!(result, Err(TradingError::UnknownOrder(order_id)));
    }

    #[tokio::test]
    async fn test_stale_quote_is_flagged_not_rejected() {
        let mut h = harness();
        let (order_id, output) = place_buy(&h, 1).await;
        let actual = output.apply_bps(9_000).unwrap();

        let outcome = h
            .reconciler
            .apply_confirmation(&confirmation(order_id, actual, 100))
            .await
            .unwrap();
        let deviation = match outcome {
            ReconcileOutcome::Confirmed { audit: Some(deviation), .. } => deviation,
            other => panic!("expected an audited confirmation, got {:?}", other),
        };
        assert_eq!(deviation.deviation_bps, 1_000);

        let order = h.store.get_order(&order_id).unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.audit(), Some(&deviation));
        assert!(drain_types(&mut h.events).contains(&"audit_flagged"));
    }

    #[tokio::test]
    async fn test_graduation_closes_curve() {
        let mut h = harness();
        let (order_id, output) = place_buy(&h, 10).await;

        let outcome = h
            .reconciler
            .apply_confirmation(&confirmation(order_id, output, 100))
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Confirmed { graduated: true, .. }));

        let record = h.store.get_token(&token()).unwrap().unwrap();
        assert!(record.is_graduated());
        assert!(drain_types(&mut h.events).contains(&"graduated"));
        assert!(h.trending.top(10, crate::now_secs()).is_empty());
        assert_eq!(h.trending.window_stats(&token(), crate::now_secs()).trades, 1);

        let quote = h.coordinator.quote(&token(), TradeSide::Buy, Amount::from_whole(1));
        assert_eq!(quote, Err(TradingError::CurveInactive(token())));
    }

    #[tokio::test]
    async fn test_batch_applies_in_block_order() {
        let h = harness();
        let (first, first_out) = place_buy(&h, 1).await;
        let (second, second_out) = place_buy(&h, 1).await;

        let report = h
            .reconciler
            .reconcile_batch(vec![
                confirmation(second, second_out, 12),
                confirmation(first, first_out, 11),
            ])
            .await;
        let order: Vec<OrderId> = report.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![first, second]);
        assert!(report.iter().all(|(_, r)| r.is_ok()));

        let record = h.store.get_token(&token()).unwrap().unwrap();
        assert_eq!(record.version(), 2);
        assert_eq!(record.last_applied_block(), 12);
    }

    #[tokio::test]
    async fn test_streamed_confirmations_wait_for_watermark() {
        let h = harness();
        let (first, first_out) = place_buy(&h, 1).await;
        let (second, second_out) = place_buy(&h, 1).await;

        let buffered = h.reconciler.ingest(confirmation(second, second_out, 21)).await.unwrap();
        assert_eq!(buffered, ReconcileOutcome::Buffered { order_id: second });
        h.reconciler.ingest(confirmation(first, first_out, 20)).await.unwrap();
        assert_eq!(h.reconciler.buffered(), 2);

        // Nothing at or below block 19
        assert!(h.reconciler.advance_watermark(ChainId::RiseChain, 19).await.is_empty());

        let report = h.reconciler.advance_watermark(ChainId::RiseChain, 20).await;
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].0, first);
        assert_eq!(h.reconciler.buffered(), 1);

        let report = h.reconciler.flush_all().await;
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].0, second);
        assert_eq!(h.reconciler.buffered(), 0);
        assert_eq!(h.store.get_token(&token()).unwrap().unwrap().version(), 2);
    }

    async fn place_sell(h: &Harness, tokens: Amount) -> OrderId {
        h.coordinator
            .place_order(PlaceOrderRequest {
                user_id: UserId::from("judy"),
                token_id: token(),
                side: TradeSide::Sell,
                amount: tokens,
                max_slippage_bps: 5_000,
                social_note: None,
            })
            .await
            .unwrap()
            .order_id
    }

    #[tokio::test]
    async fn test_same_block_dependency_applied_after_its_trade() {
        let h = harness();
        let (first_buy, first_out) = place_buy(&h, 1).await;
        h.reconciler
            .apply_confirmation(&confirmation(first_buy, first_out, 10))
            .await
            .unwrap();

        let sell = place_sell(&h, first_out).await;
        let (second_buy, second_out) = place_buy(&h, 1).await;

        // On chain the second buy ran first, so the sell paid out more ETH
        // than the curve holds until that buy is applied.
        let sell_output = Amount::from_decimal_str("1.5").unwrap();
        h.reconciler.ingest(confirmation(sell, sell_output, 11)).await.unwrap();
        h.reconciler.ingest(confirmation(second_buy, second_out, 11)).await.unwrap();

        let report = h.reconciler.advance_watermark(ChainId::RiseChain, 11).await;
        let applied: Vec<OrderId> = report.iter().map(|(id, _)| *id).collect();
        assert_eq!(applied, vec![second_buy, sell]);
        assert!(report
            .iter()
            .all(|(_, r)| matches!(r, Ok(ReconcileOutcome::Confirmed { .. }))));
        assert_eq!(h.reconciler.buffered(), 0);

        let order = h.store.get_order(&sell).unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        let record = h.store.get_token(&token()).unwrap().unwrap();
        assert_eq!(
            record.reserves().real_eth_reserves(),
            Amount::from_decimal_str("0.5").unwrap()
        );
    }

    #[tokio::test]
    async fn test_unresolved_dependency_stays_buffered() {
        let h = harness();
        let (first_buy, first_out) = place_buy(&h, 1).await;
        h.reconciler
            .apply_confirmation(&confirmation(first_buy, first_out, 10))
            .await
            .unwrap();

        let sell = place_sell(&h, first_out).await;
        h.reconciler
            .ingest(confirmation(sell, Amount::from_whole(5), 11))
            .await
            .unwrap();

        let report = h.reconciler.advance_watermark(ChainId::RiseChain, 11).await;
        assert_eq!(report, vec![(sell, Ok(ReconcileOutcome::Buffered { order_id: sell }))]);
        assert_eq!(h.reconciler.buffered(), 1);
        assert_eq!(h.store.get_order(&sell).unwrap().unwrap().status(), OrderStatus::Pending);

        // The buy it depended on arrives with the next block
        let (late_buy, late_out) = place_buy(&h, 5).await;
        h.reconciler.ingest(confirmation(late_buy, late_out, 12)).await.unwrap();
        let report = h.reconciler.advance_watermark(ChainId::RiseChain, 12).await;
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(h.reconciler.buffered(), 0);
        assert_eq!(h.store.get_order(&sell).unwrap().unwrap().status(), OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_batch_reports_unresolvable_dependency() {
        let h = harness();
        let (first_buy, first_out) = place_buy(&h, 1).await;
        let sell = place_sell_after(&h, first_buy, first_out).await;

        let report = h
            .reconciler
            .reconcile_batch(vec![confirmation(sell, Amount::from_whole(5), 11)])
            .await;
        assert!(matches!(
            report[0].1,
            Err(TradingError::InsufficientLiquidity { .. })
        ));
    }

    async fn place_sell_after(h: &Harness, buy: OrderId, buy_out: Amount) -> OrderId {
        h.reconciler
            .apply_confirmation(&confirmation(buy, buy_out, 10))
            .await
            .unwrap();
        place_sell(h, buy_out).await
    }

    #[tokio::test]
    async fn test_run_loop_drains_channel() {
        let h = harness();
        let (order_id, output) = place_buy(&h, 1).await;
        let reconciler = Arc::new(h.reconciler);

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(reconciler.clone().run(rx));
        tx.send(WatcherMessage::Confirmation(confirmation(order_id, output, 5)))
            .await
            .unwrap();
        tx.send(WatcherMessage::Confirmation(confirmation(OrderId::new(), output, 5)))
            .await
            .unwrap();
        tx.send(WatcherMessage::Watermark {
            chain: ChainId::RiseChain,
            block: 5,
        })
        .await
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        let order = h.store.get_order(&order_id).unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(reconciler.buffered(), 0);
    }
}
