//! Order Coordinator
//!
//! Quotes against the freshest stored reserves, enforces the user's
//! slippage tolerance, persists the pending order and prepares the
//! settlement call. Reserves are never touched here; only confirmed
//! settlements move them.

use std::sync::Arc;

use tracing::{info, warn};

use lib_fees::compute_trade_fee;
use lib_types::{Amount, OrderId, TokenId, BPS_DENOMINATOR};

use super::types::{Order, OrderBuilder, OrderQuote, PlaceOrderRequest, PlacedOrder, SettlementParams};
use crate::bonding_curve::{BondingCurveEngine, EventPublisher, Quote, TradeSide, TradingEvent};
use crate::config::LaunchpadConfig;
use crate::errors::{TradingError, TradingResult};
use crate::invoker::{ContractCall, ContractInvoker};
use crate::storage::TradingStore;

pub struct OrderCoordinator {
    store: Arc<dyn TradingStore>,
    invoker: Arc<dyn ContractInvoker>,
    engine: BondingCurveEngine,
    config: Arc<LaunchpadConfig>,
    events: EventPublisher,
}

impl OrderCoordinator {
    pub fn new(
        store: Arc<dyn TradingStore>,
        invoker: Arc<dyn ContractInvoker>,
        config: Arc<LaunchpadConfig>,
        events: EventPublisher,
    ) -> Self {
        Self {
            store,
            invoker,
            engine: BondingCurveEngine::new(&config.curve),
            config,
            events,
        }
    }

    /// Preview a trade against the current stored reserves, fee included
    ///
    /// `min_output_amount` is the quoted output itself; placement applies
    /// the user's slippage tolerance.
    pub fn quote(
        &self,
        token_id: &TokenId,
        side: TradeSide,
        amount: Amount,
    ) -> TradingResult<OrderQuote> {
        let record = self
            .store
            .get_token(token_id)?
            .ok_or(TradingError::TokenNotFound(*token_id))?;
        let quote = self.engine.quote(record.reserves(), side, amount)?;
        let eth_leg = match side {
            TradeSide::Buy => amount,
            TradeSide::Sell => quote.output_amount,
        };
        let estimated_fee = compute_trade_fee(eth_leg, &self.config.fees)?.fee;
        Ok(order_quote(&quote, quote.output_amount, estimated_fee))
    }

    /// Validate, persist and prepare a trade for settlement
    ///
    /// # Errors
    /// - `SlippageExceeded` if the true price impact is above the tolerance
    /// - any quoting error from the curve engine
    /// - `ContractUnavailable` if the trading contract cannot be resolved
    pub async fn place_order(&self, request: PlaceOrderRequest) -> TradingResult<PlacedOrder> {
        if request.max_slippage_bps > BPS_DENOMINATOR {
            return Err(TradingError::InvalidParameters(format!(
                "max slippage {} bps exceeds 100%",
                request.max_slippage_bps
            )));
        }

        let record = self
            .store
            .get_token(&request.token_id)?
            .ok_or(TradingError::TokenNotFound(request.token_id))?;
        let quote = self.engine.quote(record.reserves(), request.side, request.amount)?;

        if quote.price_impact_bps > request.max_slippage_bps {
            return Err(TradingError::SlippageExceeded {
                impact_bps: quote.price_impact_bps,
                max_slippage_bps: request.max_slippage_bps,
            });
        }

        let order = OrderBuilder::new(
            request.user_id.clone(),
            request.side,
            request.amount,
            *record.reserves(),
        )
        .quoted(quote.output_amount, quote.price_impact_bps)
        .max_slippage_bps(request.max_slippage_bps)
        .social_note(request.social_note.clone())
        .created_at(crate::now_secs())
        .build()?;

        let estimated_fee =
            compute_trade_fee(order.eth_notional(quote.output_amount), &self.config.fees)?.fee;
        let settlement = self.prepare_settlement(&order).await?;

        self.store.insert_order(&order)?;

        info!(
            "Order {} placed: {} {} of {} for {} (impact {} bps)",
            order.order_id(),
            request.side,
            request.amount.to_decimal_string(),
            request.token_id,
            request.user_id,
            quote.price_impact_bps
        );
        self.events.publish(TradingEvent::OrderPlaced {
            order_id: order.order_id(),
            token_id: order.token_id(),
            user_id: order.user_id().clone(),
            side: order.side(),
            input_amount: order.input_amount(),
            quoted_output_amount: order.quoted_output_amount(),
            price_impact_bps: quote.price_impact_bps,
            timestamp: order.created_at(),
        });

        Ok(PlacedOrder {
            order_id: order.order_id(),
            token_id: order.token_id(),
            quote: order_quote(&quote, order.min_output_amount(), estimated_fee),
            settlement,
        })
    }

    pub fn get_order(&self, order_id: &OrderId) -> TradingResult<Order> {
        self.store
            .get_order(order_id)?
            .ok_or(TradingError::UnknownOrder(*order_id))
    }

    /// Orders still awaiting a confirmation, oldest first
    pub fn pending_orders(&self, token_id: &TokenId) -> TradingResult<Vec<Order>> {
        Ok(self.store.pending_orders(token_id)?)
    }

    async fn prepare_settlement(&self, order: &Order) -> TradingResult<SettlementParams> {
        let chain = order.chain();
        let contract = &self.config.settlement.trading_contract;
        let target = self
            .invoker
            .resolve_contract(chain, contract)
            .await
            .map_err(|e| TradingError::ContractUnavailable {
                chain,
                contract: contract.clone(),
                reason: e.to_string(),
            })?;

        let token_address = order.token_id().address_hex();
        let call = ContractCall {
            chain,
            contract: contract.clone(),
            method: order.side().contract_method().to_string(),
            args: vec![
                token_address.clone(),
                order.input_amount().to_string(),
                order.min_output_amount().to_string(),
            ],
        };
        let gas_estimate = match self.invoker.estimate_gas(&call).await {
            Ok(gas) => gas,
            Err(e) => {
                let fallback = self.config.settlement.default_gas_estimate;
                warn!(
                    "Gas estimation for {} on {} failed, using {}: {}",
                    call.method, chain, fallback, e
                );
                fallback
            }
        };

        Ok(SettlementParams {
            chain,
            target,
            method: call.method,
            token_address,
            input_amount: order.input_amount(),
            min_output_amount: order.min_output_amount(),
            gas_estimate,
        })
    }
}

fn order_quote(quote: &Quote, min_output_amount: Amount, estimated_fee: Amount) -> OrderQuote {
    OrderQuote {
        side: quote.side,
        input_amount: quote.input_amount,
        output_amount: quote.output_amount,
        min_output_amount,
        price_impact_bps: quote.display_price_impact_bps,
        spot_price: quote.spot_price,
        execution_price: quote.execution_price,
        estimated_fee,
    }
}
