//! Order Types
//!
//! # State Machine
//! ```text
//!                ┌───────────┐
//!           ┌──▶ │ Confirmed │
//! ┌─────────┐    └───────────┘
//! │ Pending │
//! └─────────┘    ┌───────────┐
//!           └──▶ │  Failed   │
//!                └───────────┘
//! ```
//! Both terminal states are final. Transitions consume the order and
//! return a new value.

use serde::{Deserialize, Serialize};

use lib_types::{Amount, BlockNumber, Bps, ChainId, OrderId, TokenId, UserId, BPS_DENOMINATOR};

use crate::bonding_curve::{ReserveState, TradeSide};
use crate::errors::{TradingError, TradingResult};

pub const MAX_SOCIAL_NOTE_LEN: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Confirmed => write!(f, "confirmed"),
            OrderStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Gap between the quoted and the settled output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDeviation {
    pub quoted: Amount,
    pub actual: Amount,
    pub deviation_bps: Bps,
}

impl QuoteDeviation {
    /// `|actual − quoted| / quoted` in bps, saturating
    pub fn between(quoted: Amount, actual: Amount) -> Self {
        let diff = if actual > quoted {
            actual.saturating_sub(quoted)
        } else {
            quoted.saturating_sub(actual)
        };
        let deviation_bps = if quoted.is_zero() {
            if diff.is_zero() { 0 } else { Bps::MAX }
        } else {
            diff.mul_div_floor(Amount::from(BPS_DENOMINATOR as u64), quoted)
                .map(|bps| bps.raw().min(Bps::MAX.into()).low_u32())
                .unwrap_or(Bps::MAX)
        };
        Self {
            quoted,
            actual,
            deviation_bps,
        }
    }

    pub fn exceeds(&self, tolerance_bps: Bps) -> bool {
        self.deviation_bps > tolerance_bps
    }

    /// `StaleQuoteMismatch` if the deviation is above tolerance
    pub fn ensure_within(&self, order_id: OrderId, tolerance_bps: Bps) -> TradingResult<()> {
        if self.exceeds(tolerance_bps) {
            return Err(TradingError::StaleQuoteMismatch {
                order_id,
                quoted: self.quoted,
                actual: self.actual,
                deviation_bps: self.deviation_bps,
            });
        }
        Ok(())
    }
}

// ============================================================================
// ORDER
// ============================================================================

/// A user's intent to trade against one token's curve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    order_id: OrderId,
    user_id: UserId,
    token_id: TokenId,
    side: TradeSide,
    input_amount: Amount,
    quoted_output_amount: Amount,
    /// Floor enforced by the settlement contract
    min_output_amount: Amount,
    max_slippage_bps: Bps,
    price_impact_bps: Bps,
    /// Reserves the quote was computed from
    reserve_snapshot: ReserveState,
    status: OrderStatus,
    created_at: u64,
    settled_at: Option<u64>,
    actual_output_amount: Option<Amount>,
    block_number: Option<BlockNumber>,
    fee: Option<Amount>,
    reward_points: u64,
    audit: Option<QuoteDeviation>,
    social_note: Option<String>,
}

impl Order {
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn token_id(&self) -> TokenId {
        self.token_id
    }

    pub fn chain(&self) -> ChainId {
        self.token_id.chain
    }

    pub fn side(&self) -> TradeSide {
        self.side
    }

    pub fn input_amount(&self) -> Amount {
        self.input_amount
    }

    pub fn quoted_output_amount(&self) -> Amount {
        self.quoted_output_amount
    }

    pub fn min_output_amount(&self) -> Amount {
        self.min_output_amount
    }

    pub fn max_slippage_bps(&self) -> Bps {
        self.max_slippage_bps
    }

    pub fn price_impact_bps(&self) -> Bps {
        self.price_impact_bps
    }

    pub fn reserve_snapshot(&self) -> &ReserveState {
        &self.reserve_snapshot
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn settled_at(&self) -> Option<u64> {
        self.settled_at
    }

    pub fn actual_output_amount(&self) -> Option<Amount> {
        self.actual_output_amount
    }

    pub fn block_number(&self) -> Option<BlockNumber> {
        self.block_number
    }

    pub fn fee(&self) -> Option<Amount> {
        self.fee
    }

    pub fn reward_points(&self) -> u64 {
        self.reward_points
    }

    pub fn audit(&self) -> Option<&QuoteDeviation> {
        self.audit.as_ref()
    }

    pub fn social_note(&self) -> Option<&str> {
        self.social_note.as_deref()
    }

    /// ETH leg of the trade given a settled output
    pub fn eth_notional(&self, actual_output: Amount) -> Amount {
        match self.side {
            TradeSide::Buy => self.input_amount,
            TradeSide::Sell => actual_output,
        }
    }

    /// ETH base units per whole token actually traded. `None` until
    /// confirmed.
    pub fn execution_price(&self) -> Option<Amount> {
        let actual = self.actual_output_amount?;
        let (eth_leg, token_leg) = match self.side {
            TradeSide::Buy => (self.input_amount, actual),
            TradeSide::Sell => (actual, self.input_amount),
        };
        eth_leg.mul_div_floor(Amount::one(), token_leg)
    }

    /// Pending → Confirmed
    pub fn confirm(
        self,
        actual_output_amount: Amount,
        block_number: BlockNumber,
        fee: Amount,
        reward_points: u64,
        audit: Option<QuoteDeviation>,
        settled_at: u64,
    ) -> TradingResult<Order> {
        self.require_pending("confirm")?;
        Ok(Order {
            status: OrderStatus::Confirmed,
            settled_at: Some(settled_at),
            actual_output_amount: Some(actual_output_amount),
            block_number: Some(block_number),
            fee: Some(fee),
            reward_points,
            audit,
            ..self
        })
    }

    /// Pending → Failed. Reserves, fees and points are untouched.
    pub fn fail(self, block_number: BlockNumber, settled_at: u64) -> TradingResult<Order> {
        self.require_pending("fail")?;
        Ok(Order {
            status: OrderStatus::Failed,
            settled_at: Some(settled_at),
            block_number: Some(block_number),
            ..self
        })
    }

    fn require_pending(&self, action: &str) -> TradingResult<()> {
        if self.is_terminal() {
            return Err(TradingError::InvalidTransition {
                order_id: self.order_id,
                reason: format!("cannot {} a {} order", action, self.status),
            });
        }
        Ok(())
    }
}

/// Validated constructor for a pending `Order`
#[derive(Debug, Clone)]
pub struct OrderBuilder {
    order_id: OrderId,
    user_id: UserId,
    side: TradeSide,
    input_amount: Amount,
    reserve_snapshot: ReserveState,
    quoted_output_amount: Amount,
    max_slippage_bps: Bps,
    price_impact_bps: Bps,
    social_note: Option<String>,
    created_at: u64,
}

impl OrderBuilder {
    pub fn new(
        user_id: UserId,
        side: TradeSide,
        input_amount: Amount,
        reserve_snapshot: ReserveState,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            user_id,
            side,
            input_amount,
            reserve_snapshot,
            quoted_output_amount: Amount::zero(),
            max_slippage_bps: 0,
            price_impact_bps: 0,
            social_note: None,
            created_at: 0,
        }
    }

    pub fn order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn quoted(mut self, output_amount: Amount, price_impact_bps: Bps) -> Self {
        self.quoted_output_amount = output_amount;
        self.price_impact_bps = price_impact_bps;
        self
    }

    pub fn max_slippage_bps(mut self, bps: Bps) -> Self {
        self.max_slippage_bps = bps;
        self
    }

    pub fn social_note(mut self, note: Option<String>) -> Self {
        self.social_note = note;
        self
    }

    pub fn created_at(mut self, timestamp: u64) -> Self {
        self.created_at = timestamp;
        self
    }

    pub fn build(self) -> TradingResult<Order> {
        if self.input_amount.is_zero() {
            return Err(TradingError::ZeroAmount);
        }
        if self.max_slippage_bps > BPS_DENOMINATOR {
            return Err(TradingError::InvalidParameters(format!(
                "max slippage {} bps exceeds 100%",
                self.max_slippage_bps
            )));
        }
        if let Some(note) = &self.social_note {
            if note.chars().count() > MAX_SOCIAL_NOTE_LEN {
                return Err(TradingError::InvalidParameters(format!(
                    "social note exceeds {} characters",
                    MAX_SOCIAL_NOTE_LEN
                )));
            }
        }

        let min_output_amount = self
            .quoted_output_amount
            .mul_div_floor(
                Amount::from((BPS_DENOMINATOR - self.max_slippage_bps) as u64),
                Amount::from(BPS_DENOMINATOR as u64),
            )
            .ok_or(TradingError::Overflow)?;

        Ok(Order {
            order_id: self.order_id,
            user_id: self.user_id,
            token_id: self.reserve_snapshot.token_id(),
            side: self.side,
            input_amount: self.input_amount,
            quoted_output_amount: self.quoted_output_amount,
            min_output_amount,
            max_slippage_bps: self.max_slippage_bps,
            price_impact_bps: self.price_impact_bps,
            reserve_snapshot: self.reserve_snapshot,
            status: OrderStatus::Pending,
            created_at: self.created_at,
            settled_at: None,
            actual_output_amount: None,
            block_number: None,
            fee: None,
            reward_points: 0,
            audit: None,
            social_note: self.social_note,
        })
    }
}

// ============================================================================
// PLACEMENT
// ============================================================================

/// Incoming trade request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: UserId,
    pub token_id: TokenId,
    pub side: TradeSide,
    /// ETH for buys, tokens for sells
    pub amount: Amount,
    pub max_slippage_bps: Bps,
    #[serde(default)]
    pub social_note: Option<String>,
}

/// Quote as presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQuote {
    pub side: TradeSide,
    pub input_amount: Amount,
    pub output_amount: Amount,
    pub min_output_amount: Amount,
    /// Capped for display
    pub price_impact_bps: Bps,
    pub spot_price: Amount,
    pub execution_price: Amount,
    /// Protocol fee charged on the ETH leg at settlement
    pub estimated_fee: Amount,
}

/// Transaction parameters for the settlement layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementParams {
    pub chain: ChainId,
    /// Resolved trading contract address
    pub target: String,
    pub method: String,
    pub token_address: String,
    pub input_amount: Amount,
    pub min_output_amount: Amount,
    pub gas_estimate: u64,
}

/// Result of a successful placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub token_id: TokenId,
    pub quote: OrderQuote,
    pub settlement: SettlementParams,
}

// ============================================================================
// CONFIRMATIONS
// ============================================================================

/// Chain watcher's report on an order's settlement transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationEvent {
    pub order_id: OrderId,
    pub actual_output_amount: Amount,
    pub block_number: BlockNumber,
    pub success: bool,
}

/// Messages from the chain watcher to the reconciliation loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatcherMessage {
    Confirmation(ConfirmationEvent),
    /// Every confirmation at or below `block` on `chain` has been delivered
    Watermark { chain: ChainId, block: BlockNumber },
}

/// What a confirmation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Confirmed {
        order_id: OrderId,
        graduated: bool,
        audit: Option<QuoteDeviation>,
    },
    Failed {
        order_id: OrderId,
    },
    /// Order was already terminal, nothing changed
    AlreadySettled {
        order_id: OrderId,
        status: OrderStatus,
    },
    /// Held until the chain watermark passes its block
    Buffered {
        order_id: OrderId,
    },
}

impl ReconcileOutcome {
    pub fn order_id(&self) -> OrderId {
        match self {
            ReconcileOutcome::Confirmed { order_id, .. }
            | ReconcileOutcome::Failed { order_id }
            | ReconcileOutcome::AlreadySettled { order_id, .. }
            | ReconcileOutcome::Buffered { order_id } => *order_id,
        }
    }
}
