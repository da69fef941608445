//! Trading Events
//!
//! Every committed state change publishes one or more events. Delivery is
//! fire-and-forget: a dropped receiver never fails the operation that
//! produced the event.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use lib_types::{Amount, BlockNumber, Bps, OrderId, TokenId, UserId};

use super::types::{ReserveState, TradeSide};
use crate::orders::QuoteDeviation;

/// Launchpad trading events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TradingEvent {
    /// New token added to the registry
    TokenListed {
        token_id: TokenId,
        name: String,
        symbol: String,
        creator: UserId,
        timestamp: u64,
    },

    /// Order accepted and handed to the settlement layer
    OrderPlaced {
        order_id: OrderId,
        token_id: TokenId,
        user_id: UserId,
        side: TradeSide,
        input_amount: Amount,
        quoted_output_amount: Amount,
        price_impact_bps: Bps,
        timestamp: u64,
    },

    /// Settlement confirmed on chain and applied
    TradeConfirmed {
        order_id: OrderId,
        token_id: TokenId,
        user_id: UserId,
        side: TradeSide,
        input_amount: Amount,
        output_amount: Amount,
        /// Spot price after the trade
        price: Amount,
        fee: Amount,
        reward_points: u64,
        block_number: BlockNumber,
        timestamp: u64,
    },

    /// Settlement reverted on chain
    TradeFailed {
        order_id: OrderId,
        token_id: TokenId,
        block_number: BlockNumber,
        timestamp: u64,
    },

    /// Reserves moved by a confirmed trade
    ReservesUpdated {
        token_id: TokenId,
        reserves: ReserveState,
        market_cap: Amount,
        block_number: BlockNumber,
        timestamp: u64,
    },

    /// Curve frozen after crossing the market-cap threshold
    Graduated {
        token_id: TokenId,
        final_market_cap: Amount,
        real_eth_reserves: Amount,
        real_token_reserves: Amount,
        block_number: BlockNumber,
        timestamp: u64,
    },

    /// Settled output drifted from the quote beyond tolerance
    AuditFlagged {
        order_id: OrderId,
        token_id: TokenId,
        deviation: QuoteDeviation,
        block_number: BlockNumber,
    },
}

impl TradingEvent {
    pub fn token_id(&self) -> &TokenId {
        match self {
            TradingEvent::TokenListed { token_id, .. } => token_id,
            TradingEvent::OrderPlaced { token_id, .. } => token_id,
            TradingEvent::TradeConfirmed { token_id, .. } => token_id,
            TradingEvent::TradeFailed { token_id, .. } => token_id,
            TradingEvent::ReservesUpdated { token_id, .. } => token_id,
            TradingEvent::Graduated { token_id, .. } => token_id,
            TradingEvent::AuditFlagged { token_id, .. } => token_id,
        }
    }

    /// Block the event was derived from, if any
    pub fn block_number(&self) -> Option<BlockNumber> {
        match self {
            TradingEvent::TokenListed { .. } | TradingEvent::OrderPlaced { .. } => None,
            TradingEvent::TradeConfirmed { block_number, .. }
            | TradingEvent::TradeFailed { block_number, .. }
            | TradingEvent::ReservesUpdated { block_number, .. }
            | TradingEvent::Graduated { block_number, .. }
            | TradingEvent::AuditFlagged { block_number, .. } => Some(*block_number),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            TradingEvent::TokenListed { .. } => "token_listed",
            TradingEvent::OrderPlaced { .. } => "order_placed",
            TradingEvent::TradeConfirmed { .. } => "trade_confirmed",
            TradingEvent::TradeFailed { .. } => "trade_failed",
            TradingEvent::ReservesUpdated { .. } => "reserves_updated",
            TradingEvent::Graduated { .. } => "graduated",
            TradingEvent::AuditFlagged { .. } => "audit_flagged",
        }
    }
}

/// Outbound event channel shared by every component
#[derive(Debug, Clone, Default)]
pub struct EventPublisher {
    sender: Option<UnboundedSender<TradingEvent>>,
}

impl EventPublisher {
    /// Publisher plus the receiving end for a broadcaster
    pub fn channel() -> (Self, UnboundedReceiver<TradingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    /// Publisher that discards everything
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn publish(&self, event: TradingEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        let event_type = event.event_type();
        if sender.send(event).is_err() {
            tracing::debug!("Event receiver dropped, discarding {} event", event_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::ChainId;

    fn token() -> TokenId {
        TokenId::new(ChainId::MegaEth, [5; 20])
    }

    #[test]
    fn test_event_accessors() {
        let event = TradingEvent::TradeFailed {
            order_id: OrderId::new(),
            token_id: token(),
            block_number: 77,
            timestamp: 1_700_000_000,
        };
        assert_eq!(event.token_id(), &token());
        assert_eq!(event.block_number(), Some(77));
        assert_eq!(event.event_type(), "trade_failed");

        let listed = TradingEvent::TokenListed {
            token_id: token(),
            name: "Rocket".to_string(),
            symbol: "RKT".to_string(),
            creator: UserId::from("alice"),
            timestamp: 1,
        };
        assert_eq!(listed.block_number(), None);
    }

    #[test]
    fn test_events_serialize_tagged() {
        let event = TradingEvent::TradeFailed {
            order_id: OrderId::new(),
            token_id: token(),
            block_number: 1,
            timestamp: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "trade_failed");
    }

    #[tokio::test]
    async fn test_publisher_delivers() {
        let (publisher, mut rx) = EventPublisher::channel();
        publisher.publish(TradingEvent::TradeFailed {
            order_id: OrderId::new(),
            token_id: token(),
            block_number: 3,
            timestamp: 4,
        });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.block_number(), Some(3));
    }

    #[test]
    fn test_publisher_survives_dropped_receiver() {
        let (publisher, rx) = EventPublisher::channel();
        drop(rx);
        publisher.publish(TradingEvent::TradeFailed {
            order_id: OrderId::new(),
            token_id: token(),
            block_number: 3,
            timestamp: 4,
        });
        EventPublisher::disabled().publish(TradingEvent::TradeFailed {
            order_id: OrderId::new(),
            token_id: token(),
            block_number: 3,
            timestamp: 4,
        });
    }
}
