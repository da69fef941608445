//! Order Lifecycle
//!
//! - `coordinator`: Quote, validate and persist pending orders
//! - `reconciler`: Apply chain confirmations atomically
//! - `reorder`: Hold streamed confirmations until their block is final
//! - `types`: Orders, confirmations and outcomes

pub mod types;
pub mod coordinator;
pub mod reorder;
pub mod reconciler;

pub use types::{
    ConfirmationEvent, Order, OrderBuilder, OrderQuote, OrderStatus, PlaceOrderRequest,
    PlacedOrder, QuoteDeviation, ReconcileOutcome, SettlementParams, WatcherMessage,
    MAX_SOCIAL_NOTE_LEN,
};
pub use coordinator::OrderCoordinator;
pub use reorder::ReorderBuffer;
pub use reconciler::{ReconcileReport, SettlementReconciler};
