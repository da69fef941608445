//! Trading State Storage
//!
//! The engine talks to persistence only through `TradingStore`. A
//! settlement is committed as one atomic unit: the order's terminal state,
//! the token's new reserves and the user's ledger credit land together or
//! not at all.
//!
//! # Concurrency
//! Token updates carry the version they were derived from. The store
//! rejects the commit with `VersionConflict` if the stored version moved,
//! and rejects it with `OrderNotPending` if another writer already settled
//! the order.

pub mod memory;
pub mod sled_store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lib_types::{Amount, OrderId, TokenId, UserId};

use crate::bonding_curve::TokenRecord;
use crate::orders::Order;

pub use memory::InMemoryTradingStore;
pub use sled_store::SledTradingStore;

/// Storage layer result type
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Order {0} is no longer pending")]
    OrderNotPending(OrderId),

    #[error("Version conflict on {token_id}: expected {expected}, found {found}")]
    VersionConflict {
        token_id: TokenId,
        expected: u64,
        found: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// Per-user totals credited on confirmed trades
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLedger {
    pub user_id: UserId,
    pub reward_points: u64,
    pub fees_paid: Amount,
    /// ETH notional across confirmed trades
    pub volume: Amount,
    pub trades: u64,
}

impl UserLedger {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            reward_points: 0,
            fees_paid: Amount::zero(),
            volume: Amount::zero(),
            trades: 0,
        }
    }

    /// Add a credit. Amounts saturate rather than fail the settlement.
    pub fn apply(&mut self, credit: &LedgerCredit) {
        self.reward_points = self.reward_points.saturating_add(credit.reward_points);
        self.fees_paid = self.fees_paid.checked_add(credit.fee).unwrap_or(self.fees_paid);
        self.volume = self.volume.checked_add(credit.volume).unwrap_or(self.volume);
        self.trades += 1;
    }
}

/// Amounts owed to a user for one confirmed trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCredit {
    pub user_id: UserId,
    pub reward_points: u64,
    pub fee: Amount,
    pub volume: Amount,
}

/// Token record to write, guarded by the version it was derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUpdate {
    pub record: TokenRecord,
    pub expected_version: u64,
}

/// Everything one confirmation writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementCommit {
    /// Order in its terminal state
    pub order: Order,
    pub token_update: Option<TokenUpdate>,
    pub ledger_credit: Option<LedgerCredit>,
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Persistence for tokens, orders and user ledgers
///
/// Implementations must be safe to share across tasks.
pub trait TradingStore: Send + Sync {
    fn get_token(&self, token_id: &TokenId) -> StorageResult<Option<TokenRecord>>;

    /// Fails with `AlreadyExists` if the token is already stored
    fn insert_token(&self, record: &TokenRecord) -> StorageResult<()>;

    fn list_tokens(&self) -> StorageResult<Vec<TokenRecord>>;

    fn get_order(&self, order_id: &OrderId) -> StorageResult<Option<Order>>;

    /// Fails with `AlreadyExists` if the order is already stored
    fn insert_order(&self, order: &Order) -> StorageResult<()>;

    /// Pending orders for one token, oldest first
    fn pending_orders(&self, token_id: &TokenId) -> StorageResult<Vec<Order>>;

    /// Confirmed orders settled at or after `since`, oldest settlement
    /// first and by block within the same second
    fn settled_orders_since(&self, since: u64) -> StorageResult<Vec<Order>>;

    /// Apply a settlement atomically
    fn commit_settlement(&self, commit: &SettlementCommit) -> StorageResult<()>;

    fn get_user_ledger(&self, user_id: &UserId) -> StorageResult<Option<UserLedger>>;
}

/// Preconditions shared by every backend, checked against current state
pub(crate) fn check_commit(
    commit: &SettlementCommit,
    stored_order: Option<&Order>,
    stored_token: Option<&TokenRecord>,
) -> StorageResult<()> {
    let order_id = commit.order.order_id();
    let stored_order =
        stored_order.ok_or_else(|| StorageError::NotFound(format!("order {}", order_id)))?;
    if stored_order.is_terminal() {
        return Err(StorageError::OrderNotPending(order_id));
    }

    if let Some(update) = &commit.token_update {
        let token_id = update.record.token_id();
        let stored_token =
            stored_token.ok_or_else(|| StorageError::NotFound(format!("token {}", token_id)))?;
        if stored_token.version() != update.expected_version {
            return Err(StorageError::VersionConflict {
                token_id,
                expected: update.expected_version,
                found: stored_token.version(),
            });
        }
    }
    Ok(())
}
