//! In-memory `TradingStore`
//!
//! One lock over all maps, so a settlement commit is trivially atomic.

use std::collections::HashMap;

use parking_lot::RwLock;

use lib_types::{OrderId, TokenId, UserId};

use super::{check_commit, SettlementCommit, StorageError, StorageResult, TradingStore, UserLedger};
use crate::bonding_curve::TokenRecord;
use crate::orders::{Order, OrderStatus};

#[derive(Debug, Default)]
struct State {
    tokens: HashMap<TokenId, TokenRecord>,
    orders: HashMap<OrderId, Order>,
    ledgers: HashMap<UserId, UserLedger>,
}

#[derive(Debug, Default)]
pub struct InMemoryTradingStore {
    state: RwLock<State>,
}

impl InMemoryTradingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_count(&self) -> usize {
        self.state.read().orders.len()
    }
}

impl TradingStore for InMemoryTradingStore {
    fn get_token(&self, token_id: &TokenId) -> StorageResult<Option<TokenRecord>> {
        Ok(self.state.read().tokens.get(token_id).cloned())
    }

    fn insert_token(&self, record: &TokenRecord) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.tokens.contains_key(&record.token_id()) {
            return Err(StorageError::AlreadyExists(format!("token {}", record.token_id())));
        }
        state.tokens.insert(record.token_id(), record.clone());
        Ok(())
    }

    fn list_tokens(&self) -> StorageResult<Vec<TokenRecord>> {
        Ok(self.state.read().tokens.values().cloned().collect())
    }

    fn get_order(&self, order_id: &OrderId) -> StorageResult<Option<Order>> {
        Ok(self.state.read().orders.get(order_id).cloned())
    }

    fn insert_order(&self, order: &Order) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.orders.contains_key(&order.order_id()) {
            return Err(StorageError::AlreadyExists(format!("order {}", order.order_id())));
        }
        state.orders.insert(order.order_id(), order.clone());
        Ok(())
    }

    fn pending_orders(&self, token_id: &TokenId) -> StorageResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state
            .read()
            .orders
            .values()
            .filter(|o| o.token_id() == *token_id && !o.is_terminal())
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at());
        Ok(orders)
    }

    fn settled_orders_since(&self, since: u64) -> StorageResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state
            .read()
            .orders
            .values()
            .filter(|o| o.status() == OrderStatus::Confirmed)
            .filter(|o| o.settled_at().map_or(false, |at| at >= since))
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.settled_at(), o.block_number()));
        Ok(orders)
    }

    fn commit_settlement(&self, commit: &SettlementCommit) -> StorageResult<()> {
        let mut state = self.state.write();

        let token_id = commit.token_update.as_ref().map(|u| u.record.token_id());
        check_commit(
            commit,
            state.orders.get(&commit.order.order_id()),
            token_id.and_then(|id| state.tokens.get(&id)),
        )?;

        state.orders.insert(commit.order.order_id(), commit.order.clone());
        if let Some(update) = &commit.token_update {
            state.tokens.insert(update.record.token_id(), update.record.clone());
        }
        if let Some(credit) = &commit.ledger_credit {
            state
                .ledgers
                .entry(credit.user_id.clone())
                .or_insert_with(|| UserLedger::new(credit.user_id.clone()))
                .apply(credit);
        }
        Ok(())
    }

    fn get_user_ledger(&self, user_id: &UserId) -> StorageResult<Option<UserLedger>> {
        Ok(self.state.read().ledgers.get(user_id).cloned())
    }
}
