//! Sled-based `TradingStore`
//!
//! Records are bincode-encoded. A settlement commit runs as a single sled
//! transaction over the token, order and ledger trees.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};

use lib_types::{OrderId, TokenId, UserId};

use super::{check_commit, SettlementCommit, StorageError, StorageResult, TradingStore, UserLedger};
use crate::bonding_curve::TokenRecord;
use crate::orders::{Order, OrderStatus};

// =============================================================================
// TREE NAMES (FIXED - DO NOT CHANGE)
// =============================================================================

const TREE_TOKENS: &str = "tokens";
const TREE_ORDERS: &str = "orders";
const TREE_USER_LEDGERS: &str = "user_ledgers";

pub struct SledTradingStore {
    db: Db,
    tokens: Tree,
    orders: Tree,
    ledgers: Tree,
}

impl std::fmt::Debug for SledTradingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledTradingStore")
            .field("tokens", &self.tokens.len())
            .field("orders", &self.orders.len())
            .finish_non_exhaustive()
    }
}

impl SledTradingStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path).map_err(|e| StorageError::Database(e.to_string()))?;
        Self::from_db(db)
    }

    /// Open a temporary store (for testing)
    #[cfg(test)]
    pub fn open_temporary() -> StorageResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        let open = |name: &str| {
            db.open_tree(name)
                .map_err(|e| StorageError::Database(e.to_string()))
        };
        let tokens = open(TREE_TOKENS)?;
        let orders = open(TREE_ORDERS)?;
        let ledgers = open(TREE_USER_LEDGERS)?;
        Ok(Self {
            db,
            tokens,
            orders,
            ledgers,
        })
    }

    /// Flush dirty pages to disk
    pub fn flush(&self) -> StorageResult<()> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn get_decoded<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> StorageResult<Option<T>> {
        match tree.get(key).map_err(|e| StorageError::Database(e.to_string()))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn insert_new<T: Serialize>(tree: &Tree, key: &[u8], value: &T, what: String) -> StorageResult<()> {
        let bytes = bincode::serialize(value)?;
        tree.compare_and_swap(key, None as Option<&[u8]>, Some(bytes))
            .map_err(|e| StorageError::Database(e.to_string()))?
            .map_err(|_| StorageError::AlreadyExists(what))
    }

    fn decode_all<T: DeserializeOwned>(tree: &Tree) -> StorageResult<Vec<T>> {
        tree.iter()
            .values()
            .map(|value| -> StorageResult<T> {
                let bytes = value.map_err(|e| StorageError::Database(e.to_string()))?;
                Ok(bincode::deserialize(&bytes)?)
            })
            .collect()
    }
}

fn abort<T>(err: StorageError) -> Result<T, ConflictableTransactionError<StorageError>> {
    Err(ConflictableTransactionError::Abort(err))
}

fn decode_in_tx<T: DeserializeOwned>(
    bytes: Option<sled::IVec>,
) -> Result<Option<T>, ConflictableTransactionError<StorageError>> {
    match bytes {
        Some(bytes) => match bincode::deserialize(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => abort(e.into()),
        },
        None => Ok(None),
    }
}

impl TradingStore for SledTradingStore {
    fn get_token(&self, token_id: &TokenId) -> StorageResult<Option<TokenRecord>> {
        Self::get_decoded(&self.tokens, &token_id.storage_key())
    }

    fn insert_token(&self, record: &TokenRecord) -> StorageResult<()> {
        let token_id = record.token_id();
        Self::insert_new(
            &self.tokens,
            &token_id.storage_key(),
            record,
            format!("token {}", token_id),
        )
    }

    fn list_tokens(&self) -> StorageResult<Vec<TokenRecord>> {
        Self::decode_all(&self.tokens)
    }

    fn get_order(&self, order_id: &OrderId) -> StorageResult<Option<Order>> {
        Self::get_decoded(&self.orders, order_id.as_bytes())
    }

    fn insert_order(&self, order: &Order) -> StorageResult<()> {
        let order_id = order.order_id();
        Self::insert_new(
            &self.orders,
            order_id.as_bytes(),
            order,
            format!("order {}", order_id),
        )
    }

    fn pending_orders(&self, token_id: &TokenId) -> StorageResult<Vec<Order>> {
        let mut orders: Vec<Order> = Self::decode_all::<Order>(&self.orders)?
            .into_iter()
            .filter(|o| o.token_id() == *token_id && !o.is_terminal())
            .collect();
        orders.sort_by_key(|o| o.created_at());
        Ok(orders)
    }

    fn settled_orders_since(&self, since: u64) -> StorageResult<Vec<Order>> {
        let mut orders: Vec<Order> = Self::decode_all::<Order>(&self.orders)?
            .into_iter()
            .filter(|o| o.status() == OrderStatus::Confirmed)
            .filter(|o| o.settled_at().map_or(false, |at| at >= since))
            .collect();
        orders.sort_by_key(|o| (o.settled_at(), o.block_number()));
        Ok(orders)
    }

    fn commit_settlement(&self, commit: &SettlementCommit) -> StorageResult<()> {
        let order_key = *commit.order.order_id().as_bytes();
        let order_bytes = bincode::serialize(&commit.order)?;
        let token_write = match &commit.token_update {
            Some(update) => Some((
                update.record.token_id().storage_key(),
                bincode::serialize(&update.record)?,
            )),
            None => None,
        };

        let result = (&self.tokens, &self.orders, &self.ledgers).transaction(
            |(tokens, orders, ledgers)| {
                let stored_order: Option<Order> = decode_in_tx(orders.get(order_key)?)?;
                let stored_token: Option<TokenRecord> = match &token_write {
                    Some((key, _)) => decode_in_tx(tokens.get(key)?)?,
                    None => None,
                };
                if let Err(e) = check_commit(commit, stored_order.as_ref(), stored_token.as_ref()) {
                    return abort(e);
                }

                orders.insert(&order_key[..], order_bytes.clone())?;
                if let Some((key, bytes)) = &token_write {
                    tokens.insert(&key[..], bytes.clone())?;
                }
                if let Some(credit) = &commit.ledger_credit {
                    let key = credit.user_id.as_str().as_bytes();
                    let mut ledger: UserLedger = decode_in_tx(ledgers.get(key)?)?
                        .unwrap_or_else(|| UserLedger::new(credit.user_id.clone()));
                    ledger.apply(credit);
                    match bincode::serialize(&ledger) {
                        Ok(bytes) => {
                            ledgers.insert(key, bytes)?;
                        }
                        Err(e) => return abort(e.into()),
                    }
                }
                Ok(())
            },
        );

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(StorageError::Database(e.to_string())),
        }
    }

    fn get_user_ledger(&self, user_id: &UserId) -> StorageResult<Option<UserLedger>> {
        Self::get_decoded(&self.ledgers, user_id.as_str().as_bytes())
    }
}
