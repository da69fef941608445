//! Token Registry
//!
//! Lists new tokens on a fresh curve and answers phase queries over the
//! store. Name and symbol are unique per chain.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use lib_fees::reward_points_for;
use lib_types::{Amount, ChainId, RewardAction, TokenId};

use super::events::{EventPublisher, TradingEvent};
use super::token::{TokenMetadata, TokenRecord};
use super::types::{Phase, ReserveState};
use crate::config::LaunchpadConfig;
use crate::errors::{TradingError, TradingResult};
use crate::storage::TradingStore;

/// Fee and reward owed by the creator of a new listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingReceipt {
    pub token_id: TokenId,
    pub creation_fee: Amount,
    pub reward_points: u64,
    pub created_at: u64,
}

/// Counts by phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_listed: u64,
    pub active: u64,
    pub graduated: u64,
}

/// Token Registry
pub struct TokenRegistry {
    store: Arc<dyn TradingStore>,
    config: Arc<LaunchpadConfig>,
    events: EventPublisher,
    /// Serializes the duplicate check with the insert
    listing_lock: Mutex<()>,
}

impl TokenRegistry {
    pub fn new(
        store: Arc<dyn TradingStore>,
        config: Arc<LaunchpadConfig>,
        events: EventPublisher,
    ) -> Self {
        Self {
            store,
            config,
            events,
            listing_lock: Mutex::new(()),
        }
    }

    /// List a deployed token on a fresh curve
    ///
    /// # Errors
    /// - `InvalidParameters` for metadata outside the length limits
    /// - `DuplicateToken` if the id, name or symbol is taken on the chain
    pub fn list_token(
        &self,
        token_id: TokenId,
        metadata: TokenMetadata,
        timestamp: u64,
    ) -> TradingResult<ListingReceipt> {
        metadata.validate()?;

        let curve = &self.config.curve;
        let reserves = ReserveState::builder(token_id)
            .virtual_reserves(
                curve.initial_virtual_token_reserves,
                curve.initial_virtual_eth_reserves,
            )
            .real_reserves(curve.initial_real_token_reserves, Amount::zero())
            .build()?;
        let record = TokenRecord::list(metadata, reserves, curve.total_supply, timestamp)?;

        {
            let _guard = self.listing_lock.lock();
            self.ensure_unique(&record)?;
            self.store.insert_token(&record)?;
        }

        let metadata = record.metadata();
        info!(
            "Listed {} ({}) as {} for {}",
            metadata.name, metadata.symbol, token_id, metadata.creator
        );
        self.events.publish(TradingEvent::TokenListed {
            token_id,
            name: metadata.name.clone(),
            symbol: metadata.symbol.clone(),
            creator: metadata.creator.clone(),
            timestamp,
        });

        let fees = &self.config.fees;
        Ok(ListingReceipt {
            token_id,
            creation_fee: fees.token_creation_fee,
            reward_points: reward_points_for(RewardAction::TokenCreation, fees),
            created_at: timestamp,
        })
    }

    pub fn get(&self, token_id: &TokenId) -> TradingResult<TokenRecord> {
        self.store
            .get_token(token_id)?
            .ok_or(TradingError::TokenNotFound(*token_id))
    }

    /// Tokens in a phase, newest first
    pub fn list_by_phase(
        &self,
        chain: Option<ChainId>,
        phase: Phase,
    ) -> TradingResult<Vec<TokenRecord>> {
        let mut tokens: Vec<TokenRecord> = self
            .store
            .list_tokens()?
            .into_iter()
            .filter(|t| chain.map_or(true, |c| t.token_id().chain == c))
            .filter(|t| t.reserves().phase() == phase)
            .collect();
        tokens.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(tokens)
    }

    /// Active tokens already past the graduation threshold
    ///
    /// Normally empty: the reconciler graduates on the crossing trade.
    pub fn ready_to_graduate(&self) -> TradingResult<Vec<TokenRecord>> {
        let Some(threshold) = self.config.graduation.threshold_market_cap() else {
            return Ok(Vec::new());
        };
        let mut ready = Vec::new();
        for token in self.list_by_phase(None, Phase::Active)? {
            if token.stats(threshold)?.can_graduate {
                ready.push(token);
            }
        }
        Ok(ready)
    }

    pub fn stats(&self, chain: Option<ChainId>) -> TradingResult<RegistryStats> {
        let mut stats = RegistryStats::default();
        for token in self.store.list_tokens()? {
            if chain.map_or(false, |c| token.token_id().chain != c) {
                continue;
            }
            stats.total_listed += 1;
            match token.reserves().phase() {
                Phase::Active => stats.active += 1,
                Phase::Graduated => stats.graduated += 1,
            }
        }
        Ok(stats)
    }

    fn ensure_unique(&self, record: &TokenRecord) -> TradingResult<()> {
        let chain = record.token_id().chain;
        let name = record.metadata().name.trim();
        let symbol = record.metadata().symbol.trim();

        for existing in self.store.list_tokens()? {
            if existing.token_id() == record.token_id() {
                return Err(TradingError::DuplicateToken {
                    chain,
                    field: "address".to_string(),
                    value: record.token_id().address_hex(),
                });
            }
            if existing.token_id().chain != chain {
                continue;
            }
            if existing.metadata().name.trim().eq_ignore_ascii_case(name) {
                return Err(TradingError::DuplicateToken {
                    chain,
                    field: "name".to_string(),
                    value: name.to_string(),
                });
            }
            if existing.metadata().symbol.trim().eq_ignore_ascii_case(symbol) {
                return Err(TradingError::DuplicateToken {
                    chain,
                    field: "symbol".to_string(),
                    value: symbol.to_string(),
                });
            }
        }
        Ok(())
    }
}
