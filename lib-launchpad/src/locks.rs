//! Per-token async locks
//!
//! Reserve updates for one token are serialized; different tokens proceed
//! in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use lib_types::TokenId;

#[derive(Debug, Default)]
pub struct TokenLocks {
    locks: DashMap<TokenId, Arc<Mutex<()>>>,
}

impl TokenLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a token's reserves
    pub async fn lock(&self, token_id: TokenId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the DashMap shard lock is not held across await
        let lock = self
            .locks
            .entry(token_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::ChainId;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_token_serialized() {
        let locks = Arc::new(TokenLocks::new());
        let token = TokenId::new(ChainId::RiseChain, [1; 20]);

        let guard = locks.lock(token).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(token).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_tokens_independent() {
        let locks = TokenLocks::new();
        let _a = locks.lock(TokenId::new(ChainId::RiseChain, [1; 20])).await;
        let _b = locks.lock(TokenId::new(ChainId::RiseChain, [2; 20])).await;
        assert_eq!(locks.len(), 2);
    }
}
