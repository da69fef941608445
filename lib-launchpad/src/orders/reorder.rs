//! Confirmation Reorder Buffer
//!
//! Chain watchers may deliver confirmations out of block order. The buffer
//! holds them per token, keyed by `(block, arrival)`, and releases them in
//! that order once the chain's watermark has passed their block.

use std::collections::{BTreeMap, HashMap, HashSet};

use lib_types::{BlockNumber, ChainId, OrderId, TokenId};

use super::types::ConfirmationEvent;

#[derive(Debug, Default)]
pub struct ReorderBuffer {
    pending: HashMap<TokenId, BTreeMap<(BlockNumber, u64), ConfirmationEvent>>,
    buffered_ids: HashSet<OrderId>,
    arrivals: u64,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a confirmation. Returns `false` if the order is already buffered.
    pub fn push(&mut self, token_id: TokenId, event: ConfirmationEvent) -> bool {
        if !self.buffered_ids.insert(event.order_id) {
            return false;
        }
        self.arrivals += 1;
        self.pending
            .entry(token_id)
            .or_default()
            .insert((event.block_number, self.arrivals), event);
        true
    }

    /// Confirmations on `chain` at or below `watermark`, ordered per token
    pub fn drain_ready(
        &mut self,
        chain: ChainId,
        watermark: BlockNumber,
    ) -> Vec<(TokenId, Vec<ConfirmationEvent>)> {
        let mut ready = Vec::new();
        for (token_id, queue) in self.pending.iter_mut() {
            if token_id.chain != chain {
                continue;
            }
            let later = queue.split_off(&(watermark.saturating_add(1), 0));
            let released = std::mem::replace(queue, later);
            if !released.is_empty() {
                ready.push((*token_id, released.into_values().collect::<Vec<_>>()));
            }
        }
        self.finish_drain(ready)
    }

    /// Everything buffered, ordered per token
    pub fn drain_all(&mut self) -> Vec<(TokenId, Vec<ConfirmationEvent>)> {
        let ready = self
            .pending
            .drain()
            .map(|(token_id, queue)| (token_id, queue.into_values().collect()))
            .collect();
        self.finish_drain(ready)
    }

    /// Everything buffered for one token, ordered
    pub fn drain_token(&mut self, token_id: &TokenId) -> Vec<ConfirmationEvent> {
        let released: Vec<ConfirmationEvent> = self
            .pending
            .remove(token_id)
            .map(|queue| queue.into_values().collect())
            .unwrap_or_default();
        for event in &released {
            self.buffered_ids.remove(&event.order_id);
        }
        released
    }

    pub fn buffered_for(&self, token_id: &TokenId) -> usize {
        self.pending.get(token_id).map_or(0, |q| q.len())
    }

    pub fn len(&self) -> usize {
        self.buffered_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered_ids.is_empty()
    }

    fn finish_drain(
        &mut self,
        mut ready: Vec<(TokenId, Vec<ConfirmationEvent>)>,
    ) -> Vec<(TokenId, Vec<ConfirmationEvent>)> {
        for (_, events) in &ready {
            for event in events {
                self.buffered_ids.remove(&event.order_id);
            }
        }
        self.pending.retain(|_, queue| !queue.is_empty());
        ready.sort_by_key(|(token_id, _)| *token_id);
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::Amount;

    fn confirmation(block: BlockNumber) -> ConfirmationEvent {
        ConfirmationEvent {
            order_id: OrderId::new(),
            actual_output_amount: Amount::from_whole(1),
            block_number: block,
            success: true,
        }
    }

    fn token(chain: ChainId, n: u8) -> TokenId {
        TokenId::new(chain, [n; 20])
    }

    #[test]
    fn test_releases_in_block_order() {
        let mut buffer = ReorderBuffer::new();
        let t = token(ChainId::RiseChain, 1);
        let late = confirmation(12);
        let early = confirmation(10);
        let same_block_second = confirmation(10);

        buffer.push(t, late.clone());
        buffer.push(t, early.clone());
        buffer.push(t, same_block_second.clone());

        let ready = buffer.drain_ready(ChainId::RiseChain, 12);
        assert_eq!(ready.len(), 1);
        let blocks: Vec<_> = ready[0].1.iter().map(|e| e.order_id).collect();
        assert_eq!(blocks, vec![early.order_id, same_block_second.order_id, late.order_id]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_holds_events_above_watermark() {
        let mut buffer = ReorderBuffer::new();
        let t = token(ChainId::RiseChain, 1);
        buffer.push(t, confirmation(5));
        buffer.push(t, confirmation(9));

        let ready = buffer.drain_ready(ChainId::RiseChain, 7);
        assert_eq!(ready[0].1.len(), 1);
        assert_eq!(buffer.buffered_for(&t), 1);
    }

    #[test]
    fn test_watermark_is_per_chain() {
        let mut buffer = ReorderBuffer::new();
        buffer.push(token(ChainId::RiseChain, 1), confirmation(5));
        buffer.push(token(ChainId::MegaEth, 1), confirmation(5));

        let ready = buffer.drain_ready(ChainId::MegaEth, 100);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].0.chain, ChainId::MegaEth);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_duplicate_order_ignored() {
        let mut buffer = ReorderBuffer::new();
        let t = token(ChainId::RiseChain, 1);
        let event = confirmation(5);
        assert!(buffer.push(t, event.clone()));
        assert!(!buffer.push(t, event));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_drain_token() {
        let mut buffer = ReorderBuffer::new();
        let t = token(ChainId::RiseChain, 1);
        buffer.push(t, confirmation(8));
        buffer.push(t, confirmation(3));
        let drained = buffer.drain_token(&t);
        assert_eq!(drained[0].block_number, 3);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_all_across_chains() {
        let mut buffer = ReorderBuffer::new();
        buffer.push(token(ChainId::RiseChain, 1), confirmation(50));
        buffer.push(token(ChainId::MegaEth, 2), confirmation(7));
        let drained = buffer.drain_all();
        assert_eq!(drained.len(), 2);
        assert!(buffer.is_empty());
    }
}
