//! In-memory local chain state (§3): the unfinalized suffix of light blocks,
//! with its invariants enforced at every mutation point rather than trusted
//! to callers.

use std::collections::VecDeque;

use crate::error::{DomainError, Result};
use crate::types::entities::LightBlock;
use crate::types::primitives::{B256, BlockNumber};

/// The unfinalized suffix of the chain the sync service has observed.
///
/// Invariants (checked on every mutator, per §3):
/// - strictly increasing `number`
/// - each consecutive pair is linked by `parentHash`
/// - the first element's number equals `finalized_block_number`
#[derive(Debug, Clone)]
pub struct LocalChainState {
    blocks: VecDeque<LightBlock>,
    finalized_block_number: BlockNumber,
}

impl LocalChainState {
    /// Seed the local chain with its first (finalized) block.
    #[must_use]
    pub fn seed(finalized: LightBlock) -> Self {
        let finalized_block_number = finalized.number;
        let mut blocks = VecDeque::new();
        blocks.push_back(finalized);
        Self {
            blocks,
            finalized_block_number,
        }
    }

    /// The current head (most recent block), if any.
    #[must_use]
    pub fn head(&self) -> Option<&LightBlock> {
        self.blocks.back()
    }

    /// `finalizedBlockNumber`.
    #[must_use]
    pub const fn finalized_block_number(&self) -> BlockNumber {
        self.finalized_block_number
    }

    /// Whether `hash` is present anywhere in the local chain.
    #[must_use]
    pub fn contains_hash(&self, hash: B256) -> bool {
        self.blocks.iter().any(|b| b.hash == hash)
    }

    /// Find the block with the given hash, if present.
    #[must_use]
    pub fn find_by_hash(&self, hash: B256) -> Option<&LightBlock> {
        self.blocks.iter().find(|b| b.hash == hash)
    }

    /// Find the block with the given number, if present.
    #[must_use]
    pub fn find_by_number(&self, number: BlockNumber) -> Option<&LightBlock> {
        self.blocks.iter().find(|b| b.number == number)
    }

    /// All blocks in ascending order.
    #[must_use]
    pub fn blocks(&self) -> impl Iterator<Item = &LightBlock> {
        self.blocks.iter()
    }

    /// Append a new head to the chain (§4.4.1 extend). The caller is
    /// responsible for having already verified `block.number == head.number
    /// + 1` and `block.parent_hash == head.hash` (the classification state
    /// machine, §4.4, does this before calling extend) — this method still
    /// re-validates defensively since a violated invariant here indicates
    /// corruption, not a recoverable condition.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::LocalChainInvariantViolated`] if `block` does
    /// not correctly extend the current head.
    pub fn extend(&mut self, block: LightBlock) -> Result<()> {
        if let Some(head) = self.head() {
            if block.number != head.number.next() || block.parent_hash != head.hash {
                return Err(DomainError::LocalChainInvariantViolated(format!(
                    "block {} (parent {}) does not extend head {} (hash {})",
                    block.number.get(),
                    block.parent_hash,
                    head.number.get(),
                    head.hash,
                ))
                .into());
            }
        }
        self.blocks.push_back(block);
        Ok(())
    }

    /// Truncate the chain to blocks with `number <= boundary` (reorg
    /// reconciliation, §4.4.3 step 1: truncate to the common ancestor).
    pub fn truncate_to(&mut self, boundary: BlockNumber) {
        self.blocks.retain(|b| b.number <= boundary);
    }

    /// Prune the chain to blocks with `number >= boundary`, advancing
    /// `finalized_block_number` to `boundary` (finality advance, §4.4.1).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::LocalChainInvariantViolated`] if no block with
    /// `number == boundary` remains after pruning — the new finalized block
    /// must still be present as the chain's new first element.
    pub fn prune_before(&mut self, boundary: BlockNumber) -> Result<()> {
        self.blocks.retain(|b| b.number >= boundary);
        match self.blocks.front() {
            Some(first) if first.number == boundary => {
                self.finalized_block_number = boundary;
                Ok(())
            }
            _ => Err(DomainError::LocalChainInvariantViolated(format!(
                "no local block at finality boundary {}",
                boundary.get()
            ))
            .into()),
        }
    }
}
