//! Fork-point walking (§4.4.3).
//!
//! Unlike a fixed-depth assumption (e.g. always walking back exactly two
//! blocks), the walk here is real: each cursor's parent
//! is fetched from the chain client until it lands on a hash already in the
//! local chain, or the walk runs past `finalizedBlockNumber` (a deep reorg).

use crate::error::{DomainError, Result};
use crate::rpc::ChainClient;
use crate::types::entities::{FullBlock, LightBlock};
use crate::types::primitives::BlockNumber;

use super::local_chain::LocalChainState;

/// Result of walking back from a reorg-triggering block to find where the
/// canonical chain diverges from the local chain.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// A common ancestor was found within the local chain's retained range.
    Shallow {
        /// The last block present in both chains.
        common_ancestor: LightBlock,
        /// Canonical replacement blocks, ascending, starting just after
        /// `common_ancestor` and ending with the block that triggered
        /// reconciliation.
        canonical_chain: Vec<FullBlock>,
    },
    /// The walk passed `finalizedBlockNumber` without finding a common
    /// ancestor; resolution is delegated to a higher layer (§4.4.3).
    Deep {
        /// The block number at which the reorg was first observed.
        detected_at_block_number: BlockNumber,
        /// Number of blocks walked back without finding a common ancestor.
        minimum_depth: u64,
    },
}

/// Walk backward from `trigger` via [`ChainClient::get_block_by_hash`] until
/// a common ancestor with `local` is found or `finalizedBlockNumber` is
/// passed.
///
/// # Errors
///
/// Returns an error if fetching a parent block fails, or if a referenced
/// parent hash is not found on-chain (an inconsistent RPC response).
pub async fn reconcile(
    chain_client: &dyn ChainClient,
    local: &LocalChainState,
    trigger: FullBlock,
) -> Result<ReconcileOutcome> {
    let detected_at_block_number = trigger.light.number;
    let finalized = local.finalized_block_number();

    let mut cursor = trigger.light.clone();
    let mut canonical_chain = vec![trigger];
    let mut depth = 0u64;

    loop {
        if cursor.number <= finalized {
            break;
        }

        if let Some(ancestor) = local.find_by_hash(cursor.parent_hash) {
            return Ok(ReconcileOutcome::Shallow {
                common_ancestor: ancestor.clone(),
                canonical_chain,
            });
        }

        let parent = chain_client
            .get_block_by_hash(cursor.parent_hash, true)
            .await?
            .ok_or_else(|| {
                DomainError::LocalChainInvariantViolated(format!(
                    "parent {} of block {} not found on-chain",
                    cursor.parent_hash,
                    cursor.number.get(),
                ))
            })?;

        cursor = parent.light.clone();
        canonical_chain.insert(0, parent);
        depth += 1;
    }

    Ok(ReconcileOutcome::Deep {
        detected_at_block_number,
        minimum_depth: depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mocks::MockChainClient;
    use crate::types::entities::LightBlock;
    use crate::types::primitives::{Address, B256, Bloom, U256};

    fn light(number: u64, hash: B256, parent_hash: B256) -> LightBlock {
        LightBlock {
            hash,
            number: BlockNumber::new(number),
            parent_hash,
            timestamp: number * 12,
            logs_bloom: Bloom::ZERO,
        }
    }

    fn full(light: LightBlock) -> FullBlock {
        FullBlock {
            light,
            gas_limit: U256::ZERO,
            gas_used: U256::ZERO,
            base_fee_per_gas: None,
            miner: Address::ZERO,
            extra_data: Vec::new(),
            size: None,
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            receipts_root: B256::ZERO,
            total_difficulty: None,
            transactions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn shallow_reorg_finds_ancestor_one_block_back() {
        let h98 = B256::repeat_byte(98);
        let h99 = B256::repeat_byte(99);
        let h100_old = B256::repeat_byte(100);

        let mut local = LocalChainState::seed(light(98, h98, B256::ZERO));
        local.extend(light(99, h99, h98)).unwrap();
        local.extend(light(100, h100_old, h99)).unwrap();

        let client = MockChainClient::new();
        let h101_new = B256::repeat_byte(201);
        let h100_new = B256::repeat_byte(200);
        let block_100_new = full(light(100, h100_new, h99));
        client.push_block(block_100_new.clone(), Vec::new());

        let trigger = full(light(101, h101_new, h100_new));

        let outcome = reconcile(&client, &local, trigger).await.unwrap();
        match outcome {
            ReconcileOutcome::Shallow {
                common_ancestor,
                canonical_chain,
            } => {
                assert_eq!(common_ancestor.hash, h99);
                assert_eq!(canonical_chain.len(), 2);
                assert_eq!(canonical_chain[0].light.hash, h100_new);
                assert_eq!(canonical_chain[1].light.hash, h101_new);
            }
            ReconcileOutcome::Deep { .. } => panic!("expected shallow reorg"),
        }
    }

    #[tokio::test]
    async fn deep_reorg_reports_minimum_depth_when_ancestor_not_found() {
        // Local chain retains only the finalized block at 98, under h98.
        let h98 = B256::repeat_byte(98);
        let local = LocalChainState::seed(light(98, h98, B256::ZERO));

        // The competing fork has a different hash at every height down to
        // (and including) the finalized boundary, so the walk never finds
        // a common ancestor and must stop once it reaches block 98.
        let h98_fork = B256::repeat_byte(198);
        let h99_fork = B256::repeat_byte(199);
        let h100_fork = B256::repeat_byte(200);

        let client = MockChainClient::new();
        client.push_block(full(light(98, h98_fork, B256::repeat_byte(97))), Vec::new());
        client.push_block(full(light(99, h99_fork, h98_fork)), Vec::new());

        let trigger = full(light(100, h100_fork, h99_fork));

        let outcome = reconcile(&client, &local, trigger).await.unwrap();
        match outcome {
            ReconcileOutcome::Deep {
                detected_at_block_number,
                minimum_depth,
            } => {
                assert_eq!(detected_at_block_number, BlockNumber::new(100));
                assert_eq!(minimum_depth, 2);
            }
            ReconcileOutcome::Shallow { .. } => panic!("expected deep reorg"),
        }
    }
}
