//! `alloy`-backed [`ChainClient`] adapter.
//!
//! Wraps an `alloy::providers::Provider` directly, narrowed to the three RPC
//! calls §6 names, and converts alloy's wire types into this crate's
//! entities at the boundary.

use alloy::eips::BlockNumberOrTag;
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log as RpcLog};
use async_trait::async_trait;

use super::{BlockTag, ChainClient};
use crate::error::{InfraError, Result};
use crate::types::entities::{FullBlock, Log, Transaction};
use crate::types::primitives::{B256, BlockNumber, U256};

/// Adapts any `alloy` [`Provider`] to the [`ChainClient`] port.
#[derive(Debug, Clone)]
pub struct AlloyChainClient<P> {
    provider: P,
}

impl<P: Provider + Clone + Send + Sync + 'static> AlloyChainClient<P> {
    /// Wrap a connected provider.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    fn rpc_transient(err: impl std::error::Error + Send + Sync + 'static) -> crate::error::AppError {
        InfraError::RpcTransient(Box::new(err)).into()
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> ChainClient for AlloyChainClient<P> {
    async fn get_block_by_number(
        &self,
        tag: BlockTag,
        with_txns: bool,
    ) -> Result<Option<FullBlock>> {
        let number_or_tag = match tag {
            BlockTag::Latest => BlockNumberOrTag::Latest,
            BlockTag::Number(n) => BlockNumberOrTag::Number(n.get()),
        };

        let block = if with_txns {
            self.provider
                .get_block_by_number(number_or_tag)
                .full()
                .await
                .map_err(Self::rpc_transient)?
        } else {
            self.provider
                .get_block_by_number(number_or_tag)
                .await
                .map_err(Self::rpc_transient)?
        };

        block.map(convert_block).transpose()
    }

    async fn get_block_by_hash(&self, hash: B256, with_txns: bool) -> Result<Option<FullBlock>> {
        let block = if with_txns {
            self.provider
                .get_block_by_hash(hash)
                .full()
                .await
                .map_err(Self::rpc_transient)?
        } else {
            self.provider
                .get_block_by_hash(hash)
                .await
                .map_err(Self::rpc_transient)?
        };

        block.map(convert_block).transpose()
    }

    async fn get_logs_by_block_hash(&self, block_hash: B256) -> Result<Vec<Log>> {
        let filter = Filter::new().at_block_hash(block_hash);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(Self::rpc_transient)?;
        logs.into_iter().map(convert_log).collect()
    }
}

fn convert_log(rpc_log: RpcLog) -> Result<Log> {
    let block_hash = rpc_log
        .block_hash
        .ok_or_else(|| InfraError::RpcTransient(Box::new(std::io::Error::other(
            "log missing blockHash",
        ))))?;
    let block_number = rpc_log
        .block_number
        .ok_or_else(|| InfraError::RpcTransient(Box::new(std::io::Error::other(
            "log missing blockNumber",
        ))))?;
    let log_index = rpc_log.log_index.unwrap_or_default();
    let transaction_hash = rpc_log.transaction_hash.unwrap_or_default();
    let transaction_index = rpc_log.transaction_index.unwrap_or_default();
    let block_number = BlockNumber::new(block_number);

    let topics = rpc_log.topics();
    let topic_at = |i: usize| topics.get(i).copied();

    Ok(Log {
        log_id: Log::canonical_id(block_hash, log_index),
        log_sort_key: Log::canonical_sort_key(block_number, log_index),
        address: rpc_log.address(),
        data: rpc_log.data().data.to_vec(),
        topics: [topic_at(0), topic_at(1), topic_at(2), topic_at(3)],
        block_hash,
        block_number,
        block_timestamp: rpc_log.block_timestamp,
        log_index,
        transaction_hash,
        transaction_index,
        removed: rpc_log.removed,
    }
    .into())
}

fn convert_block(rpc_block: alloy::rpc::types::Block) -> Result<FullBlock> {
    let header = &rpc_block.header;

    let light = crate::types::entities::LightBlock {
        hash: header.hash,
        number: BlockNumber::new(header.number),
        parent_hash: header.parent_hash,
        timestamp: header.timestamp,
        logs_bloom: header.logs_bloom,
    };

    let transactions = rpc_block
        .transactions
        .as_transactions()
        .unwrap_or_default()
        .iter()
        .map(|tx| convert_transaction(tx, light.hash, light.number))
        .collect();

    Ok(FullBlock {
        light,
        gas_limit: U256::from(header.gas_limit),
        gas_used: U256::from(header.gas_used),
        base_fee_per_gas: header.base_fee_per_gas.map(U256::from),
        miner: header.beneficiary,
        extra_data: header.extra_data.to_vec(),
        size: rpc_block.header.size.map(|s| s.to::<u64>()),
        state_root: header.state_root,
        transactions_root: header.transactions_root,
        receipts_root: header.receipts_root,
        total_difficulty: rpc_block.header.total_difficulty,
        transactions,
    })
}

fn convert_transaction(
    tx: &alloy::rpc::types::Transaction,
    block_hash: B256,
    block_number: BlockNumber,
) -> Transaction {
    let inner = tx.inner.inner();
    Transaction {
        hash: *tx.inner.tx_hash(),
        nonce: inner.nonce(),
        from: tx.inner.signer(),
        to: inner.to(),
        value: inner.value(),
        input: inner.input().to_vec(),
        gas: U256::from(inner.gas_limit()),
        gas_price: U256::from(inner.gas_price().unwrap_or_default()),
        max_fee_per_gas: inner.max_fee_per_gas().map(U256::from),
        max_priority_fee_per_gas: inner.max_priority_fee_per_gas().map(U256::from),
        block_hash,
        block_number,
        transaction_index: tx.transaction_index.unwrap_or_default(),
        chain_id: inner.chain_id().unwrap_or_default(),
    }
}

