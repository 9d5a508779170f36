//! The Event Store port (§4.1).

use async_trait::async_trait;

use crate::error::Result;
use crate::types::entities::{CachedInterval, ContractCall, FullBlock, Log, Transaction};
use crate::types::primitives::{Address, B256, BlockNumber};

/// Arguments for [`EventStore::insert_log_filter_cached_ranges`] (§4.1).
#[derive(Debug, Clone)]
pub struct CachedRangeWrite {
    /// Log filter keys this range applies to. Each key gets the interval
    /// merge applied independently (one contract address namespace each).
    pub log_filter_keys: Vec<Address>,
    /// First block in the newly-indexed range (inclusive).
    pub start_block: BlockNumber,
    /// Last block in the newly-indexed range (inclusive).
    pub end_block: BlockNumber,
    /// Timestamp of `end_block`.
    pub end_block_timestamp: u64,
}

/// A bounded range query over logs, by block timestamp (§4.1
/// `getLogs`).
#[derive(Debug, Clone)]
pub struct LogQuery {
    /// Restrict to logs emitted by this contract.
    pub contract_address: Address,
    /// Exclusive lower bound on `blockTimestamp`.
    pub from_block_timestamp_exclusive: u64,
    /// Inclusive upper bound on `blockTimestamp`.
    pub to_block_timestamp_inclusive: u64,
    /// Restrict to logs whose `topic0` is one of these signature hashes, if
    /// provided.
    pub event_sig_hashes: Option<Vec<B256>>,
}

/// Durable storage for blocks, transactions, logs, per-filter cached
/// intervals, and contract-call memo entries (§4.1).
///
/// All multi-row operations are transactional with respect to concurrent
/// readers/writers on the same store (§4.1 "Failure semantics").
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert one full block row (ignored on primary-key conflict), upsert
    /// its referenced transactions (ignored on conflict), insert `logs`
    /// (ignored on conflict by `logId`), and backfill `blockTimestamp` on
    /// any pre-existing log rows with the matching `blockHash`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InfraError::Database`] on any storage
    /// failure; the caller observes either the full write or none of it.
    async fn insert_realtime_block(
        &self,
        chain_id: u64,
        block: &FullBlock,
        transactions: &[Transaction],
        logs: &[Log],
    ) -> Result<()>;

    /// Apply the §3 interval-merge write for each key in `write.log_filter_keys`,
    /// in a single transaction. Idempotent when the same range is reapplied.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DomainError::IntervalMergeTimestampMissing`]
    /// if a merged endpoint's timestamp cannot be sourced from either
    /// contributing interval (§4.1: "the implementation MUST fail hard").
    async fn insert_log_filter_cached_ranges(&self, write: CachedRangeWrite) -> Result<()>;

    /// Delete all logs, transactions, and blocks with `blockNumber >=
    /// from_block_number`. Does not touch `CachedInterval` rows.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InfraError::Database`] on storage failure.
    async fn delete_realtime_data(&self, chain_id: u64, from_block_number: BlockNumber)
    -> Result<()>;

    /// All cached intervals for one contract address.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InfraError::Database`] on storage failure.
    async fn get_cached_intervals(&self, contract_address: Address) -> Result<Vec<CachedInterval>>;

    /// Look up a block by hash.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InfraError::Database`] on storage failure.
    async fn get_block(&self, hash: B256) -> Result<Option<FullBlock>>;

    /// Look up a transaction by hash.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InfraError::Database`] on storage failure.
    async fn get_transaction(&self, hash: B256) -> Result<Option<Transaction>>;

    /// Logs matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InfraError::Database`] on storage failure.
    async fn get_logs(&self, query: LogQuery) -> Result<Vec<Log>>;

    /// Insert or overwrite a contract-call memo entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InfraError::Database`] on storage failure.
    async fn upsert_contract_call(&self, call: ContractCall) -> Result<()>;

    /// Look up a contract-call memo entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InfraError::Database`] on storage failure.
    async fn get_contract_call(&self, key: &str) -> Result<Option<ContractCall>>;
}
