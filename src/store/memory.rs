//! In-memory [`EventStore`] adapter.
//!
//! A `Mutex<HashMap<..>>`-backed stand-in used by sync-service unit tests,
//! so those tests exercise real interval-merge/backfill logic without a
//! database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::interval_merge;
use super::ports::{CachedRangeWrite, EventStore, LogQuery};
use crate::error::Result;
use crate::types::entities::{CachedInterval, ContractCall, FullBlock, Log, Transaction};
use crate::types::primitives::{Address, B256, BlockNumber};

/// In-memory Event Store, primarily for tests (`test-utils` feature) but
/// also usable as a lightweight standalone deployment mode.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    blocks: Mutex<HashMap<B256, FullBlock>>,
    transactions: Mutex<HashMap<B256, Transaction>>,
    logs: Mutex<HashMap<String, Log>>,
    intervals: Mutex<HashMap<Address, Vec<CachedInterval>>>,
    contract_calls: Mutex<HashMap<String, ContractCall>>,
}

impl InMemoryEventStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_blocks(&self) -> std::sync::MutexGuard<'_, HashMap<B256, FullBlock>> {
        self.blocks.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_transactions(&self) -> std::sync::MutexGuard<'_, HashMap<B256, Transaction>> {
        self.transactions.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_logs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Log>> {
        self.logs.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_intervals(&self) -> std::sync::MutexGuard<'_, HashMap<Address, Vec<CachedInterval>>> {
        self.intervals.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_contract_calls(&self) -> std::sync::MutexGuard<'_, HashMap<String, ContractCall>> {
        self.contract_calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert_realtime_block(
        &self,
        _chain_id: u64,
        block: &FullBlock,
        transactions: &[Transaction],
        logs: &[Log],
    ) -> Result<()> {
        self.lock_blocks().entry(block.light.hash).or_insert_with(|| block.clone());
        {
            let mut txs = self.lock_transactions();
            for tx in transactions {
                txs.entry(tx.hash).or_insert_with(|| tx.clone());
            }
        }
        {
            let mut stored_logs = self.lock_logs();
            for log in logs {
                stored_logs.entry(log.log_id.clone()).or_insert_with(|| log.clone());
            }
            // Backfill blockTimestamp on any pre-existing rows for this block.
            for existing in stored_logs.values_mut() {
                if existing.block_hash == block.light.hash {
                    existing.block_timestamp = Some(block.light.timestamp);
                }
            }
        }
        Ok(())
    }

    async fn insert_log_filter_cached_ranges(&self, write: CachedRangeWrite) -> Result<()> {
        let mut intervals = self.lock_intervals();
        for key in write.log_filter_keys {
            let existing = intervals.remove(&key).unwrap_or_default();
            let new_interval = CachedInterval {
                contract_address: key,
                start_block: write.start_block,
                end_block: write.end_block,
                end_block_timestamp: write.end_block_timestamp,
            };
            let merged = interval_merge::merge(existing, new_interval)?;
            intervals.insert(key, merged);
        }
        Ok(())
    }

    async fn delete_realtime_data(
        &self,
        _chain_id: u64,
        from_block_number: BlockNumber,
    ) -> Result<()> {
        self.lock_blocks()
            .retain(|_, b| b.light.number < from_block_number);
        self.lock_transactions()
            .retain(|_, t| t.block_number < from_block_number);
        self.lock_logs()
            .retain(|_, l| l.block_number < from_block_number);
        Ok(())
    }

    async fn get_cached_intervals(&self, contract_address: Address) -> Result<Vec<CachedInterval>> {
        Ok(self
            .lock_intervals()
            .get(&contract_address)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_block(&self, hash: B256) -> Result<Option<FullBlock>> {
        Ok(self.lock_blocks().get(&hash).cloned())
    }

    async fn get_transaction(&self, hash: B256) -> Result<Option<Transaction>> {
        Ok(self.lock_transactions().get(&hash).cloned())
    }

    async fn get_logs(&self, query: LogQuery) -> Result<Vec<Log>> {
        let logs = self.lock_logs();
        let mut matched: Vec<Log> = logs
            .values()
            .filter(|l| l.address == query.contract_address)
            .filter(|l| {
                l.block_timestamp.is_some_and(|ts| {
                    ts > query.from_block_timestamp_exclusive
                        && ts <= query.to_block_timestamp_inclusive
                })
            })
            .filter(|l| {
                query
                    .event_sig_hashes
                    .as_ref()
                    .is_none_or(|sigs| l.topic0().is_some_and(|t0| sigs.contains(&t0)))
            })
            .cloned()
            .collect();
        matched.sort_by_key(|l| l.log_sort_key);
        Ok(matched)
    }

    async fn upsert_contract_call(&self, call: ContractCall) -> Result<()> {
        self.lock_contract_calls().insert(call.key.clone(), call);
        Ok(())
    }

    async fn get_contract_call(&self, key: &str) -> Result<Option<ContractCall>> {
        Ok(self.lock_contract_calls().get(key).cloned())
    }
}
