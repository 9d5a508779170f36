//! PostgreSQL implementation of the [`EventStore`] port using SQLx.
//!
//! Uses a `pool.begin()` / `tx.commit()` transaction per write, an
//! `ON CONFLICT DO NOTHING` upsert idiom for benign primary-key conflicts,
//! and a row-struct-plus-`TryFrom`-conversion split between wire format and
//! domain type. `delete_realtime_data` cascades into logs/transactions/
//! blocks directly rather than leaving that as a documented gap.
//!
//! # Type conversions
//!
//! Large integers (gas, value, fee fields, total difficulty) are stored as
//! decimal `TEXT` per §6 and parsed back through `alloy_primitives::U256`'s
//! `FromStr`/`Display`, which round-trip losslessly past `i64::MAX`. Block
//! numbers and timestamps stay `i64` (safe: no real chain reaches
//! `i64::MAX` blocks or a post-2262 Unix timestamp within this system's
//! lifetime).
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use async_trait::async_trait;
use sqlx::{FromRow, Row, postgres::PgPool};
use tracing::instrument;

use super::interval_merge;
use super::ports::{CachedRangeWrite, EventStore, LogQuery};
use crate::error::{InfraError, Result};
use crate::types::entities::{
    CachedInterval, ContractCall, FullBlock, LightBlock, Log, Transaction,
};
use crate::types::primitives::{Address, B256, Bloom, BlockNumber, U256};

/// PostgreSQL-backed `EventStore`.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Wrap a connection pool. Call `sqlx::migrate!("./migrations")` against
    /// it before first use (see `src/store/migrations/`).
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Borrow the underlying pool, e.g. to run migrations at startup.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn u256_to_text(value: U256) -> String {
    value.to_string()
}

fn text_to_u256(value: &str) -> Result<U256> {
    value
        .parse()
        .map_err(|e: <U256 as std::str::FromStr>::Err| {
            InfraError::Database(sqlx::Error::Decode(Box::new(std::io::Error::other(
                e.to_string(),
            ))))
            .into()
        })
}

fn hex_to_bytes(value: &str) -> Vec<u8> {
    alloy::hex::decode(value).unwrap_or_default()
}

fn bytes_to_hex(value: &[u8]) -> String {
    alloy::hex::encode_prefixed(value)
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self, block, transactions, logs), fields(block_number = block.light.number.get()))]
    async fn insert_realtime_block(
        &self,
        _chain_id: u64,
        block: &FullBlock,
        transactions: &[Transaction],
        logs: &[Log],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(InfraError::Database)?;
        let light = &block.light;

        sqlx::query(
            "INSERT INTO blocks (
                hash, number, timestamp, gas_limit, gas_used, base_fee_per_gas, miner,
                extra_data, size, parent_hash, state_root, transactions_root,
                receipts_root, logs_bloom, total_difficulty
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
            ON CONFLICT (hash) DO NOTHING",
        )
        .bind(light.hash.to_string())
        .bind(i64::from(light.number))
        .bind(light.timestamp as i64)
        .bind(u256_to_text(block.gas_limit))
        .bind(u256_to_text(block.gas_used))
        .bind(block.base_fee_per_gas.map(u256_to_text))
        .bind(block.miner.to_string())
        .bind(bytes_to_hex(&block.extra_data))
        .bind(block.size.map(|s| s as i64))
        .bind(light.parent_hash.to_string())
        .bind(block.state_root.to_string())
        .bind(block.transactions_root.to_string())
        .bind(block.receipts_root.to_string())
        .bind(bytes_to_hex(light.logs_bloom.as_slice()))
        .bind(block.total_difficulty.map(u256_to_text))
        .execute(&mut *tx)
        .await
        .map_err(InfraError::Database)?;

        for txn in transactions {
            sqlx::query(
                "INSERT INTO transactions (
                    hash, nonce, from_address, to_address, value, input, gas, gas_price,
                    max_fee_per_gas, max_priority_fee_per_gas, block_hash, block_number,
                    transaction_index, chain_id
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
                ON CONFLICT (hash) DO NOTHING",
            )
            .bind(txn.hash.to_string())
            .bind(txn.nonce as i64)
            .bind(txn.from.to_string())
            .bind(txn.to.map(|a| a.to_string()))
            .bind(u256_to_text(txn.value))
            .bind(bytes_to_hex(&txn.input))
            .bind(u256_to_text(txn.gas))
            .bind(u256_to_text(txn.gas_price))
            .bind(txn.max_fee_per_gas.map(u256_to_text))
            .bind(txn.max_priority_fee_per_gas.map(u256_to_text))
            .bind(txn.block_hash.to_string())
            .bind(i64::from(txn.block_number))
            .bind(txn.transaction_index as i64)
            .bind(txn.chain_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(InfraError::Database)?;
        }

        for log in logs {
            sqlx::query(
                "INSERT INTO logs (
                    log_id, log_sort_key, address, data, topic0, topic1, topic2, topic3,
                    block_hash, block_number, block_timestamp, log_index, transaction_hash,
                    transaction_index, removed
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
                ON CONFLICT (log_id) DO NOTHING",
            )
            .bind(&log.log_id)
            .bind(log.log_sort_key)
            .bind(log.address.to_string())
            .bind(bytes_to_hex(&log.data))
            .bind(log.topics[0].map(|t| t.to_string()))
            .bind(log.topics[1].map(|t| t.to_string()))
            .bind(log.topics[2].map(|t| t.to_string()))
            .bind(log.topics[3].map(|t| t.to_string()))
            .bind(log.block_hash.to_string())
            .bind(i64::from(log.block_number))
            .bind(log.block_timestamp.map(|t| t as i64))
            .bind(log.log_index as i64)
            .bind(log.transaction_hash.to_string())
            .bind(log.transaction_index as i64)
            .bind(log.removed)
            .execute(&mut *tx)
            .await
            .map_err(InfraError::Database)?;
        }

        // Backfill blockTimestamp on any pre-existing log rows for this block.
        sqlx::query("UPDATE logs SET block_timestamp = $1 WHERE block_hash = $2 AND block_timestamp IS NULL")
            .bind(light.timestamp as i64)
            .bind(light.hash.to_string())
            .execute(&mut *tx)
            .await
            .map_err(InfraError::Database)?;

        tx.commit().await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self, write))]
    async fn insert_log_filter_cached_ranges(&self, write: CachedRangeWrite) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(InfraError::Database)?;

        for key in write.log_filter_keys {
            let rows = sqlx::query(
                "SELECT start_block, end_block, end_block_timestamp FROM cached_intervals WHERE contract_address = $1",
            )
            .bind(key.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(InfraError::Database)?;

            let existing: Vec<CachedInterval> = rows
                .into_iter()
                .map(|row| CachedInterval {
                    contract_address: key,
                    start_block: BlockNumber::new(row.get::<i64, _>("start_block") as u64),
                    end_block: BlockNumber::new(row.get::<i64, _>("end_block") as u64),
                    end_block_timestamp: row.get::<i64, _>("end_block_timestamp") as u64,
                })
                .collect();

            let new_interval = CachedInterval {
                contract_address: key,
                start_block: write.start_block,
                end_block: write.end_block,
                end_block_timestamp: write.end_block_timestamp,
            };

            // Fatal on corruption (§4.1): propagate before touching storage.
            let merged = interval_merge::merge(existing, new_interval)?;

            sqlx::query("DELETE FROM cached_intervals WHERE contract_address = $1")
                .bind(key.to_string())
                .execute(&mut *tx)
                .await
                .map_err(InfraError::Database)?;

            for interval in merged {
                sqlx::query(
                    "INSERT INTO cached_intervals (contract_address, start_block, end_block, end_block_timestamp)
                     VALUES ($1,$2,$3,$4)",
                )
                .bind(interval.contract_address.to_string())
                .bind(i64::from(interval.start_block))
                .bind(i64::from(interval.end_block))
                .bind(interval.end_block_timestamp as i64)
                .execute(&mut *tx)
                .await
                .map_err(InfraError::Database)?;
            }
        }

        tx.commit().await.map_err(InfraError::Database)?;
        Ok(())
    }

    #[instrument(skip(self), fields(from_block_number = from_block_number.get()))]
    async fn delete_realtime_data(
        &self,
        _chain_id: u64,
        from_block_number: BlockNumber,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(InfraError::Database)?;
        let threshold = i64::from(from_block_number);

        sqlx::query("DELETE FROM logs WHERE block_number >= $1")
            .bind(threshold)
            .execute(&mut *tx)
            .await
            .map_err(InfraError::Database)?;
        sqlx::query("DELETE FROM transactions WHERE block_number >= $1")
            .bind(threshold)
            .execute(&mut *tx)
            .await
            .map_err(InfraError::Database)?;
        sqlx::query("DELETE FROM blocks WHERE number >= $1")
            .bind(threshold)
            .execute(&mut *tx)
            .await
            .map_err(InfraError::Database)?;

        tx.commit().await.map_err(InfraError::Database)?;
        Ok(())
    }

    async fn get_cached_intervals(&self, contract_address: Address) -> Result<Vec<CachedInterval>> {
        let rows = sqlx::query(
            "SELECT start_block, end_block, end_block_timestamp FROM cached_intervals
             WHERE contract_address = $1 ORDER BY start_block",
        )
        .bind(contract_address.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| CachedInterval {
                contract_address,
                start_block: BlockNumber::new(row.get::<i64, _>("start_block") as u64),
                end_block: BlockNumber::new(row.get::<i64, _>("end_block") as u64),
                end_block_timestamp: row.get::<i64, _>("end_block_timestamp") as u64,
            })
            .collect())
    }

    async fn get_block(&self, hash: B256) -> Result<Option<FullBlock>> {
        let row = sqlx::query_as::<_, BlockRow>("SELECT * FROM blocks WHERE hash = $1")
            .bind(hash.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(InfraError::Database)?;
        row.map(FullBlock::try_from).transpose()
    }

    async fn get_transaction(&self, hash: B256) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE hash = $1")
            .bind(hash.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(InfraError::Database)?;
        row.map(Transaction::try_from).transpose()
    }

    async fn get_logs(&self, query: LogQuery) -> Result<Vec<Log>> {
        let rows = sqlx::query_as::<_, LogRow>(
            "SELECT * FROM logs
             WHERE address = $1 AND block_timestamp > $2 AND block_timestamp <= $3
               AND ($4::text[] IS NULL OR topic0 = ANY($4))
             ORDER BY log_sort_key",
        )
        .bind(query.contract_address.to_string())
        .bind(query.from_block_timestamp_exclusive as i64)
        .bind(query.to_block_timestamp_inclusive as i64)
        .bind(
            query
                .event_sig_hashes
                .map(|hashes| hashes.iter().map(ToString::to_string).collect::<Vec<_>>()),
        )
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter().map(Log::try_from).collect()
    }

    async fn upsert_contract_call(&self, call: ContractCall) -> Result<()> {
        sqlx::query(
            "INSERT INTO contract_calls (key, result) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET result = EXCLUDED.result",
        )
        .bind(&call.key)
        .bind(&call.result)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(())
    }

    async fn get_contract_call(&self, key: &str) -> Result<Option<ContractCall>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT key, result FROM contract_calls WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;
        Ok(row.map(|(key, result)| ContractCall { key, result }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROW TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct BlockRow {
    hash: String,
    number: i64,
    timestamp: i64,
    gas_limit: String,
    gas_used: String,
    base_fee_per_gas: Option<String>,
    miner: String,
    extra_data: String,
    size: Option<i64>,
    parent_hash: String,
    state_root: String,
    transactions_root: String,
    receipts_root: String,
    logs_bloom: String,
    total_difficulty: Option<String>,
}

impl TryFrom<BlockRow> for FullBlock {
    type Error = crate::error::AppError;

    fn try_from(row: BlockRow) -> Result<Self> {
        let light = LightBlock {
            hash: row.hash.parse().map_err(parse_err)?,
            number: BlockNumber::new(row.number as u64),
            parent_hash: row.parent_hash.parse().map_err(parse_err)?,
            timestamp: row.timestamp as u64,
            logs_bloom: Bloom::from_slice(&hex_to_bytes(&row.logs_bloom)),
        };
        Ok(Self {
            light,
            gas_limit: text_to_u256(&row.gas_limit)?,
            gas_used: text_to_u256(&row.gas_used)?,
            base_fee_per_gas: row.base_fee_per_gas.as_deref().map(text_to_u256).transpose()?,
            miner: row.miner.parse().map_err(parse_err)?,
            extra_data: hex_to_bytes(&row.extra_data),
            size: row.size.map(|s| s as u64),
            state_root: row.state_root.parse().map_err(parse_err)?,
            transactions_root: row.transactions_root.parse().map_err(parse_err)?,
            receipts_root: row.receipts_root.parse().map_err(parse_err)?,
            total_difficulty: row.total_difficulty.as_deref().map(text_to_u256).transpose()?,
            transactions: Vec::new(),
        })
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    hash: String,
    nonce: i64,
    from_address: String,
    to_address: Option<String>,
    value: String,
    input: String,
    gas: String,
    gas_price: String,
    max_fee_per_gas: Option<String>,
    max_priority_fee_per_gas: Option<String>,
    block_hash: String,
    block_number: i64,
    transaction_index: i64,
    chain_id: i64,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = crate::error::AppError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        Ok(Self {
            hash: row.hash.parse().map_err(parse_err)?,
            nonce: row.nonce as u64,
            from: row.from_address.parse().map_err(parse_err)?,
            to: row.to_address.map(|a| a.parse()).transpose().map_err(parse_err)?,
            value: text_to_u256(&row.value)?,
            input: hex_to_bytes(&row.input),
            gas: text_to_u256(&row.gas)?,
            gas_price: text_to_u256(&row.gas_price)?,
            max_fee_per_gas: row.max_fee_per_gas.as_deref().map(text_to_u256).transpose()?,
            max_priority_fee_per_gas: row
                .max_priority_fee_per_gas
                .as_deref()
                .map(text_to_u256)
                .transpose()?,
            block_hash: row.block_hash.parse().map_err(parse_err)?,
            block_number: BlockNumber::new(row.block_number as u64),
            transaction_index: row.transaction_index as u64,
            chain_id: row.chain_id as u64,
        })
    }
}

#[derive(Debug, FromRow)]
struct LogRow {
    log_id: String,
    log_sort_key: i64,
    address: String,
    data: String,
    topic0: Option<String>,
    topic1: Option<String>,
    topic2: Option<String>,
    topic3: Option<String>,
    block_hash: String,
    block_number: i64,
    block_timestamp: Option<i64>,
    log_index: i64,
    transaction_hash: String,
    transaction_index: i64,
    removed: bool,
}

impl TryFrom<LogRow> for Log {
    type Error = crate::error::AppError;

    fn try_from(row: LogRow) -> Result<Self> {
        let parse_topic = |t: Option<String>| -> Result<Option<B256>> {
            t.map(|s| s.parse().map_err(parse_err)).transpose()
        };
        Ok(Self {
            log_id: row.log_id,
            log_sort_key: row.log_sort_key,
            address: row.address.parse().map_err(parse_err)?,
            data: hex_to_bytes(&row.data),
            topics: [
                parse_topic(row.topic0)?,
                parse_topic(row.topic1)?,
                parse_topic(row.topic2)?,
                parse_topic(row.topic3)?,
            ],
            block_hash: row.block_hash.parse().map_err(parse_err)?,
            block_number: BlockNumber::new(row.block_number as u64),
            block_timestamp: row.block_timestamp.map(|t| t as u64),
            log_index: row.log_index as u64,
            transaction_hash: row.transaction_hash.parse().map_err(parse_err)?,
            transaction_index: row.transaction_index as u64,
            removed: row.removed,
        })
    }
}

fn parse_err(err: impl std::fmt::Display) -> crate::error::AppError {
    InfraError::Database(sqlx::Error::Decode(Box::new(std::io::Error::other(
        err.to_string(),
    ))))
    .into()
}
