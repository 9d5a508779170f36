//! Domain entities for the Event Store (§3 of the data model).
//!
//! These are the in-memory representations the sync service and the store
//! ports exchange; persistence-layer row shapes (and their `TryFrom`
//! conversions) live next to the SQLx adapter in [`crate::store::postgres`].

use serde::{Deserialize, Serialize};

use super::primitives::{Address, B256, Bloom, BlockNumber, U256};

/// A block header without its transaction bodies.
///
/// Immutable once ingested; this is the shape the local chain state (§3,
/// in-memory realtime suffix) actually retains — full blocks are only kept
/// transiently long enough to extract matched logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightBlock {
    /// Block hash.
    pub hash: B256,
    /// Block height.
    pub number: BlockNumber,
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// Unix timestamp (seconds) from the block header.
    pub timestamp: u64,
    /// Logs bloom from the block header, used for pre-screening (§4.2).
    pub logs_bloom: Bloom,
}

/// A full block: header plus the fields downstream handlers need, plus its
/// transaction list.
///
/// Persisted verbatim only when at least one matched log is present
/// (§3 "Persisted verbatim to the cache when at least one matched log is
/// present").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullBlock {
    /// Light form of this block.
    pub light: LightBlock,
    /// Gas limit, as reported by the header. Large enough to exceed i64 on
    /// some L2s, so kept as `U256`.
    pub gas_limit: U256,
    /// Gas used.
    pub gas_used: U256,
    /// Base fee per gas (post EIP-1559 chains). `None` pre-London.
    pub base_fee_per_gas: Option<U256>,
    /// Fee recipient / block producer.
    pub miner: Address,
    /// Opaque extra data field from the header.
    pub extra_data: Vec<u8>,
    /// Encoded block size in bytes, if reported by the RPC endpoint.
    pub size: Option<u64>,
    /// State root.
    pub state_root: B256,
    /// Transactions root.
    pub transactions_root: B256,
    /// Receipts root.
    pub receipts_root: B256,
    /// Cumulative difficulty (pre-merge chains); `None` on PoS chains.
    pub total_difficulty: Option<U256>,
    /// Transactions included in this block.
    pub transactions: Vec<Transaction>,
}

impl FullBlock {
    /// The light form of this block, as retained by the local chain state.
    #[must_use]
    pub const fn as_light(&self) -> LightBlock {
        self.light
    }
}

/// A transaction, persisted only when referenced by a matched log (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: B256,
    /// Sender-scoped nonce.
    pub nonce: u64,
    /// Sender address.
    pub from: Address,
    /// Recipient address; `None` for contract-creation transactions.
    pub to: Option<Address>,
    /// Value transferred, in wei.
    pub value: U256,
    /// Calldata / input payload.
    pub input: Vec<u8>,
    /// Gas limit supplied by the sender.
    pub gas: U256,
    /// Legacy gas price; present for all transaction types for compatibility.
    pub gas_price: U256,
    /// EIP-1559 max fee per gas; `None` for legacy transactions.
    pub max_fee_per_gas: Option<U256>,
    /// EIP-1559 max priority fee per gas; `None` for legacy transactions.
    pub max_priority_fee_per_gas: Option<U256>,
    /// Hash of the block this transaction was included in.
    pub block_hash: B256,
    /// Height of the block this transaction was included in.
    pub block_number: BlockNumber,
    /// Index of this transaction within its block.
    pub transaction_index: u64,
    /// Chain ID this transaction was submitted against.
    pub chain_id: u64,
}

/// A log, keyed by `log_id` (§3: `"{blockHash}-{logIndex}"` in canonical form).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Primary key: a stable identifier derived from block hash + log index.
    pub log_id: String,
    /// Monotonic sort key across the whole store, used for cursor-free
    /// range scans in `getLogs`.
    pub log_sort_key: i64,
    /// Emitting contract address.
    pub address: Address,
    /// Opaque non-indexed log data.
    pub data: Vec<u8>,
    /// Indexed topics. `topics[0]` is conventionally the event signature
    /// hash. All four are optional because logs may have fewer than four
    /// topics.
    pub topics: [Option<B256>; 4],
    /// Hash of the containing block.
    pub block_hash: B256,
    /// Height of the containing block.
    pub block_number: BlockNumber,
    /// Timestamp of the containing block. `None` until the block itself is
    /// known (§3); backfilled by `insertRealtimeBlock`.
    pub block_timestamp: Option<u64>,
    /// Index of this log within its block.
    pub log_index: u64,
    /// Hash of the transaction that emitted this log.
    pub transaction_hash: B256,
    /// Index of that transaction within its block.
    pub transaction_index: u64,
    /// Whether this log was later removed by a reorg, as reported by the
    /// RPC endpoint at the time it was fetched (distinct from this crate's
    /// own reorg reconciliation, which deletes rows outright rather than
    /// flagging them).
    pub removed: bool,
}

impl Log {
    /// Canonical `log_id`: stable under re-ingestion, unique per block.
    #[must_use]
    pub fn canonical_id(block_hash: B256, log_index: u64) -> String {
        format!("{block_hash:#x}-{log_index}")
    }

    /// Canonical `log_sort_key`: monotonic across the whole store so
    /// `getLogs` can range-scan in canonical order (§4.3) without a
    /// secondary tiebreaker. Assumes fewer than 1000 logs per block, which
    /// holds for any EVM chain's per-block gas limit.
    #[must_use]
    pub const fn canonical_sort_key(block_number: BlockNumber, log_index: u64) -> i64 {
        block_number.get() as i64 * 1_000 + log_index as i64
    }

    /// The first topic, conventionally the event signature hash.
    #[must_use]
    pub const fn topic0(&self) -> Option<B256> {
        self.topics[0]
    }
}

/// A contiguous, fully-indexed block range for one contract (§3).
///
/// Invariant enforced by the Event Store, not by this type: for a given
/// `contract_address`, stored intervals are pairwise non-overlapping and
/// non-adjacent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedInterval {
    /// Address (or, more generally, log-filter key namespace) this interval
    /// covers. Named `contract_address` to match §6's schema column.
    pub contract_address: Address,
    /// First block in the range (inclusive).
    pub start_block: BlockNumber,
    /// Last block in the range (inclusive).
    pub end_block: BlockNumber,
    /// Timestamp of `end_block`.
    pub end_block_timestamp: u64,
}

impl CachedInterval {
    /// Whether `self` and `other` touch or overlap and should be merged,
    /// per the §3 merge rule: `max(a,c) <= min(b,d) + 1`.
    #[must_use]
    pub fn overlaps_or_adjacent(&self, other: &Self) -> bool {
        let lo = self.start_block.max(other.start_block);
        let hi = self.end_block.min(other.end_block);
        lo <= hi.next()
    }

    /// Merge two touching/overlapping intervals, sourcing
    /// `end_block_timestamp` from whichever contributor's `end_block`
    /// equals the merged `end_block`.
    ///
    /// Returns `None` if neither contributor's `end_block` matches the
    /// merged endpoint — callers must treat that as an invariant violation
    /// (§4.1: "the implementation MUST fail hard").
    #[must_use]
    pub fn merge(&self, other: &Self) -> Option<Self> {
        let start_block = self.start_block.min(other.start_block);
        let end_block = self.end_block.max(other.end_block);
        let end_block_timestamp = if self.end_block == end_block {
            self.end_block_timestamp
        } else if other.end_block == end_block {
            other.end_block_timestamp
        } else {
            return None;
        };
        Some(Self {
            contract_address: self.contract_address,
            start_block,
            end_block,
            end_block_timestamp,
        })
    }
}

/// Opaque memoization entry for a read-only contract call (§3).
///
/// The realtime sync core never writes these itself; the Event Store must
/// support them for the handler-execution layer that sits on top of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    /// Memoization key (typically a hash of call target + calldata + block).
    pub key: String,
    /// Opaque, caller-defined serialized result.
    pub result: String,
}
