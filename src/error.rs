//! Layered error types for the realtime sync core.
//!
//! This module provides a hierarchical error system:
//!
//! - [`DomainError`] - invariant violations (§7 "Invariant violation"); these
//!   are the "fail hard" cases and are never retried by the task queue.
//! - [`InfraError`] - transport/storage failures (§7 transient vs. fatal RPC,
//!   plus database and config errors).
//! - [`AppError`] - application-level errors combining domain and infra,
//!   plus sync-specific outcomes (unresolved deep reorg, shutdown).
//!
//! # Error Philosophy
//!
//! - `DomainError` indicates corruption and must not be silently papered
//!   over: the queue's `onError` hook never retries it.
//! - `InfraError::RpcTransient` is retried by queue policy; `RpcFatal`
//!   propagates indefinitely and requires operator intervention (§7).
//! - The `Result` type alias uses `AppError` throughout the library surface;
//!   `main.rs` additionally uses `eyre::Report` at the CLI boundary.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Invariant violations in the local chain state or the Event Store (§7).
///
/// These are programming/data-corruption errors, not recoverable business
/// conditions — surfacing one means an invariant documented in §3 or §4.1
/// was broken.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// Interval-merge could not source `endBlockTimestamp` from either
    /// contributing interval (§4.1: "the implementation MUST fail hard").
    #[error(
        "interval merge for {contract_address} produced endBlock {merged_end} with no \
         contributing interval whose endBlock matches it"
    )]
    IntervalMergeTimestampMissing {
        /// Contract address the merge was computed for.
        contract_address: String,
        /// The merged interval's `endBlock`.
        merged_end: u64,
    },

    /// Finality advance could not find the local block at the computed
    /// finality boundary (§4.4.1: "let `F` be the local block whose
    /// `number == finalizedBlockNumber + finalityBlockCount`").
    #[error("finality advance expected local block {0} but it is not in the local chain")]
    FinalizedBlockMissing(u64),

    /// A mutation would have broken the local chain state invariants (§3):
    /// non-strictly-increasing `number`, or a `parentHash` mismatch between
    /// consecutive entries.
    #[error("local chain invariant violated: {0}")]
    LocalChainInvariantViolated(String),

    /// A block classified as duplicate/new-head/gap/reorg (§4.4 table) did
    /// not actually satisfy any of the four documented conditions — this
    /// indicates the classification logic itself is broken.
    #[error("block {block_number} did not match any classification case against head {head}")]
    UnclassifiableBlock {
        /// The block number that failed to classify.
        block_number: u64,
        /// The local chain head's block number at classification time.
        head: u64,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Infrastructure-level errors from external systems (§7).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Database error from the Event Store's Postgres adapter.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transient RPC error: the queue's `onError` hook retries the task
    /// that produced it (§7 "Transient RPC error").
    #[error("transient RPC error: {0}")]
    RpcTransient(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Fatal RPC error: the endpoint appears permanently broken; retries
    /// continue indefinitely and an operator must intervene (§7 "Fatal RPC
    /// error").
    #[error("fatal RPC error: {0}")]
    RpcFatal(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON serialization/deserialization error (RPC payload decoding).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced block, transaction, or log was not present in the
    /// store.
    #[error("resource not found")]
    NotFound,

    /// Connection pool exhausted.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors combining domain and infrastructure errors.
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Domain logic error (invariant violation, never retried).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure error.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// A reorg's ancestor walk reached `finalizedBlockNumber` without
    /// finding a common ancestor (§4.4.3, §7 "Deep reorg"). Not itself a
    /// failure of this core — recovery is delegated to a higher layer —
    /// but surfaced as an error variant so callers that only look at
    /// `Result` still observe it alongside the `deepReorg` event.
    #[error("deep reorg detected at block {detected_at}, minimum depth {minimum_depth}")]
    DeepReorgUnresolved {
        /// Block number that triggered detection.
        detected_at: u64,
        /// Lower bound on the true reorg depth.
        minimum_depth: u64,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Initialization error.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Graceful shutdown requested.
    #[error("shutdown requested")]
    ShutdownRequested,
}

/// Type alias for application Results.
pub type Result<T> = std::result::Result<T, AppError>;
