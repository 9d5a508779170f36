//! The typed event publisher's payload (§4.4, §9 "Event emitter → typed
//! publisher").
//!
//! The original source dispatches through a dynamic event emitter; this
//! crate exposes a single tagged-variant enum instead, so subscribers match
//! exhaustively by variant rather than by string topic name.

use serde::{Deserialize, Serialize};

use super::primitives::BlockNumber;

/// A block was accepted as the new local-chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeCheckpoint {
    /// Timestamp of the newly accepted head block.
    pub timestamp: u64,
}

/// The finality checkpoint advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityCheckpoint {
    /// Timestamp of the new `finalizedBlockNumber`.
    pub timestamp: u64,
}

/// A reorg was detected and reconciled without reaching the finalized
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShallowReorg {
    /// Timestamp of the common ancestor block.
    pub common_ancestor_timestamp: u64,
}

/// A reorg was detected whose traversal reached `finalizedBlockNumber`
/// without finding a common ancestor with the local chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepReorg {
    /// Block number that triggered detection.
    pub detected_at_block_number: BlockNumber,
    /// Number of ancestor hops walked before giving up; a lower bound on
    /// true reorg depth.
    pub minimum_depth: u64,
}

/// All events the Realtime Sync Service emits (§4.4).
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// New head accepted (§4.4.1 Extend).
    RealtimeCheckpoint(RealtimeCheckpoint),
    /// Finality advanced (§4.4.1 Extend, finality branch).
    FinalityCheckpoint(FinalityCheckpoint),
    /// Reorg reconciled against a common ancestor above the finalized
    /// boundary (§4.4.3).
    ShallowReorg(ShallowReorg),
    /// Reorg whose walk reached the finalized boundary (§4.4.3).
    DeepReorg(DeepReorg),
    /// A transient or fatal error surfaced from the task queue (§7).
    ///
    /// Carries the error's rendered `Display` text rather than the error
    /// itself: `AppError` holds non-`Clone` sources (`sqlx::Error`, boxed
    /// transport errors), and a publisher may hand the same event to several
    /// subscribers, so there is no single owner to move the original error
    /// into.
    Error(String),
}

impl From<RealtimeCheckpoint> for SyncEvent {
    fn from(value: RealtimeCheckpoint) -> Self {
        Self::RealtimeCheckpoint(value)
    }
}

impl From<FinalityCheckpoint> for SyncEvent {
    fn from(value: FinalityCheckpoint) -> Self {
        Self::FinalityCheckpoint(value)
    }
}

impl From<ShallowReorg> for SyncEvent {
    fn from(value: ShallowReorg) -> Self {
        Self::ShallowReorg(value)
    }
}

impl From<DeepReorg> for SyncEvent {
    fn from(value: DeepReorg) -> Self {
        Self::DeepReorg(value)
    }
}
