//! Domain types for the realtime sync core (§3 of the data model).
//!
//! - [`primitives`] — block-height newtype and re-exported `alloy` address/
//!   hash/bloom/bigint types.
//! - [`entities`] — `LightBlock`, `FullBlock`, `Transaction`, `Log`,
//!   `CachedInterval`, `ContractCall`.
//! - [`filter`] — log filter specifications (§4.2, §4.3, §6 `logFilters[]`).
//! - [`events`] — the typed publisher's event enum (§9).

pub mod entities;
pub mod events;
pub mod filter;
pub mod primitives;

pub use entities::{CachedInterval, ContractCall, FullBlock, LightBlock, Log, Transaction};
pub use events::{DeepReorg, FinalityCheckpoint, RealtimeCheckpoint, ShallowReorg, SyncEvent};
pub use filter::{LogFilterSpec, TopicFilter};
pub use primitives::{Address, B256, Bloom, BlockNumber, U256};
