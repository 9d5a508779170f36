//! The Realtime Sync core (§4): local chain state, reorg reconciliation,
//! and the service that drives both against a [`crate::rpc::ChainClient`]
//! and an [`crate::store::EventStore`].

pub mod local_chain;
pub mod reorg;
mod service;

pub use local_chain::LocalChainState;
pub use reorg::ReconcileOutcome;
pub use service::{NetworkConfig, RealtimeSyncService, SetupOutcome};
