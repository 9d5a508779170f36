//! JSON-RPC transport port (§6 "JSON-RPC (consumed)").
//!
//! The transport itself is an external collaborator per §1 — this module
//! only defines the narrow boundary the sync service needs
//! (`eth_getBlockByNumber`, `eth_getBlockByHash`, `eth_getLogs`), plus an
//! `alloy`-backed adapter.

mod alloy_client;

pub use alloy_client::AlloyChainClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::entities::{FullBlock, Log};
use crate::types::primitives::{B256, BlockNumber};

/// A tag for `eth_getBlockByNumber`: either `"latest"` or an explicit
/// height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    /// The chain's current head, per the endpoint's own view.
    Latest,
    /// An explicit height.
    Number(BlockNumber),
}

/// Port for the external JSON-RPC transport (§6).
///
/// Implementations decode hex-encoded quantities to native integers for
/// `number`/`timestamp` and keep opaque fields (`hash`, `parentHash`,
/// `logsBloom`, topics) as their natively-typed `alloy_primitives` forms.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `eth_getBlockByNumber(tag, withTxns)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InfraError::RpcTransient`] for retryable
    /// failures (timeouts, connection resets) and
    /// [`crate::error::InfraError::RpcFatal`] for failures the transport
    /// considers permanent.
    async fn get_block_by_number(
        &self,
        tag: BlockTag,
        with_txns: bool,
    ) -> Result<Option<FullBlock>>;

    /// `eth_getBlockByHash(hash, withTxns)`.
    ///
    /// # Errors
    ///
    /// See [`ChainClient::get_block_by_number`].
    async fn get_block_by_hash(&self, hash: B256, with_txns: bool) -> Result<Option<FullBlock>>;

    /// `eth_getLogs({blockHash})`.
    ///
    /// # Errors
    ///
    /// See [`ChainClient::get_block_by_number`].
    async fn get_logs_by_block_hash(&self, block_hash: B256) -> Result<Vec<Log>>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks {
    //! An in-memory `ChainClient` used by sync-service unit tests and by
    //! the reorg-reconciliation tests: blocks and logs are scripted ahead
    //! of time with `push_block`, then served back by hash or number.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::{
        BlockTag, ChainClient, FullBlock, Log, Result, async_trait,
    };
    use crate::types::primitives::B256;

    /// A scripted chain: blocks keyed by hash and by number, logs keyed by
    /// block hash.
    ///
    /// Cheaply `Clone`, like [`crate::ports::mocks::MockEventPublisher`]: a
    /// test keeps a handle to push new blocks after the handed-off instance
    /// has been moved into a `RealtimeSyncService`.
    #[derive(Debug, Default, Clone)]
    pub struct MockChainClient {
        by_hash: Arc<Mutex<HashMap<B256, FullBlock>>>,
        by_number: Arc<Mutex<HashMap<u64, B256>>>,
        logs_by_block: Arc<Mutex<HashMap<B256, Vec<Log>>>>,
        latest: Arc<Mutex<Option<B256>>>,
    }

    impl MockChainClient {
        /// Create an empty mock chain.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a block (and its logs) and make it the new `"latest"`.
        pub fn push_block(&self, block: FullBlock, logs: Vec<Log>) {
            let hash = block.light.hash;
            let number = block.light.number.get();
            self.by_hash.lock().unwrap_or_else(|e| e.into_inner()).insert(hash, block);
            self.by_number
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(number, hash);
            self.logs_by_block
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(hash, logs);
            *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(hash);
        }
    }

    #[async_trait]
    impl ChainClient for MockChainClient {
        async fn get_block_by_number(
            &self,
            tag: BlockTag,
            _with_txns: bool,
        ) -> Result<Option<FullBlock>> {
            let hash = match tag {
                BlockTag::Latest => *self.latest.lock().unwrap_or_else(|e| e.into_inner()),
                BlockTag::Number(n) => self
                    .by_number
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(&n.get())
                    .copied(),
            };
            Ok(hash.and_then(|h| {
                self.by_hash
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(&h)
                    .cloned()
            }))
        }

        async fn get_block_by_hash(
            &self,
            hash: B256,
            _with_txns: bool,
        ) -> Result<Option<FullBlock>> {
            Ok(self
                .by_hash
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(&hash)
                .cloned())
        }

        async fn get_logs_by_block_hash(&self, block_hash: B256) -> Result<Vec<Log>> {
            Ok(self
                .logs_by_block
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(&block_hash)
                .cloned()
                .unwrap_or_default())
        }
    }
}
