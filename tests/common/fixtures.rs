//! Test fixtures for integration tests: a real Postgres-backed `TestDb`,
//! plus builders for the domain entities the Event Store persists.

use evm_realtime_sync::store::PgEventStore;
use evm_realtime_sync::types::entities::{FullBlock, LightBlock, Log, Transaction};
use evm_realtime_sync::types::primitives::{Address, B256, Bloom, BlockNumber, U256};
use sqlx::PgPool;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;

use super::containers::{TestPostgres, build_connection_string};

/// A test database instance backed by a real, disposable Postgres
/// container. Dropped (and the container stopped) at the end of the test.
pub struct TestDb {
    /// The connection pool to the test database.
    pub pool: PgPool,
    /// The `EventStore` adapter wrapping the pool.
    pub store: PgEventStore,
    /// The container (kept alive for the duration of the test).
    _container: ContainerAsync<TestPostgres>,
}

impl TestDb {
    /// Start a fresh Postgres container, connect, and run migrations.
    ///
    /// # Panics
    ///
    /// Panics if container startup, connection, or migrations fail.
    pub async fn new() -> Self {
        let container = TestPostgres::default()
            .start()
            .await
            .expect("failed to start postgres container");

        let host = container.get_host().await.expect("failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("failed to get port");

        let connection_string = build_connection_string(&host.to_string(), port);
        let pool = connect_with_retries(&connection_string, 30)
            .await
            .expect("failed to connect to database");

        // Path is relative to CARGO_MANIFEST_DIR, not this file (sqlx::migrate!
        // always resolves against the crate root).
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("failed to run migrations");

        let store = PgEventStore::new(pool.clone());

        Self {
            pool,
            store,
            _container: container,
        }
    }
}

/// Postgres can take a moment to be fully ready even after the "ready to
/// accept connections" message appears on stderr.
async fn connect_with_retries(url: &str, max_attempts: u32) -> Result<PgPool, sqlx::Error> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match PgPool::connect(url).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => return Ok(pool),
                Err(e) if attempts < max_attempts => {
                    tracing::debug!("connection verify failed (attempt {attempts}): {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e),
            },
            Err(e) if attempts < max_attempts => {
                tracing::debug!("connection failed (attempt {attempts}): {e}");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Entity builders shared across the integration test suites.
pub mod entities {
    use super::{Address, B256, Bloom, BlockNumber, FullBlock, Log, LightBlock, Transaction, U256};

    /// A light block at `number`, linked to `parent_hash`.
    #[must_use]
    pub fn light_block(number: u64, hash: B256, parent_hash: B256, timestamp: u64) -> LightBlock {
        LightBlock {
            hash,
            number: BlockNumber::new(number),
            parent_hash,
            timestamp,
            logs_bloom: Bloom::ZERO,
        }
    }

    /// A full block wrapping `light`, with zeroed header fields and no
    /// transactions — callers push transactions on as needed.
    #[must_use]
    pub fn full_block(light: LightBlock) -> FullBlock {
        FullBlock {
            light,
            gas_limit: U256::from(30_000_000u64),
            gas_used: U256::from(21_000u64),
            base_fee_per_gas: Some(U256::from(1_000_000_000u64)),
            miner: Address::repeat_byte(0xF0),
            extra_data: Vec::new(),
            size: Some(1_000),
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            receipts_root: B256::ZERO,
            total_difficulty: None,
            transactions: Vec::new(),
        }
    }

    /// A minimal transaction referencing `block_hash`/`block_number`.
    #[must_use]
    pub fn transaction(hash: B256, block_hash: B256, block_number: BlockNumber, to: Address) -> Transaction {
        Transaction {
            hash,
            nonce: 0,
            from: Address::repeat_byte(0x01),
            to: Some(to),
            value: U256::ZERO,
            input: Vec::new(),
            gas: U256::from(21_000u64),
            gas_price: U256::from(1_000_000_000u64),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            block_hash,
            block_number,
            transaction_index: 0,
            chain_id: 1,
        }
    }

    /// A log emitted by `address` in the given block/transaction, with
    /// `topic0` as its only indexed topic.
    #[must_use]
    pub fn log(
        block_hash: B256,
        block_number: BlockNumber,
        block_timestamp: Option<u64>,
        log_index: u64,
        address: Address,
        topic0: B256,
        transaction_hash: B256,
    ) -> Log {
        Log {
            log_id: Log::canonical_id(block_hash, log_index),
            log_sort_key: Log::canonical_sort_key(block_number, log_index),
            address,
            data: Vec::new(),
            topics: [Some(topic0), None, None, None],
            block_hash,
            block_number,
            block_timestamp,
            log_index,
            transaction_hash,
            transaction_index: 0,
            removed: false,
        }
    }
}
