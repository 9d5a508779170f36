//! The Realtime Sync Service (§4.4): polls the chain head, classifies every
//! incoming block against the local chain, and drives `extend`/`fill`/
//! `reconcile` accordingly.
//!
//! The overall shape — a struct holding the transport, a cancellable
//! background poll loop, and a queue feeding a single processing path — is
//! the familiar one for a realtime chain-following service; the gap-fill
//! fetch concurrency cap in [`GAP_FILL_CONCURRENCY`] follows the same
//! pattern. A vendor WebSocket "pending mini-block" subscription with its
//! own keepalive/reconnect machinery is not used here: this core polls
//! `eth_getBlockByNumber("latest")` on a plain interval instead (see
//! `SPEC_FULL.md` §A.6).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::error::{AppError, DomainError, InfraError, Result};
use crate::ports::EventPublisher;
use crate::queue::{MAX_PRIORITY, PriorityTaskQueue, WorkerResult};
use crate::rpc::{BlockTag, ChainClient};
use crate::store::{CachedRangeWrite, EventStore};
use crate::types::entities::{FullBlock, LightBlock, Transaction};
use crate::types::events::{DeepReorg, FinalityCheckpoint, RealtimeCheckpoint, ShallowReorg, SyncEvent};
use crate::types::filter::LogFilterSpec;
use crate::types::primitives::{Address, BlockNumber};
use crate::{bloom, logfilter};

use super::local_chain::LocalChainState;
use super::reorg::{self, ReconcileOutcome};

/// Maximum number of concurrent `getBlockByNumber` fetches while filling a
/// gap (§4.4.2).
const GAP_FILL_CONCURRENCY: usize = 10;

/// Network-level parameters the service needs beyond the log filters
/// themselves: which chain it is talking to, how deep finality is assumed
/// to run, and how often to poll for a new head.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    /// Chain ID passed through to `EventStore::insert_realtime_block`.
    pub chain_id: u64,
    /// `finalityBlockCount` (§2, §4.4.1): the assumed depth at which a block
    /// can no longer be reorged.
    pub finality_block_count: u64,
    /// How often to poll `eth_getBlockByNumber("latest")`.
    pub poll_interval: Duration,
}

/// Result of [`RealtimeSyncService::setup`] (§4.4 `setup()`).
#[derive(Debug, Clone, Copy)]
pub struct SetupOutcome {
    /// The chain's head at the time `setup` ran.
    pub latest_block_number: BlockNumber,
    /// `max(0, latest.number - finalityBlockCount)`, the conservative
    /// starting point for `finalizedBlockNumber`.
    pub finalized_block_number: BlockNumber,
}

/// The outcome of comparing an incoming block against the local chain head
/// (§4.4's classification table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    /// The block's hash is already present in the local chain.
    Duplicate,
    /// The block correctly extends the current head.
    NewHead,
    /// The block is ahead of the head by more than one, leaving a gap.
    Gap,
    /// The block does not extend the head and is not already known: either
    /// a competing block at the head height or below it.
    Reorg,
}

fn classify(head: LightBlock, contains_hash: bool, block: &LightBlock) -> Classification {
    if contains_hash {
        return Classification::Duplicate;
    }
    if block.number == head.number.next() && block.parent_hash == head.hash {
        return Classification::NewHead;
    }
    if block.number.get() > head.number.next().get() {
        return Classification::Gap;
    }
    Classification::Reorg
}

/// Drives the realtime sync state machine (§4.4) against a [`ChainClient`],
/// an [`EventStore`], and an [`EventPublisher`].
///
/// Construct one, call [`RealtimeSyncService::setup`] then
/// [`RealtimeSyncService::start`] (both require the service to already be
/// held in an `Arc`, since `start` spawns background tasks that outlive the
/// call), and [`RealtimeSyncService::kill`] to stop it.
pub struct RealtimeSyncService<C, S, P> {
    chain_client: Arc<C>,
    store: Arc<S>,
    publisher: Arc<P>,
    network: NetworkConfig,
    log_filters: Arc<Vec<LogFilterSpec>>,
    local_chain: Arc<Mutex<Option<LocalChainState>>>,
    queue: Arc<PriorityTaskQueue<FullBlock>>,
    setup_outcome: Arc<Mutex<Option<SetupOutcome>>>,
    poll_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<C, S, P> RealtimeSyncService<C, S, P>
where
    C: ChainClient + 'static,
    S: EventStore + 'static,
    P: EventPublisher + 'static,
{
    /// Construct a service. Call [`RealtimeSyncService::setup`] and
    /// [`RealtimeSyncService::start`] to bring it up.
    pub fn new(
        chain_client: C,
        store: S,
        publisher: P,
        network: NetworkConfig,
        log_filters: Vec<LogFilterSpec>,
    ) -> Self {
        Self {
            chain_client: Arc::new(chain_client),
            store: Arc::new(store),
            publisher: Arc::new(publisher),
            network,
            log_filters: Arc::new(log_filters),
            local_chain: Arc::new(Mutex::new(None)),
            queue: Arc::new(PriorityTaskQueue::new()),
            setup_outcome: Arc::new(Mutex::new(None)),
            poll_handle: Arc::new(Mutex::new(None)),
        }
    }

    fn priority_for(number: BlockNumber) -> u64 {
        MAX_PRIORITY.saturating_sub(number.get())
    }

    /// `setup()` (§4.4): fetch the current head, derive the starting
    /// `finalizedBlockNumber`, and enqueue the head as the first task.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain client cannot report a latest block.
    #[instrument(skip(self))]
    pub async fn setup(&self) -> Result<SetupOutcome> {
        let latest = self
            .chain_client
            .get_block_by_number(BlockTag::Latest, true)
            .await?
            .ok_or_else(|| {
                DomainError::LocalChainInvariantViolated(
                    "chain endpoint returned no latest block during setup".into(),
                )
            })?;

        let latest_block_number = latest.light.number;
        let finalized_block_number =
            latest_block_number.saturating_sub(self.network.finality_block_count);

        let priority = Self::priority_for(latest_block_number);
        self.queue.add_task(latest, priority).await;

        let outcome = SetupOutcome {
            latest_block_number,
            finalized_block_number,
        };
        *self.setup_outcome.lock().await = Some(outcome);
        info!(
            latest = latest_block_number.get(),
            finalized = finalized_block_number.get(),
            "realtime sync setup complete"
        );
        Ok(outcome)
    }

    /// `start()` (§4.4): seed the local chain at `finalizedBlockNumber`,
    /// start the task queue worker, and begin polling for new heads.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Initialization`] if called before
    /// [`RealtimeSyncService::setup`]. Returns an error if the finalized
    /// block cannot be fetched to seed the local chain.
    #[instrument(skip(self))]
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let outcome = {
            let guard = self.setup_outcome.lock().await;
            guard
                .copied()
                .ok_or_else(|| AppError::Initialization("start() called before setup()".into()))?
        };

        if self
            .log_filters
            .iter()
            .all(|f| f.is_exhausted(outcome.finalized_block_number))
        {
            warn!(
                finalized = outcome.finalized_block_number.get(),
                "all log filters are exhausted at the starting finalized block; nothing to sync"
            );
            return Ok(());
        }

        let finalized_block = self
            .chain_client
            .get_block_by_number(BlockTag::Number(outcome.finalized_block_number), false)
            .await?
            .ok_or_else(|| {
                DomainError::LocalChainInvariantViolated(format!(
                    "finalized block {} not found while seeding local chain",
                    outcome.finalized_block_number
                ))
            })?;

        *self.local_chain.lock().await = Some(LocalChainState::seed(finalized_block.light));

        let worker_service = Arc::clone(self);
        self.queue.start(
            move |task: FullBlock| {
                let service = Arc::clone(&worker_service);
                Box::pin(async move { service.run_task(task).await })
            },
            |err| warn!(error = %err, "realtime sync task failed"),
        );

        let poller_service = Arc::clone(self);
        let poll_interval = self.network.poll_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = poller_service.enqueue_latest().await {
                    warn!(error = %err, "failed to poll latest block");
                }
            }
        });
        *self.poll_handle.lock().await = Some(handle);

        Ok(())
    }

    /// Stop polling, pause the task queue worker, and drop every pending
    /// task (§4.4 `kill()`: "stop polling, pause and clear the task
    /// queue"). An in-flight task is allowed to finish.
    pub async fn kill(&self) {
        if let Some(handle) = self.poll_handle.lock().await.take() {
            handle.abort();
        }
        self.queue.pause();
        self.queue.clear().await;
    }

    async fn enqueue_latest(&self) -> Result<()> {
        if let Some(block) = self
            .chain_client
            .get_block_by_number(BlockTag::Latest, true)
            .await?
        {
            let priority = Self::priority_for(block.light.number);
            self.queue.add_task(block, priority).await;
        }
        Ok(())
    }

    /// Worker entry point: process one block, emitting a generic `error`
    /// event for any failure and re-enqueueing the task on transient RPC
    /// errors (§7 "Transient RPC error... retried by queue policy").
    ///
    /// A deep reorg already publishes its own [`SyncEvent::DeepReorg`] from
    /// within [`RealtimeSyncService::reconcile`] — it is "not an error per
    /// se" (§7), so it must not also surface as a generic `error` event
    /// here.
    async fn run_task(self: &Arc<Self>, task: FullBlock) -> WorkerResult<FullBlock> {
        match self.process_block(task.clone()).await {
            Ok(()) => Ok(()),
            Err(err) => {
                if !matches!(err, AppError::DeepReorgUnresolved { .. }) {
                    let _ = self.publisher.publish(SyncEvent::Error(err.to_string())).await;
                }
                if matches!(err, AppError::Infra(InfraError::RpcTransient(_))) {
                    let priority = Self::priority_for(task.light.number);
                    self.queue.add_task(task.clone(), priority).await;
                }
                Err((err, task))
            }
        }
    }

    #[instrument(skip(self, block), fields(block_number = block.light.number.get(), block_hash = %block.light.hash))]
    async fn process_block(self: &Arc<Self>, block: FullBlock) -> Result<()> {
        let mut guard = self.local_chain.lock().await;
        let chain = guard
            .as_mut()
            .expect("local chain is seeded by start() before any task can run");

        let contains_hash = chain.contains_hash(block.light.hash);
        let head = *chain
            .head()
            .expect("local chain always retains at least the finalized block");
        let classification = classify(head, contains_hash, &block.light);

        match classification {
            Classification::Duplicate => Ok(()),
            Classification::NewHead => self.extend(chain, block).await,
            Classification::Gap => self.fill(head, block).await,
            Classification::Reorg => self.reconcile(chain, block).await,
        }
    }

    /// §4.4.1 `extend`.
    async fn extend(&self, chain: &mut LocalChainState, block: FullBlock) -> Result<()> {
        if bloom::might_match(&block.light.logs_bloom, &self.log_filters) {
            let logs = self.chain_client.get_logs_by_block_hash(block.light.hash).await?;
            let matched = logfilter::filter(&logs, &self.log_filters);
            if !matched.is_empty() {
                let tx_hashes: HashSet<_> = matched.iter().map(|l| l.transaction_hash).collect();
                let transactions: Vec<Transaction> = block
                    .transactions
                    .iter()
                    .filter(|t| tx_hashes.contains(&t.hash))
                    .cloned()
                    .collect();
                self.store
                    .insert_realtime_block(self.network.chain_id, &block, &transactions, &matched)
                    .await?;
            }
        }

        let timestamp = block.light.timestamp;
        let number = block.light.number;
        chain.extend(block.light)?;

        self.publisher.publish(RealtimeCheckpoint { timestamp }.into()).await?;
        self.maybe_advance_finality(chain, number).await
    }

    /// Finality branch of §4.4.1 `extend`: advance `finalizedBlockNumber`
    /// once the new head is more than `2 * finalityBlockCount` ahead of it.
    async fn maybe_advance_finality(
        &self,
        chain: &mut LocalChainState,
        new_head_number: BlockNumber,
    ) -> Result<()> {
        let finality = self.network.finality_block_count;
        let finalized = chain.finalized_block_number();

        if new_head_number.get() <= finalized.saturating_add(finality.saturating_mul(2)).get() {
            return Ok(());
        }

        let boundary = finalized.saturating_add(finality);
        let f_block = *chain
            .find_by_number(boundary)
            .ok_or(DomainError::FinalizedBlockMissing(boundary.get()))?;

        chain.prune_before(boundary)?;

        let keys: Vec<Address> = self.log_filters.iter().map(|f| f.address).collect();
        self.store
            .insert_log_filter_cached_ranges(CachedRangeWrite {
                log_filter_keys: keys,
                start_block: finalized.next(),
                end_block: f_block.number,
                end_block_timestamp: f_block.timestamp,
            })
            .await?;

        self.publisher
            .publish(
                FinalityCheckpoint {
                    timestamp: f_block.timestamp,
                }
                .into(),
            )
            .await?;
        Ok(())
    }

    /// §4.4.2 `fill`: fetch every block between the local head and the
    /// gap-causing trigger, then re-enqueue all of them (plus the trigger)
    /// in ascending order. Never mutates the local chain directly — each
    /// re-enqueued block is reprocessed through the same classification
    /// path once dequeued.
    async fn fill(&self, head: LightBlock, trigger: FullBlock) -> Result<()> {
        let missing: Vec<BlockNumber> = (head.number.get() + 1..trigger.light.number.get())
            .map(BlockNumber::new)
            .collect();

        let fetched: Vec<Result<FullBlock>> = stream::iter(missing)
            .map(|number| {
                let client = Arc::clone(&self.chain_client);
                async move {
                    client
                        .get_block_by_number(BlockTag::Number(number), true)
                        .await?
                        .ok_or_else(|| {
                            DomainError::LocalChainInvariantViolated(format!(
                                "gap fill: block {number} not found while fetching missing range"
                            ))
                            .into()
                        })
                }
            })
            .buffer_unordered(GAP_FILL_CONCURRENCY)
            .collect()
            .await;

        let mut blocks = Vec::with_capacity(fetched.len() + 1);
        for result in fetched {
            blocks.push(result?);
        }
        blocks.sort_by_key(|b| b.light.number);
        blocks.push(trigger);

        for block in blocks {
            let priority = Self::priority_for(block.light.number);
            self.queue.add_task(block, priority).await;
        }
        Ok(())
    }

    /// §4.4.3 `reconcile`: walk back to a common ancestor (or detect a deep
    /// reorg), truncate the local chain, delete the superseded realtime
    /// data, clear the queue of any now-invalid pending work, and
    /// re-enqueue the canonical replacement chain.
    async fn reconcile(&self, chain: &mut LocalChainState, block: FullBlock) -> Result<()> {
        let outcome = reorg::reconcile(self.chain_client.as_ref(), chain, block).await?;

        match outcome {
            ReconcileOutcome::Shallow {
                common_ancestor,
                canonical_chain,
            } => {
                chain.truncate_to(common_ancestor.number);
                self.store
                    .delete_realtime_data(self.network.chain_id, common_ancestor.number.next())
                    .await?;

                // The queue may still hold tasks descending from the
                // superseded fork; drop them before re-enqueueing the
                // canonical replacement (Open Question, resolved in
                // DESIGN.md: clear-then-reenqueue over selective removal).
                self.queue.clear().await;

                for canonical_block in &canonical_chain {
                    let priority = Self::priority_for(canonical_block.light.number);
                    self.queue.add_task(canonical_block.clone(), priority).await;
                }

                if let Some(latest) = self
                    .chain_client
                    .get_block_by_number(BlockTag::Latest, true)
                    .await?
                {
                    let already_queued = canonical_chain
                        .iter()
                        .any(|b| b.light.hash == latest.light.hash);
                    if !already_queued {
                        let priority = Self::priority_for(latest.light.number);
                        self.queue.add_task(latest, priority).await;
                    }
                }

                self.publisher
                    .publish(
                        ShallowReorg {
                            common_ancestor_timestamp: common_ancestor.timestamp,
                        }
                        .into(),
                    )
                    .await?;
                Ok(())
            }
            ReconcileOutcome::Deep {
                detected_at_block_number,
                minimum_depth,
            } => {
                self.publisher
                    .publish(
                        DeepReorg {
                            detected_at_block_number,
                            minimum_depth,
                        }
                        .into(),
                    )
                    .await?;
                Err(AppError::DeepReorgUnresolved {
                    detected_at: detected_at_block_number.get(),
                    minimum_depth,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::publisher::mocks::MockEventPublisher;
    use crate::rpc::mocks::MockChainClient;
    use crate::store::InMemoryEventStore;
    use crate::types::filter::TopicFilter;
    use crate::types::primitives::{B256, Bloom, U256};

    fn light(number: u64, hash: B256, parent_hash: B256) -> LightBlock {
        LightBlock {
            hash,
            number: BlockNumber::new(number),
            parent_hash,
            timestamp: number * 12,
            logs_bloom: Bloom::ZERO,
        }
    }

    fn full(light: LightBlock) -> FullBlock {
        FullBlock {
            light,
            gas_limit: U256::ZERO,
            gas_used: U256::ZERO,
            base_fee_per_gas: None,
            miner: Address::ZERO,
            extra_data: Vec::new(),
            size: None,
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            receipts_root: B256::ZERO,
            total_difficulty: None,
            transactions: Vec::new(),
        }
    }

    fn bloom_covering(address: Address, topic0: B256) -> Bloom {
        use alloy::primitives::BloomInput;
        let mut b = Bloom::ZERO;
        b.accrue(BloomInput::Raw(address.as_slice()));
        b.accrue(BloomInput::Raw(topic0.as_slice()));
        b
    }

    fn network() -> NetworkConfig {
        NetworkConfig {
            chain_id: 1,
            finality_block_count: 2,
            poll_interval: Duration::from_secs(1),
        }
    }

    fn filter_for(address: Address) -> LogFilterSpec {
        LogFilterSpec {
            key: "k".into(),
            address,
            topics: [
                TopicFilter::Any,
                TopicFilter::Any,
                TopicFilter::Any,
                TopicFilter::Any,
            ],
            end_block: None,
        }
    }

    fn service(
        log_filters: Vec<LogFilterSpec>,
    ) -> RealtimeSyncService<MockChainClient, InMemoryEventStore, MockEventPublisher> {
        RealtimeSyncService::new(
            MockChainClient::new(),
            InMemoryEventStore::default(),
            MockEventPublisher::new(),
            network(),
            log_filters,
        )
    }

    #[test]
    fn classification_covers_all_four_cases() {
        let h100 = B256::repeat_byte(1);
        let head = light(100, h100, B256::ZERO);

        let dup = light(100, h100, B256::ZERO);
        assert_eq!(classify(head, true, &dup), Classification::Duplicate);

        let next = light(101, B256::repeat_byte(2), h100);
        assert_eq!(classify(head, false, &next), Classification::NewHead);

        let gap = light(103, B256::repeat_byte(3), B256::repeat_byte(9));
        assert_eq!(classify(head, false, &gap), Classification::Gap);

        let competing = light(101, B256::repeat_byte(4), B256::repeat_byte(9));
        assert_eq!(classify(head, false, &competing), Classification::Reorg);

        let below = light(99, B256::repeat_byte(5), B256::repeat_byte(9));
        assert_eq!(classify(head, false, &below), Classification::Reorg);
    }

    #[tokio::test]
    async fn extend_persists_matched_logs_and_emits_checkpoint() {
        let address = Address::repeat_byte(0xAA);
        let topic0 = B256::repeat_byte(0xBB);
        let svc = service(vec![filter_for(address)]);

        let h100 = B256::repeat_byte(1);
        *svc.local_chain.lock().await = Some(LocalChainState::seed(light(100, h100, B256::ZERO)));

        let h101 = B256::repeat_byte(2);
        let mut block101 = full(LightBlock {
            hash: h101,
            number: BlockNumber::new(101),
            parent_hash: h100,
            timestamp: 1_212,
            logs_bloom: bloom_covering(address, topic0),
        });
        let log = crate::types::entities::Log {
            log_id: "log".into(),
            log_sort_key: 0,
            address,
            data: Vec::new(),
            topics: [Some(topic0), None, None, None],
            block_hash: h101,
            block_number: BlockNumber::new(101),
            block_timestamp: None,
            log_index: 0,
            transaction_hash: B256::repeat_byte(0xCC),
            transaction_index: 0,
            removed: false,
        };
        block101.transactions.push(Transaction {
            hash: B256::repeat_byte(0xCC),
            nonce: 0,
            from: Address::ZERO,
            to: Some(address),
            value: U256::ZERO,
            input: Vec::new(),
            gas: U256::ZERO,
            gas_price: U256::ZERO,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            block_hash: h101,
            block_number: BlockNumber::new(101),
            transaction_index: 0,
            chain_id: 1,
        });
        svc.chain_client.push_block(block101.clone(), vec![log]);

        let svc = Arc::new(svc);
        svc.process_block(block101).await.expect("extend should succeed");

        let stored = svc.store.get_block(h101).await.unwrap();
        assert!(stored.is_some(), "matched-log block must be persisted");

        let events = svc.publisher.events.lock().await;
        assert!(events
            .iter()
            .any(|e| matches!(e, SyncEvent::RealtimeCheckpoint(_))));
    }

    #[tokio::test]
    async fn gap_fill_enqueues_missing_blocks_in_ascending_order() {
        let svc = service(vec![]);
        let h100 = B256::repeat_byte(1);
        *svc.local_chain.lock().await = Some(LocalChainState::seed(light(100, h100, B256::ZERO)));

        let h101 = B256::repeat_byte(2);
        let h102 = B256::repeat_byte(3);
        let h103 = B256::repeat_byte(4);
        let block101 = full(light(101, h101, h100));
        let block102 = full(light(102, h102, h101));
        let block103 = full(light(103, h103, h102));
        svc.chain_client.push_block(block101, Vec::new());
        svc.chain_client.push_block(block102, Vec::new());

        let svc = Arc::new(svc);
        svc.process_block(block103).await.expect("gap fill should succeed");

        assert_eq!(svc.queue.size().await, 3);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        svc.queue.start(
            move |task: FullBlock| {
                let tx = tx.clone();
                Box::pin(async move {
                    tx.send(task.light.number.get()).unwrap();
                    Ok(())
                })
            },
            |_err| {},
        );
        svc.queue.on_idle().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut seen = Vec::new();
        while let Ok(n) = rx.try_recv() {
            seen.push(n);
        }
        assert_eq!(seen, vec![101, 102, 103]);
    }

    #[tokio::test]
    async fn finality_advance_prunes_chain_and_writes_cached_range() {
        let address = Address::repeat_byte(0x11);
        let svc = service(vec![filter_for(address)]);

        let h100 = B256::repeat_byte(1);
        *svc.local_chain.lock().await = Some(LocalChainState::seed(light(100, h100, B256::ZERO)));

        {
            let mut guard = svc.local_chain.lock().await;
            let chain = guard.as_mut().unwrap();
            let mut parent = h100;
            for n in 101..=105u64 {
                let hash = B256::repeat_byte(n as u8);
                chain.extend(light(n, hash, parent)).unwrap();
                parent = hash;
            }
        }

        // finality_block_count == 2, so crossing head 105 against finalized
        // 100 (105 > 100 + 2*2) triggers an advance to boundary 102.
        let svc = Arc::new(svc);
        {
            let mut guard = svc.local_chain.lock().await;
            let chain = guard.as_mut().unwrap();
            svc.maybe_advance_finality(chain, BlockNumber::new(105))
                .await
                .expect("finality advance should succeed");
        }

        let guard = svc.local_chain.lock().await;
        let chain = guard.as_ref().unwrap();
        assert_eq!(chain.finalized_block_number(), BlockNumber::new(102));
        assert!(chain.find_by_number(BlockNumber::new(101)).is_none());

        let intervals = svc.store.get_cached_intervals(address).await.unwrap();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start_block, BlockNumber::new(101));
        assert_eq!(intervals[0].end_block, BlockNumber::new(102));
    }

    #[tokio::test]
    async fn shallow_reorg_truncates_and_requeues_canonical_chain() {
        let svc = service(vec![]);

        let h98 = B256::repeat_byte(98);
        let h99 = B256::repeat_byte(99);
        let h100_old = B256::repeat_byte(100);

        *svc.local_chain.lock().await = Some(LocalChainState::seed(light(98, h98, B256::ZERO)));
        {
            let mut guard = svc.local_chain.lock().await;
            let chain = guard.as_mut().unwrap();
            chain.extend(light(99, h99, h98)).unwrap();
            chain.extend(light(100, h100_old, h99)).unwrap();
        }

        let h100_new = B256::repeat_byte(200);
        let h101_new = B256::repeat_byte(201);
        let block_100_new = full(light(100, h100_new, h99));
        svc.chain_client.push_block(block_100_new, Vec::new());
        let trigger = full(light(101, h101_new, h100_new));
        svc.chain_client.push_block(trigger.clone(), Vec::new());

        let svc = Arc::new(svc);
        svc.process_block(trigger).await.expect("shallow reorg should succeed");

        let guard = svc.local_chain.lock().await;
        let chain = guard.as_ref().unwrap();
        assert_eq!(chain.head().unwrap().number, BlockNumber::new(99));
        drop(guard);

        assert_eq!(svc.queue.size().await, 2);

        let events = svc.publisher.events.lock().await;
        assert!(events.iter().any(|e| matches!(e, SyncEvent::ShallowReorg(_))));
    }

    #[tokio::test]
    async fn deep_reorg_emits_event_and_surfaces_error() {
        let svc = service(vec![]);

        let h98 = B256::repeat_byte(98);
        *svc.local_chain.lock().await = Some(LocalChainState::seed(light(98, h98, B256::ZERO)));

        let h98_fork = B256::repeat_byte(198);
        let h99_fork = B256::repeat_byte(199);
        let h100_fork = B256::repeat_byte(200);
        svc.chain_client
            .push_block(full(light(98, h98_fork, B256::repeat_byte(97))), Vec::new());
        svc.chain_client.push_block(full(light(99, h99_fork, h98_fork)), Vec::new());

        let trigger = full(light(100, h100_fork, h99_fork));

        let svc = Arc::new(svc);
        let result = svc.process_block(trigger).await;
        assert!(matches!(result, Err(AppError::DeepReorgUnresolved { .. })));

        let events = svc.publisher.events.lock().await;
        assert!(events.iter().any(|e| matches!(e, SyncEvent::DeepReorg(_))));
    }

    #[tokio::test]
    async fn run_task_does_not_double_emit_error_for_deep_reorg() {
        let svc = service(vec![]);

        let h98 = B256::repeat_byte(98);
        *svc.local_chain.lock().await = Some(LocalChainState::seed(light(98, h98, B256::ZERO)));

        let h98_fork = B256::repeat_byte(198);
        let h99_fork = B256::repeat_byte(199);
        let h100_fork = B256::repeat_byte(200);
        svc.chain_client
            .push_block(full(light(98, h98_fork, B256::repeat_byte(97))), Vec::new());
        svc.chain_client.push_block(full(light(99, h99_fork, h98_fork)), Vec::new());

        let trigger = full(light(100, h100_fork, h99_fork));

        let svc = Arc::new(svc);
        let result = svc.run_task(trigger).await;
        assert!(result.is_err(), "a deep reorg still fails the task so it is not retried as new-head");

        let events = svc.publisher.events.lock().await;
        let deep_reorgs = events.iter().filter(|e| matches!(e, SyncEvent::DeepReorg(_))).count();
        let generic_errors = events.iter().filter(|e| matches!(e, SyncEvent::Error(_))).count();
        assert_eq!(deep_reorgs, 1, "exactly one DeepReorg event should be published");
        assert_eq!(
            generic_errors, 0,
            "a deep reorg must not also surface as a generic error event (§7)"
        );
    }

    #[tokio::test]
    async fn kill_pauses_and_clears_pending_tasks() {
        let svc = service(vec![]);
        let h100 = B256::repeat_byte(1);
        *svc.local_chain.lock().await = Some(LocalChainState::seed(light(100, h100, B256::ZERO)));

        let h101 = B256::repeat_byte(2);
        let h102 = B256::repeat_byte(3);
        svc.queue.add_task(full(light(101, h101, h100)), 10).await;
        svc.queue.add_task(full(light(102, h102, h101)), 9).await;
        assert_eq!(svc.queue.size().await, 2);

        svc.kill().await;

        assert_eq!(
            svc.queue.size().await,
            0,
            "kill() must pause and clear pending tasks (§4.4)"
        );
    }
}
