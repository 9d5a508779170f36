//! Event publishing port (§9 "Event emitter → typed publisher").
//!
//! The realtime sync service is in-process; there is no message broker to
//! publish to (see `SPEC_FULL.md` §A.6). This port instead exposes the
//! single tagged-variant channel §9 calls for, so subscribers dispatch on
//! `SyncEvent`'s variant rather than on a topic string.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::events::SyncEvent;

/// Port for publishing sync events to subscribers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event.
    ///
    /// # Errors
    ///
    /// Returns an error if every subscriber has gone away and the
    /// implementation treats that as fatal; implementations built on
    /// `tokio::sync::broadcast` typically do not (a lagging/absent receiver
    /// is not this publisher's problem).
    async fn publish(&self, event: SyncEvent) -> Result<()>;

    /// Number of currently live subscribers, if the implementation tracks
    /// one (used in tests and diagnostics).
    fn subscriber_count(&self) -> usize;
}

/// Broadcast-channel-backed publisher: every subscriber sees every event.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: tokio::sync::broadcast::Sender<SyncEvent>,
}

impl BroadcastPublisher {
    /// Create a publisher with the given channel capacity (events buffered
    /// per lagging subscriber before they start missing events).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to the event stream.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: SyncEvent) -> Result<()> {
        // `send` only errors when there are zero receivers; that is not a
        // failure condition for a fire-and-forget domain event.
        let _ = self.sender.send(event);
        Ok(())
    }

    fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks {
    //! Mock implementations for testing.

    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    use super::{EventPublisher, Result, SyncEvent, async_trait};

    /// Mock publisher that records every event published and can simulate
    /// failure.
    #[derive(Debug, Clone)]
    pub struct MockEventPublisher {
        /// Events published so far, in order.
        pub events: Arc<Mutex<Vec<SyncEvent>>>,
        /// Count of `publish` calls (kept separate from `events` so it
        /// remains observable even under `should_fail`).
        pub publish_count: Arc<AtomicUsize>,
        /// Whether to fail on publish.
        pub should_fail: Arc<AtomicBool>,
    }

    impl Default for MockEventPublisher {
        fn default() -> Self {
            Self {
                events: Arc::new(Mutex::new(Vec::new())),
                publish_count: Arc::new(AtomicUsize::new(0)),
                should_fail: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl MockEventPublisher {
        /// Create a new mock publisher.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of `publish` calls observed.
        #[must_use]
        pub fn count(&self) -> usize {
            self.publish_count.load(Ordering::SeqCst)
        }

        /// Set whether to fail on publish.
        pub fn set_should_fail(&self, should_fail: bool) {
            self.should_fail.store(should_fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl EventPublisher for MockEventPublisher {
        async fn publish(&self, event: SyncEvent) -> Result<()> {
            if self.should_fail.load(Ordering::SeqCst) {
                return Err(crate::error::AppError::Initialization(
                    "mock publish failure".into(),
                ));
            }
            self.publish_count.fetch_add(1, Ordering::SeqCst);
            self.events.lock().await.push(event);
            Ok(())
        }

        fn subscriber_count(&self) -> usize {
            0
        }
    }
}
