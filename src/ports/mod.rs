//! Port definitions for dependency injection and testability.
//!
//! Ports are trait definitions that describe what the domain layer needs.
//! Following hexagonal architecture, adapters (in the infrastructure layer)
//! implement these traits to provide concrete functionality. The Event
//! Store port ([`crate::store::EventStore`]) and the chain-client port
//! ([`crate::rpc::ChainClient`]) live in their own modules since they are
//! each paired with a substantial adapter; this module holds the smaller,
//! cross-cutting ports.
//!
//! # Port Categories
//!
//! | Category | Ports | Purpose |
//! |----------|-------|---------|
//! | Eventing | [`EventPublisher`] | Typed sync-event publication (§9) |

mod publisher;

pub use publisher::{BroadcastPublisher, EventPublisher};

#[cfg(any(test, feature = "test-utils"))]
pub use publisher::mocks;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ports_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        fn check_event_publisher<T: EventPublisher>() {
            assert_send_sync::<T>();
        }

        check_event_publisher::<BroadcastPublisher>();
    }
}
