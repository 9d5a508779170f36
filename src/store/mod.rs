//! Persistence layer: the [`ports::EventStore`] port plus its adapters.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          EventStore (port)                       │
//! │   insert_realtime_block · insert_log_filter_cached_ranges         │
//! │   delete_realtime_data · get_cached_intervals · get_logs · ...    │
//! └─────────────────────────────────────────────────────────────────┘
//!               │                                   │
//!               ▼                                   ▼
//!   ┌─────────────────────────┐       ┌─────────────────────────────┐
//! │       PgEventStore         │       │     InMemoryEventStore        │
//! │   (SQLx / PostgreSQL)      │       │   (tests, standalone mode)    │
//! └─────────────────────────┘       └─────────────────────────────┘
//!               │                                   │
//!               └───────────────┬───────────────────┘
//!                               ▼
//!                     interval_merge::merge
//!                  (shared §4.1 merge algorithm)
//! ```
//!
//! # Migrations
//!
//! Run `sqlx::migrate!("./migrations").run(&pool).await?` against the
//! schema in `migrations/` before constructing a [`PgEventStore`].

mod interval_merge;
pub mod memory;
pub mod ports;
mod postgres;

pub use memory::InMemoryEventStore;
pub use ports::{CachedRangeWrite, EventStore, LogQuery};
pub use postgres::PgEventStore;

// Re-export for convenience at the call sites that build a pool.
pub use sqlx::postgres::PgPool;
