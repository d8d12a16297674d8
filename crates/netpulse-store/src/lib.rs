//! Canonical dashboard state for netpulse.
//!
//! - `DashboardState`: named slices plus connection and bookkeeping fields
//! - `StateStore`: wholesale slice updates, realtime merges, ordered
//!   synchronous subscriber notification
//! - `reducer`: the per-event merge rules applied to `summary`/`topProblems`
//! - `SnapshotCache`: persisted copy of the cacheable slices, hydrated at
//!   startup when younger than the max age (7 days)
//! - `SnapshotWriter`: write-through or coalesced write-behind persistence

pub mod cache;
pub mod error;
pub mod reducer;
pub mod state;
pub mod store;
pub mod writer;

pub use cache::{
    CacheSnapshot, CacheStorage, FileStorage, MemoryStorage, SnapshotCache, CACHE_KEY,
    DEFAULT_CACHE_MAX_AGE_HOURS,
};
pub use error::{CacheError, CacheResult, StoreError, StoreResult};
pub use state::{DashboardState, RealtimeEventRecord, REALTIME_EVENT_CAPACITY, RECENT_ALERTS_CAPACITY};
pub use store::{StateStore, SubscriptionId};
pub use writer::SnapshotWriter;
