//! In-memory hazard state with TTL-based refetch decisions.
//!
//! [`ProximityCacheStore`] reconciles full fetches, the nearby view,
//! optimistic local inserts and the persisted snapshot.

pub mod clock;
pub mod proximity_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use proximity_store::{
    ActivityGuard, ApplyOutcome, FetchTicket, LoadOutcome, ProximityCacheStore, StalePolicy, StoreOptions,
    DEFAULT_CACHE_TTL_SECS,
};
