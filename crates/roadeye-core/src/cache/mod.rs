//! Local persistence for offline hazard access.
//!
//! The hazard set is saved as a single JSON snapshot under
//! [`CACHE_KEY`] in a [`KeyValueStorage`] backend. Backends are plain string
//! stores; expiry is decided by the proximity store, not here.

pub mod snapshot;
pub mod storage;

pub use snapshot::{age_display, CacheSnapshot, SnapshotError, CACHE_KEY};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
