//! RoadEye core - hazard proximity cache and sync layer.
//!
//! Keeps the client's view of reported road hazards: the full set for the
//! map, a distance-sorted nearby view for alerts, and a TTL-bounded snapshot
//! on disk so a cold start can show hazards before the network answers.
//!
//! The usual wiring is an [`ApiClient`] and a [`FileStorage`] behind a
//! [`ProximityCacheStore`], driven by a [`SyncController`].

pub mod api;
pub mod cache;
pub mod config;
pub mod geo;
pub mod location;
pub mod models;
pub mod proximity;
pub mod store;
pub mod sync;
pub mod utils;

pub use api::{ApiClient, ApiError, HazardApi};
pub use cache::{FileStorage, KeyValueStorage, MemoryStorage};
pub use config::Config;
pub use geo::{distance_meters, Coordinate};
pub use location::{FixedLocation, LocationSource};
pub use models::{HazardId, HazardRecord, HazardType, NewHazard, Severity};
pub use store::{ProximityCacheStore, StalePolicy, StoreOptions};
pub use sync::{SyncController, SyncError};
