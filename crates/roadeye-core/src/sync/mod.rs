//! Fetch/refresh orchestration between the hazard service and the store.

pub mod controller;

pub use controller::{
    DetectOutcome, RefreshOutcome, SyncController, SyncError, SyncEvent, SyncOptions,
    DEFAULT_ALERTS_RADIUS_KM, DEFAULT_MAP_RADIUS_KM, DEFAULT_REFRESH_INTERVAL_SECS,
};
