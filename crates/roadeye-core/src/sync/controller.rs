use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, HazardApi};
use crate::location::{LocationError, LocationSource};
use crate::models::{Detection, HazardId, HazardRecord, NewHazard};
use crate::proximity;
use crate::store::{ApplyOutcome, LoadOutcome, ProximityCacheStore};

// ============================================================================
// Constants
// ============================================================================

/// Radius of the map view's full fetch.
pub const DEFAULT_MAP_RADIUS_KM: f64 = 5.0;

/// Radius of the alerts (nearby) fetch.
pub const DEFAULT_ALERTS_RADIUS_KM: f64 = 10.0;

/// Interval between background refreshes.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Hazard service request failed: {0}")]
    Api(#[from] ApiError),

    #[error("Observer location unavailable: {0}")]
    Location(#[from] LocationError),
}

impl SyncError {
    /// True when the failure came from the network rather than the server.
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Api(e) if e.is_network())
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub map_radius_km: f64,
    pub alerts_radius_km: f64,
    pub refresh_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            map_radius_km: DEFAULT_MAP_RADIUS_KM,
            alerts_radius_km: DEFAULT_ALERTS_RADIUS_KM,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cache was within its TTL; no request was made.
    CacheFresh,
    Applied { count: usize },
    /// A later-issued fetch had already been applied.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectOutcome {
    NothingDetected(Detection),
    Reported(HazardRecord),
}

/// Progress messages from [`SyncController::run_periodic`].
#[derive(Debug)]
pub enum SyncEvent {
    MapRefreshed(RefreshOutcome),
    AlertsRefreshed { count: usize },
    Error(String),
}

/// Drives fetch → distance → store for both hazard views.
///
/// Manual and periodic refreshes share one pipeline; concurrent calls are
/// reconciled by the store's stale policy, not by locking here.
pub struct SyncController {
    api: Arc<dyn HazardApi>,
    store: Arc<ProximityCacheStore>,
    location: Arc<dyn LocationSource>,
    options: SyncOptions,
}

impl SyncController {
    pub fn new(
        api: Arc<dyn HazardApi>,
        store: Arc<ProximityCacheStore>,
        location: Arc<dyn LocationSource>,
        options: SyncOptions,
    ) -> Self {
        Self {
            api,
            store,
            location,
            options,
        }
    }

    pub fn store(&self) -> &Arc<ProximityCacheStore> {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Seed the store from the persisted snapshot at session start.
    ///
    /// Snapshots carry no distances, so adopted hazards are measured from the
    /// current position when one is known.
    pub async fn start(&self) -> LoadOutcome {
        let outcome = self.store.load_persisted().await;
        if let LoadOutcome::Adopted { .. } = outcome {
            if let Err(e) = self.observer_moved().await {
                debug!(error = %e, "No position for cached hazard distances");
            }
        }
        outcome
    }

    /// Refresh the full hazard set.
    ///
    /// Without `force` the request is skipped while the cache is within its
    /// TTL. On failure the store keeps its previous contents.
    pub async fn refresh_map(&self, force: bool) -> Result<RefreshOutcome, SyncError> {
        if !force && !self.store.should_refetch() {
            debug!("Hazard cache still fresh, skipping fetch");
            return Ok(RefreshOutcome::CacheFresh);
        }

        let observer = self.location.current().await?;
        let ticket = self.store.begin_fetch();

        let loading = self.store.begin_loading();
        let result = self
            .api
            .fetch_nearby(observer, self.options.map_radius_km)
            .await;
        drop(loading);

        let hazards = result.map_err(|e| {
            warn!(error = %e, "Failed to fetch hazards");
            e
        })?;

        let hazards = proximity::attach_distances(hazards, &observer);
        match self.store.apply_fetch(ticket, hazards) {
            ApplyOutcome::Applied => {
                let current = self.store.hazards();
                self.store.persist(&current).await;
                info!(count = current.len(), "Hazard map refreshed");
                Ok(RefreshOutcome::Applied {
                    count: current.len(),
                })
            }
            ApplyOutcome::Superseded { .. } => Ok(RefreshOutcome::Superseded),
        }
    }

    /// Refresh the distance-sorted nearby view. Never consults the TTL.
    pub async fn refresh_alerts(&self) -> Result<usize, SyncError> {
        let observer = self.location.current().await?;

        let loading = self.store.begin_loading();
        let result = self
            .api
            .fetch_nearby(observer, self.options.alerts_radius_km)
            .await;
        drop(loading);

        let hazards = result.map_err(|e| {
            warn!(error = %e, "Failed to fetch nearby alerts");
            e
        })?;

        let nearby = proximity::nearest_first(hazards, &observer);
        let count = nearby.len();
        self.store.replace_nearby(nearby);
        debug!(count, "Nearby alerts refreshed");
        Ok(count)
    }

    /// Refresh both views concurrently.
    pub async fn refresh_all(
        &self,
        force: bool,
    ) -> (Result<RefreshOutcome, SyncError>, Result<usize, SyncError>) {
        futures::join!(self.refresh_map(force), self.refresh_alerts())
    }

    /// Recompute distances after the observer moved.
    pub async fn observer_moved(&self) -> Result<(), SyncError> {
        let observer = self.location.current().await?;
        self.store.recompute_distances(&observer);
        Ok(())
    }

    /// Run detection on a captured image at the current position.
    pub async fn detect(&self, image: &[u8]) -> Result<Detection, SyncError> {
        let observer = self.location.current().await?;
        let detecting = self.store.begin_detecting();
        let result = self.api.detect(image, observer).await;
        drop(detecting);
        Ok(result?)
    }

    /// Report a hazard and insert the confirmed record into the store.
    pub async fn report(&self, hazard: NewHazard) -> Result<HazardRecord, SyncError> {
        let reported = self.api.report(hazard).await?;
        let reported = match self.location.current().await {
            Ok(observer) => reported.with_distance_from(&observer),
            Err(e) => {
                debug!(error = %e, "No position for reported hazard distance");
                reported
            }
        };
        self.store.add_local(reported.clone());
        info!(id = %reported.id, "Hazard reported");
        Ok(reported)
    }

    /// Detect, and if a hazard was found, report it with the image attached.
    pub async fn detect_and_report(&self, image: Vec<u8>) -> Result<DetectOutcome, SyncError> {
        let detection = self.detect(&image).await?;
        let candidate = match (&detection.detected, &detection.hazard) {
            (true, Some(candidate)) => candidate.clone(),
            _ => return Ok(DetectOutcome::NothingDetected(detection)),
        };
        let reported = self
            .report(NewHazard::from_candidate(&candidate, Some(image)))
            .await?;
        Ok(DetectOutcome::Reported(reported))
    }

    /// Fetch one hazard from the service, with distance when a position is known.
    pub async fn lookup(&self, id: &HazardId) -> Result<HazardRecord, SyncError> {
        let hazard = self.api.get_hazard(id).await?;
        Ok(match self.location.current().await {
            Ok(observer) => hazard.with_distance_from(&observer),
            Err(_) => hazard,
        })
    }

    pub async fn verify(&self, id: &HazardId) -> Result<(), SyncError> {
        self.api.verify_hazard(id).await?;
        self.store.mark_verified(id);
        Ok(())
    }

    pub async fn delete(&self, id: &HazardId) -> Result<(), SyncError> {
        self.api.delete_hazard(id).await?;
        self.store.remove(id);
        Ok(())
    }

    /// Helper to send sync events, logging any channel errors
    async fn send_event(tx: &mpsc::Sender<SyncEvent>, event: SyncEvent) {
        if let Err(e) = tx.send(event).await {
            error!(error = %e, "Failed to send sync event - channel closed");
        }
    }

    /// Refresh on a fixed interval until `shutdown` flips to true or closes.
    ///
    /// Each tick refreshes the nearby view and, once the TTL has lapsed, the
    /// full set. Failures are reported as events and the loop keeps going.
    pub async fn run_periodic(
        &self,
        tx: mpsc::Sender<SyncEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.options.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?self.options.refresh_interval, "Periodic hazard refresh started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (map, alerts) = self.refresh_all(false).await;
                    match map {
                        Ok(outcome) => Self::send_event(&tx, SyncEvent::MapRefreshed(outcome)).await,
                        Err(e) => Self::send_event(&tx, SyncEvent::Error(e.to_string())).await,
                    }
                    match alerts {
                        Ok(count) => Self::send_event(&tx, SyncEvent::AlertsRefreshed { count }).await,
                        Err(e) => Self::send_event(&tx, SyncEvent::Error(e.to_string())).await,
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Periodic hazard refresh stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================
