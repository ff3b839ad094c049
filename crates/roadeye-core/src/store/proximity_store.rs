use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{age_display, CacheSnapshot, KeyValueStorage, CACHE_KEY};
use crate::geo::Coordinate;
use crate::models::{HazardId, HazardRecord, HazardSet};
use crate::proximity;

use super::clock::{Clock, SystemClock};

/// Hazard data older than this triggers a refetch.
pub const DEFAULT_CACHE_TTL_SECS: i64 = 5 * 60;

/// How concurrent full fetches are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Whichever response is applied last wins, even if it was issued first.
    #[default]
    LastCompletionWins,
    /// Responses issued before the currently applied one are dropped.
    DiscardSuperseded,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub cache_ttl: Duration,
    pub stale_policy: StalePolicy,
    pub cache_key: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::seconds(DEFAULT_CACHE_TTL_SECS),
            stale_policy: StalePolicy::default(),
            cache_key: CACHE_KEY.to_string(),
        }
    }
}

/// Issue order of a full fetch, handed out by [`ProximityCacheStore::begin_fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A response from a later-issued fetch was already applied.
    Superseded { applied: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Adopted {
        count: usize,
        captured_at: DateTime<Utc>,
    },
    Expired {
        captured_at: DateTime<Utc>,
    },
    Missing,
    /// Storage failed or held malformed data; treated as a cold start.
    Unreadable,
}

#[derive(Default)]
struct StoreState {
    hazards: HazardSet,
    nearby: HazardSet,
    last_fetch_at: Option<DateTime<Utc>>,
    applied_seq: u64,
}

/// Holds an activity flag raised; overlapping holders are counted.
#[must_use = "the flag drops as soon as the guard does"]
pub struct ActivityGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> ActivityGuard<'a> {
    fn new(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The client's single view of known hazards.
///
/// Holds the full cache-eligible set and the ephemeral distance-sorted nearby
/// view. Every mutation happens under one write lock and never awaits, so a
/// reader sees either the old or the new collection, never a mix. Share it
/// with `Arc`; reset it with [`clear`](Self::clear) at session end.
pub struct ProximityCacheStore {
    state: RwLock<StoreState>,
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
    options: StoreOptions,
    next_seq: AtomicU64,
    loading: AtomicUsize,
    detecting: AtomicUsize,
}

impl ProximityCacheStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, options: StoreOptions) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock), options)
    }

    pub fn with_clock(
        storage: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
        options: StoreOptions,
    ) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            storage,
            clock,
            options,
            next_seq: AtomicU64::new(0),
            loading: AtomicUsize::new(0),
            detecting: AtomicUsize::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn cache_ttl(&self) -> Duration {
        self.options.cache_ttl
    }

    // ===== Reads =====

    /// Snapshot of the full hazard set in fetch order.
    pub fn hazards(&self) -> Vec<HazardRecord> {
        self.read().hazards.to_vec()
    }

    /// Snapshot of the nearby view, nearest first.
    pub fn nearby_hazards(&self) -> Vec<HazardRecord> {
        self.read().nearby.to_vec()
    }

    pub fn hazard(&self, id: &HazardId) -> Option<HazardRecord> {
        let state = self.read();
        state
            .hazards
            .get(id)
            .or_else(|| state.nearby.get(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read().hazards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().hazards.is_empty()
    }

    pub fn last_fetch_at(&self) -> Option<DateTime<Utc>> {
        self.read().last_fetch_at
    }

    /// "5m ago" style label for the last full fetch, or "never".
    pub fn cache_age_display(&self) -> String {
        match self.last_fetch_at() {
            Some(at) => age_display((self.clock.now() - at).num_minutes()),
            None => "never".to_string(),
        }
    }

    // ===== Mutations =====

    /// Replace the full set and stamp the fetch time.
    pub fn replace_all(&self, hazards: Vec<HazardRecord>) {
        let set = HazardSet::from_records(hazards);
        let now = self.clock.now();
        let mut state = self.write();
        debug!(count = set.len(), "Replacing hazard set");
        state.hazards = set;
        state.last_fetch_at = Some(now);
    }

    /// Replace the nearby view only. Callers pass records already sorted.
    pub fn replace_nearby(&self, hazards: Vec<HazardRecord>) {
        let set = HazardSet::from_records(hazards);
        self.write().nearby = set;
    }

    /// Insert a just-reported hazard at the front of both collections.
    ///
    /// The record must carry its server id. A later full replace containing
    /// the same id supersedes this copy.
    pub fn add_local(&self, hazard: HazardRecord) {
        let mut state = self.write();
        debug!(id = %hazard.id, "Adding local hazard");
        state.nearby.push_front(hazard.clone());
        state.hazards.push_front(hazard);
    }

    /// Drop a hazard from both collections. Returns true if it was present.
    pub fn remove(&self, id: &HazardId) -> bool {
        let mut state = self.write();
        let in_all = state.hazards.remove(id).is_some();
        let in_nearby = state.nearby.remove(id).is_some();
        in_all || in_nearby
    }

    /// Record a successful community verification.
    pub fn mark_verified(&self, id: &HazardId) -> bool {
        let mut guard = self.write();
        let state = &mut *guard;
        let mut found = false;
        for set in [&mut state.hazards, &mut state.nearby] {
            if let Some(hazard) = set.get_mut(id) {
                hazard.verified = true;
                hazard.verify_count += 1;
                found = true;
            }
        }
        found
    }

    /// Recompute distances after the observer moved, re-sorting the nearby view.
    pub fn recompute_distances(&self, observer: &Coordinate) {
        let mut state = self.write();
        let hazards = proximity::attach_distances(state.hazards.to_vec(), observer);
        let nearby = proximity::nearest_first(state.nearby.to_vec(), observer);
        state.hazards = HazardSet::from_records(hazards);
        state.nearby = HazardSet::from_records(nearby);
    }

    /// Empty both collections and forget the fetch time. Persisted data is kept.
    pub fn clear(&self) {
        let mut state = self.write();
        state.hazards.clear();
        state.nearby.clear();
        state.last_fetch_at = None;
        // Responses to fetches issued before the reset never apply under
        // DiscardSuperseded.
        state.applied_seq = self.next_seq.load(Ordering::SeqCst) + 1;
        info!("Hazard store cleared");
    }

    /// [`clear`](Self::clear) plus removal of the persisted snapshot.
    pub async fn purge(&self) {
        self.clear();
        if let Err(e) = self.storage.remove(&self.options.cache_key).await {
            warn!(error = %e, "Failed to remove persisted hazard cache");
        }
    }

    // ===== TTL & fetch sequencing =====

    /// True when nothing was fetched yet or the last fetch is older than the TTL.
    pub fn should_refetch(&self) -> bool {
        match self.last_fetch_at() {
            None => true,
            Some(at) => self.clock.now() - at > self.options.cache_ttl,
        }
    }

    /// Tag a full fetch before it is issued.
    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket(self.next_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Apply a full fetch result according to the store's [`StalePolicy`].
    pub fn apply_fetch(&self, ticket: FetchTicket, hazards: Vec<HazardRecord>) -> ApplyOutcome {
        let set = HazardSet::from_records(hazards);
        let now = self.clock.now();
        let mut state = self.write();

        if self.options.stale_policy == StalePolicy::DiscardSuperseded
            && ticket.0 < state.applied_seq
        {
            debug!(
                ticket = ticket.0,
                applied = state.applied_seq,
                "Discarding superseded fetch result"
            );
            return ApplyOutcome::Superseded {
                applied: state.applied_seq,
            };
        }

        state.hazards = set;
        state.last_fetch_at = Some(now);
        state.applied_seq = state.applied_seq.max(ticket.0);
        ApplyOutcome::Applied
    }

    // ===== Persistence =====

    /// Seed the full set from storage if the snapshot is within the TTL.
    ///
    /// Never fails: unreadable or malformed data counts as a cold start, and
    /// an expired snapshot leaves the current state untouched.
    pub async fn load_persisted(&self) -> LoadOutcome {
        let contents = match self.storage.get(&self.options.cache_key).await {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                debug!("No persisted hazard cache");
                return LoadOutcome::Missing;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted hazard cache");
                return LoadOutcome::Unreadable;
            }
        };

        let snapshot = match CacheSnapshot::decode(&contents) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Ignoring persisted hazard cache");
                return LoadOutcome::Unreadable;
            }
        };

        let captured_at = snapshot.captured_at;
        if !snapshot.is_within(self.options.cache_ttl, self.clock.now()) {
            debug!(%captured_at, "Persisted hazard cache expired");
            return LoadOutcome::Expired { captured_at };
        }

        let count = snapshot.hazards.len();
        let set = HazardSet::from_records(snapshot.hazards);
        {
            let mut state = self.write();
            state.hazards = set;
            state.last_fetch_at = Some(captured_at);
        }
        info!(count, %captured_at, "Loaded persisted hazard cache");
        LoadOutcome::Adopted { count, captured_at }
    }

    /// Write a snapshot of `hazards`; failures are logged and otherwise ignored.
    pub async fn persist(&self, hazards: &[HazardRecord]) {
        if let Err(e) = self.try_persist(hazards).await {
            warn!(error = %e, "Failed to persist hazard cache");
        }
    }

    /// Like [`persist`](Self::persist) but reports the failure.
    pub async fn try_persist(&self, hazards: &[HazardRecord]) -> anyhow::Result<()> {
        let mut records = hazards.to_vec();
        records.iter_mut().for_each(HazardRecord::clear_distance);
        let snapshot = CacheSnapshot::new(records, self.clock.now());
        let encoded = snapshot.encode()?;
        self.storage.set(&self.options.cache_key, &encoded).await?;
        debug!(count = hazards.len(), "Persisted hazard cache");
        Ok(())
    }

    // ===== Activity flags =====

    /// Mark a fetch in flight until the returned guard is dropped.
    pub fn begin_loading(&self) -> ActivityGuard<'_> {
        ActivityGuard::new(&self.loading)
    }

    /// True while any fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    /// Mark a detection in flight until the returned guard is dropped.
    pub fn begin_detecting(&self) -> ActivityGuard<'_> {
        ActivityGuard::new(&self.detecting)
    }

    pub fn is_detecting(&self) -> bool {
        self.detecting.load(Ordering::SeqCst) > 0
    }
}

// ============================================================================
// Tests
// ============================================================================
