//! Distance attachment for fetched hazards.
//!
//! Every fetch result gets `distance` computed against the observer before it
//! reaches the store. The nearby view is additionally sorted nearest first.

use std::cmp::Ordering;

use crate::geo::Coordinate;
use crate::models::HazardRecord;

/// Recompute `distance` on every record relative to `observer`.
pub fn attach_distances(records: Vec<HazardRecord>, observer: &Coordinate) -> Vec<HazardRecord> {
    records
        .into_iter()
        .map(|record| record.with_distance_from(observer))
        .collect()
}

/// Stable ascending sort by distance; records without a distance go last.
pub fn sort_by_distance(records: &mut [HazardRecord]) {
    records.sort_by(|a, b| match (a.distance, b.distance) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Attach distances and sort nearest first, preserving fetch order on ties.
pub fn nearest_first(records: Vec<HazardRecord>, observer: &Coordinate) -> Vec<HazardRecord> {
    let mut records = attach_distances(records, observer);
    sort_by_distance(&mut records);
    records
}
