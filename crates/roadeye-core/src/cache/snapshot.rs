use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::HazardRecord;

/// Storage key holding the persisted hazard snapshot.
pub const CACHE_KEY: &str = "cachedHazards";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Malformed cache data: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Failed to encode cache data: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Whole-set hazard snapshot as written to storage.
///
/// Serialized as `{ "hazards": [...], "timestamp": <epoch millis> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub hazards: Vec<HazardRecord>,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
}

impl CacheSnapshot {
    pub fn new(hazards: Vec<HazardRecord>, captured_at: DateTime<Utc>) -> Self {
        Self {
            hazards,
            captured_at,
        }
    }

    pub fn encode(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(SnapshotError::Encode)
    }

    pub fn decode(contents: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(contents).map_err(SnapshotError::Malformed)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.captured_at
    }

    /// True while the snapshot is younger than `ttl`.
    pub fn is_within(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) < ttl
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        age_display(self.age(now).num_minutes())
    }
}

/// Compact age label: "just now", "5m ago", "2h ago", "3d ago".
pub fn age_display(minutes: i64) -> String {
    if minutes < 1 {
        // Negative ages come from clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let remaining_mins = minutes % 60;
        if remaining_mins >= 30 {
            // Round up: 1h 30m+ becomes 2h
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        let remaining_hours = (minutes % 1440) / 60;
        if remaining_hours >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::models::{HazardType, Severity};
    use chrono::TimeZone;

    fn captured() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn snapshot() -> CacheSnapshot {
        let hazard = HazardRecord::new(
            "h-1",
            HazardType::Construction,
            Coordinate::new(51.5, -0.12),
            Severity::Medium,
            captured(),
        );
        CacheSnapshot::new(vec![hazard], captured())
    }

    #[test]
    fn test_persisted_layout() {
        let encoded = snapshot().encode().expect("encode");
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["timestamp"], captured().timestamp_millis());
        assert_eq!(value["hazards"][0]["id"], "h-1");
        assert_eq!(value["hazards"][0]["type"], "construction");
    }

    #[test]
    fn test_decode_matches_encoded() {
        let original = snapshot();
        let decoded = CacheSnapshot::decode(&original.encode().unwrap()).expect("decode");
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            CacheSnapshot::decode("not json"),
            Err(SnapshotError::Malformed(_))
        ));
        assert!(CacheSnapshot::decode(r#"{"hazards": 3, "timestamp": 1}"#).is_err());
        assert!(CacheSnapshot::decode(r#"{"hazards": []}"#).is_err());
    }

    #[test]
    fn test_is_within() {
        let snap = snapshot();
        let ttl = Duration::minutes(5);
        assert!(snap.is_within(ttl, captured() + Duration::minutes(4)));
        assert!(!snap.is_within(ttl, captured() + Duration::minutes(5)));
        assert!(!snap.is_within(ttl, captured() + Duration::hours(1)));
    }

    #[test]
    fn test_age_display() {
        let snap = snapshot();
        assert_eq!(snap.age_display(captured()), "just now");
        assert_eq!(snap.age_display(captured() - Duration::minutes(3)), "just now");
        assert_eq!(snap.age_display(captured() + Duration::minutes(5)), "5m ago");
        assert_eq!(snap.age_display(captured() + Duration::minutes(95)), "2h ago");
        assert_eq!(snap.age_display(captured() + Duration::hours(26)), "1d ago");
        assert_eq!(snap.age_display(captured() + Duration::hours(40)), "2d ago");
    }

    #[test]
    fn test_age_display_rounding() {
        assert_eq!(age_display(59), "59m ago");
        assert_eq!(age_display(60), "1h ago");
        assert_eq!(age_display(89), "1h ago");
        assert_eq!(age_display(90), "2h ago");
        assert_eq!(age_display(1439), "24h ago");
        assert_eq!(age_display(1440), "1d ago");
        assert_eq!(age_display(1440 + 11 * 60 + 59), "1d ago");
        assert_eq!(age_display(1440 + 12 * 60), "2d ago");
    }
}
