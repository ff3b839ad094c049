//! Hazard records as exchanged with the RoadEye API and kept in the cache.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Opaque server-assigned hazard identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct HazardId(String);

impl HazardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HazardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HazardId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for HazardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum HazardType {
    Pothole,
    Debris,
    Accident,
    Construction,
    Other,
}

impl HazardType {
    pub const ALL: [HazardType; 5] = [
        HazardType::Pothole,
        HazardType::Debris,
        HazardType::Accident,
        HazardType::Construction,
        HazardType::Other,
    ];

    /// Wire name, as used in query strings and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardType::Pothole => "pothole",
            HazardType::Debris => "debris",
            HazardType::Accident => "accident",
            HazardType::Construction => "construction",
            HazardType::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            HazardType::Pothole => "Pothole",
            HazardType::Debris => "Debris",
            HazardType::Accident => "Accident",
            HazardType::Construction => "Construction",
            HazardType::Other => "Other",
        }
    }
}

impl std::fmt::Display for HazardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for HazardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HazardType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown hazard type: {}", s))
    }
}

/// Hazard severity, ordered by risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// A reported road hazard.
///
/// `distance` is derived from the current observer position and never read
/// from or written to JSON; it also takes no part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct HazardRecord {
    pub id: HazardId,
    #[serde(rename = "type")]
    pub hazard_type: HazardType,
    #[serde(flatten)]
    pub location: Coordinate,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "reported_by", skip_serializing_if = "Option::is_none")]
    pub reported_by: Option<String>,
    #[serde(alias = "created_at")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub distance: Option<f64>,
    #[serde(default, alias = "image_url", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, alias = "is_verified")]
    pub verified: bool,
    #[serde(default, alias = "verify_count")]
    pub verify_count: u32,
}

impl HazardRecord {
    pub fn new(
        id: impl Into<HazardId>,
        hazard_type: HazardType,
        location: Coordinate,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            hazard_type,
            location,
            severity,
            description: None,
            reported_by: None,
            timestamp,
            distance: None,
            image_url: None,
            verified: false,
            verify_count: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Copy of this record with `distance` measured from `observer`.
    pub fn with_distance_from(mut self, observer: &Coordinate) -> Self {
        self.distance = Some(observer.distance_to(&self.location));
        self
    }

    pub fn clear_distance(&mut self) {
        self.distance = None;
    }

    /// Short one-line summary for lists.
    pub fn summary(&self) -> String {
        match &self.description {
            Some(desc) if !desc.is_empty() => {
                format!("{} ({}): {}", self.hazard_type, self.severity, desc)
            }
            _ => format!("{} ({})", self.hazard_type, self.severity),
        }
    }
}

impl PartialEq for HazardRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.hazard_type == other.hazard_type
            && self.location == other.location
            && self.severity == other.severity
            && self.description == other.description
            && self.reported_by == other.reported_by
            && self.timestamp == other.timestamp
            && self.image_url == other.image_url
            && self.verified == other.verified
            && self.verify_count == other.verify_count
    }
}

/// A hazard the user wants to report, before the server assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHazard {
    pub hazard_type: HazardType,
    pub location: Coordinate,
    pub severity: Severity,
    pub description: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl NewHazard {
    pub fn new(hazard_type: HazardType, location: Coordinate, severity: Severity) -> Self {
        Self {
            hazard_type,
            location,
            severity,
            description: None,
            image: None,
        }
    }

    /// Build a report from a detection candidate and the captured image.
    pub fn from_candidate(candidate: &HazardCandidate, image: Option<Vec<u8>>) -> Self {
        Self {
            hazard_type: candidate.hazard_type,
            location: candidate.location,
            severity: candidate.severity,
            description: Some(format!("Auto-detected: {}", candidate.hazard_type.as_str())),
            image,
        }
    }

    pub fn to_request(&self) -> ReportRequest {
        ReportRequest {
            hazard_type: self.hazard_type,
            location: self.location,
            severity: self.severity,
            description: self.description.clone(),
            image_base64: self.image.as_deref().map(|bytes| BASE64.encode(bytes)),
        }
    }
}

/// Body of `POST /hazards/report`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(rename = "type")]
    pub hazard_type: HazardType,
    #[serde(flatten)]
    pub location: Coordinate,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

/// Body of `POST /hazards/detect`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    pub image_base64: String,
    #[serde(flatten)]
    pub location: Coordinate,
}

impl DetectionRequest {
    pub fn new(image: &[u8], location: Coordinate) -> Self {
        Self {
            image_base64: BASE64.encode(image),
            location,
        }
    }
}

/// A hazard proposed by the detection service, not yet reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct HazardCandidate {
    #[serde(rename = "type")]
    pub hazard_type: HazardType,
    #[serde(flatten)]
    pub location: Coordinate,
    pub severity: Severity,
}

/// Result of running detection on a captured image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Detection {
    pub detected: bool,
    #[serde(default)]
    pub hazard: Option<HazardCandidate>,
    #[serde(default)]
    pub confidence: Option<f64>,
}
