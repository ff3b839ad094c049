//! Data models for road hazards.
//!
//! - `HazardRecord`: a reported hazard with its derived distance
//! - `HazardType`, `Severity`: closed classifications
//! - `HazardSet`: id-keyed, insertion-ordered collection used by the store
//! - Request/response bodies for the report and detect endpoints

pub mod hazard;
pub mod hazard_set;

pub use hazard::{
    Detection, DetectionRequest, HazardCandidate, HazardId, HazardRecord, HazardType, NewHazard,
    ReportRequest, Severity,
};
pub use hazard_set::HazardSet;
