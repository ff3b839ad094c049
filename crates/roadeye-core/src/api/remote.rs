use async_trait::async_trait;

use crate::geo::Coordinate;
use crate::models::{Detection, HazardId, HazardRecord, NewHazard};

use super::ApiError;

/// Remote hazard service as seen by the sync layer.
///
/// Implementations enforce their own request timeout and never retry;
/// retry policy belongs to whoever drives the sync.
#[async_trait]
pub trait HazardApi: Send + Sync {
    /// Hazards within `radius_km` of `observer`. Returned records carry no distance.
    async fn fetch_nearby(
        &self,
        observer: Coordinate,
        radius_km: f64,
    ) -> Result<Vec<HazardRecord>, ApiError>;

    /// Report a hazard; the returned record carries the final server id.
    async fn report(&self, hazard: NewHazard) -> Result<HazardRecord, ApiError>;

    /// Run hazard detection on a captured image.
    async fn detect(&self, image: &[u8], location: Coordinate) -> Result<Detection, ApiError>;

    async fn get_hazard(&self, id: &HazardId) -> Result<HazardRecord, ApiError>;

    async fn verify_hazard(&self, id: &HazardId) -> Result<(), ApiError>;

    async fn delete_hazard(&self, id: &HazardId) -> Result<(), ApiError>;
}
