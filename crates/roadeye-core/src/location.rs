//! Observer position sources.

use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::geo::Coordinate;

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the observer's current position on demand.
///
/// The position may lag by the polling interval of the underlying provider.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current(&self) -> Result<Coordinate, LocationError>;
}

/// A position set by the caller, e.g. from command-line arguments or a
/// platform location callback.
#[derive(Debug, Default)]
pub struct FixedLocation {
    position: RwLock<Option<Coordinate>>,
}

impl FixedLocation {
    pub fn new(position: Coordinate) -> Self {
        Self {
            position: RwLock::new(Some(position)),
        }
    }

    /// No position yet.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn update(&self, position: Coordinate) {
        *self.position.write().unwrap_or_else(|e| e.into_inner()) = Some(position);
    }

    pub fn get(&self) -> Option<Coordinate> {
        *self.position.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LocationSource for FixedLocation {
    async fn current(&self) -> Result<Coordinate, LocationError> {
        self.get()
            .ok_or_else(|| LocationError::Unavailable("no position fix yet".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_location() {
        let location = FixedLocation::unknown();
        assert!(location.current().await.is_err());

        location.update(Coordinate::new(1.0, 2.0));
        assert_eq!(location.current().await.unwrap(), Coordinate::new(1.0, 2.0));
    }
}
