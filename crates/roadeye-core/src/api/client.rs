//! API client for the RoadEye hazard REST API.
//!
//! This module provides the `ApiClient` struct for fetching nearby hazards,
//! reporting new ones and running image detection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::geo::Coordinate;
use crate::models::{Detection, DetectionRequest, HazardId, HazardRecord, NewHazard};

use super::{ApiError, HazardApi};

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when no configuration overrides it.
pub const DEFAULT_API_BASE_URL: &str = "https://api.rodeye.yourdomain.com";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Search radius used by the server when none is given.
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// `GET /hazards` answers `{"hazards": [...]}`; older deployments send a bare
/// array, and an empty result may come back as `{"hazards": null}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HazardListResponse {
    Wrapped { hazards: Option<Vec<HazardRecord>> },
    Bare(Vec<HazardRecord>),
}

impl HazardListResponse {
    fn into_hazards(self) -> Vec<HazardRecord> {
        match self {
            HazardListResponse::Wrapped { hazards } => hazards.unwrap_or_default(),
            HazardListResponse::Bare(hazards) => hazards,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HazardResponse {
    Wrapped { hazard: HazardRecord },
    Bare(HazardRecord),
}

impl HazardResponse {
    fn into_hazard(self) -> HazardRecord {
        match self {
            HazardResponse::Wrapped { hazard } | HazardResponse::Bare(hazard) => hazard,
        }
    }
}

/// API client for the hazard service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<String>>,
}

impl ApiClient {
    /// Create a new API client with the default timeout
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::NetworkError)?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: Arc<String>) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: Arc<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::BadRequest("token contains invalid characters".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Hazard API request failed");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .get(self.url(path))
            .headers(self.auth_headers()?)
            .query(query)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::parse(response, what).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::parse(response, what).await
    }

    /// POST/DELETE whose response body is only a status message.
    async fn send_without_body(&self, request: reqwest::RequestBuilder) -> Result<(), ApiError> {
        let response = request.headers(self.auth_headers()?).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl HazardApi for ApiClient {
    async fn fetch_nearby(
        &self,
        observer: Coordinate,
        radius_km: f64,
    ) -> Result<Vec<HazardRecord>, ApiError> {
        let query = [
            ("lat", observer.latitude.to_string()),
            ("lon", observer.longitude.to_string()),
            ("radius", radius_km.to_string()),
        ];
        let response: HazardListResponse = self.get("/hazards", &query, "hazard list").await?;
        let hazards = response.into_hazards();
        debug!(count = hazards.len(), radius_km, "Fetched nearby hazards");
        Ok(hazards)
    }

    async fn report(&self, hazard: NewHazard) -> Result<HazardRecord, ApiError> {
        let body = hazard.to_request();
        let response: HazardResponse = self.post("/hazards/report", &body, "reported hazard").await?;
        let hazard = response.into_hazard();
        debug!(id = %hazard.id, "Hazard reported");
        Ok(hazard)
    }

    async fn detect(&self, image: &[u8], location: Coordinate) -> Result<Detection, ApiError> {
        let body = DetectionRequest::new(image, location);
        self.post("/hazards/detect", &body, "detection result").await
    }

    async fn get_hazard(&self, id: &HazardId) -> Result<HazardRecord, ApiError> {
        let path = format!("/hazards/{}", id);
        let response: HazardResponse = self.get(&path, &[], "hazard").await?;
        Ok(response.into_hazard())
    }

    async fn verify_hazard(&self, id: &HazardId) -> Result<(), ApiError> {
        let url = self.url(&format!("/hazards/{}/verify", id));
        self.send_without_body(self.client.post(url)).await
    }

    async fn delete_hazard(&self, id: &HazardId) -> Result<(), ApiError> {
        let url = self.url(&format!("/hazards/{}", id));
        self.send_without_body(self.client.delete(url)).await
    }
}
