//! ApiClient - Detection Backend Adapter
//!
//! ## Responsibilities
//!
//! - Poll the detection status endpoint
//! - Submit detection logs with bearer auth
//! - Fetch incident details for alerts
//!
//! `DetectionService` talks to the backend only through [`DetectionApi`],
//! so tests can swap in an in-memory fake.

use crate::error::{Error, Result};
use crate::models::{
    DetectionSnapshot, IncidentResponse, LogDetectionRequest, LogDetectionResponse,
};
use async_trait::async_trait;
use std::time::Duration;

/// Detection backend operations used by the polling service
#[async_trait]
pub trait DetectionApi: Send + Sync {
    /// GET /api/detection-status
    async fn fetch_status(&self) -> Result<DetectionSnapshot>;

    /// POST /api/log-detection
    async fn log_detection(
        &self,
        token: &str,
        request: &LogDetectionRequest,
    ) -> Result<LogDetectionResponse>;

    /// GET /api/incidents/{id}
    async fn fetch_incident(&self, token: &str, incident_id: u64) -> Result<IncidentResponse>;
}

/// reqwest-backed detection API client
pub struct HttpDetectionApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDetectionApi {
    /// Create new client against `base_url` (e.g. http://localhost:5000)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn status_url(&self) -> String {
        format!("{}/api/detection-status", self.base_url)
    }

    fn log_url(&self) -> String {
        format!("{}/api/log-detection", self.base_url)
    }

    fn incident_url(&self, incident_id: u64) -> String {
        format!("{}/api/incidents/{}", self.base_url, incident_id)
    }

    /// Turn a non-2xx response into `Error::Api`, keeping the server message
    async fn error_from(resp: reqwest::Response) -> Error {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);
        Error::Api { status, message }
    }
}

#[async_trait]
impl DetectionApi for HttpDetectionApi {
    async fn fetch_status(&self) -> Result<DetectionSnapshot> {
        let resp = self.client.get(self.status_url()).send().await?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        Ok(resp.json().await?)
    }

    async fn log_detection(
        &self,
        token: &str,
        request: &LogDetectionRequest,
    ) -> Result<LogDetectionResponse> {
        let resp = self
            .client
            .post(self.log_url())
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        Ok(resp.json().await?)
    }

    async fn fetch_incident(&self, token: &str, incident_id: u64) -> Result<IncidentResponse> {
        let resp = self
            .client
            .get(self.incident_url(incident_id))
            .bearer_auth(token)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        Ok(resp.json().await?)
    }
}
