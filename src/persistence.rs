//! Attendance record persistence
//!
//! `save` answers `Ok(false)` for recoverable transport or endpoint failures.
//! `Err` is reserved for records that can never be submitted.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::camera::decode_data_url;
use crate::types::AttendanceRecord;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("record {id} has a malformed photo data URL")]
    InvalidPhoto { id: String },
    #[error("record could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    async fn save(&self, record: &AttendanceRecord) -> Result<bool, PersistenceError>;
}

/// Stand-in backend that accepts every record after a fixed delay
#[derive(Debug, Clone)]
pub struct SimulatedPersistence {
    latency: Duration,
}

impl Default for SimulatedPersistence {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

impl SimulatedPersistence {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl PersistenceClient for SimulatedPersistence {
    async fn save(&self, record: &AttendanceRecord) -> Result<bool, PersistenceError> {
        info!(
            id = %record.id(),
            email = %record.email(),
            timestamp = %record.timestamp().to_rfc3339(),
            latitude = record.coordinates().latitude,
            longitude = record.coordinates().longitude,
            address = %record.address(),
            photo_bytes = record.photo_data_url().len(),
            "Simulating attendance save; no backend configured"
        );
        tokio::time::sleep(self.latency).await;
        Ok(true)
    }
}

/// Row submitted to the record-append endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceRow<'a> {
    id: &'a str,
    email: &'a str,
    timestamp: String,
    latitude: f64,
    longitude: f64,
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_data_url: Option<&'a str>,
}

/// Submits records to an HTTP record-append endpoint
///
/// When a photo upload URL is configured the image is stored there and the
/// row references it, instead of inlining the data URL.
#[derive(Debug, Clone)]
pub struct HttpPersistence {
    client: Client,
    endpoint: String,
    photo_upload_url: Option<String>,
    auth_token: Option<String>,
}

impl HttpPersistence {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            photo_upload_url: None,
            auth_token: None,
        }
    }

    pub fn with_photo_upload_url(mut self, url: impl Into<String>) -> Self {
        self.photo_upload_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Upload the photo out-of-band; `Ok(None)` means the upload failed
    async fn upload_photo(
        &self,
        base_url: &str,
        record: &AttendanceRecord,
    ) -> Result<Option<String>, PersistenceError> {
        let (mime, bytes) =
            decode_data_url(record.photo_data_url()).ok_or_else(|| PersistenceError::InvalidPhoto {
                id: record.id().to_string(),
            })?;

        let url = format!("{base_url}/{}.jpg", record.id());
        let request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes);

        match self.authorized(request).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url = %url, "Photo uploaded");
                Ok(Some(url))
            }
            Ok(response) => {
                warn!(status = %response.status(), "Photo upload rejected");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Photo upload failed");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl PersistenceClient for HttpPersistence {
    async fn save(&self, record: &AttendanceRecord) -> Result<bool, PersistenceError> {
        let photo_url = match &self.photo_upload_url {
            Some(base_url) => match self.upload_photo(base_url, record).await? {
                Some(url) => Some(url),
                None => return Ok(false),
            },
            None => None,
        };

        let coordinates = record.coordinates();
        let row = AttendanceRow {
            id: record.id(),
            email: record.email(),
            timestamp: record.timestamp().to_rfc3339(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            address: record.address(),
            photo_data_url: photo_url.is_none().then(|| record.photo_data_url()),
            photo_url,
        };
        let body = serde_json::to_vec(&row)?;

        let request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        let response = match self.authorized(request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, id = %record.id(), "Attendance submission failed");
                return Ok(false);
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, id = %record.id(), "Attendance endpoint rejected record");
            return Ok(false);
        }

        // Apps Script style endpoints answer 200 with a status field
        let text = response.text().await.unwrap_or_default();
        if let Ok(reply) = serde_json::from_str::<serde_json::Value>(&text) {
            if let Some(reply_status) = reply.get("status").and_then(|s| s.as_str()) {
                if reply_status != "success" {
                    warn!(status = %reply_status, id = %record.id(), "Attendance endpoint reported failure");
                    return Ok(false);
                }
            }
        }

        info!(id = %record.id(), "Attendance saved");
        Ok(true)
    }
}
