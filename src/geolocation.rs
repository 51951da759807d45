//! Device geolocation
//!
//! [`DeviceGeoLocator`] applies the request policy (permission, high accuracy,
//! no cached fixes, timeout) on top of a platform [`PositionSource`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::permissions::{Capability, PermissionStore};
use crate::types::Coordinates;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {reason}")]
    PositionUnavailable { reason: String },
    #[error("timed out after {timeout_ms}ms waiting for a position fix")]
    Timeout { timeout_ms: u64 },
}

impl LocationError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        LocationError::PositionUnavailable {
            reason: reason.into(),
        }
    }
}

/// Options passed with every position request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_millis(10_000),
            maximum_age: Duration::ZERO,
        }
    }
}

/// A position fix reported by a source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub coordinates: Coordinates,
    pub captured_at: DateTime<Utc>,
    pub accuracy_meters: Option<f64>,
}

/// Resolves the device position once per attendance attempt
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn locate(&self) -> Result<Coordinates, LocationError>;
}

/// Platform capability producing raw position fixes
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self, options: &PositionOptions) -> Result<Position, LocationError>;
}

/// Geolocator enforcing permission, freshness and timeout policy
pub struct DeviceGeoLocator {
    source: Arc<dyn PositionSource>,
    permissions: Arc<PermissionStore>,
    options: PositionOptions,
}

impl std::fmt::Debug for DeviceGeoLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGeoLocator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DeviceGeoLocator {
    pub fn new(source: Arc<dyn PositionSource>, permissions: Arc<PermissionStore>) -> Self {
        Self {
            source,
            permissions,
            options: PositionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PositionOptions {
        &self.options
    }

    fn is_fresh(&self, position: &Position) -> bool {
        let age = Utc::now().signed_duration_since(position.captured_at);
        // Sources stamp fixes at capture; allow for clock granularity
        let tolerance = chrono::Duration::milliseconds(1_000);
        match chrono::Duration::from_std(self.options.maximum_age) {
            Ok(max_age) => age <= max_age + tolerance,
            Err(_) => true,
        }
    }
}

#[async_trait]
impl GeoLocator for DeviceGeoLocator {
    async fn locate(&self) -> Result<Coordinates, LocationError> {
        if !self.permissions.ensure(Capability::Location).await {
            warn!("Location permission denied");
            return Err(LocationError::PermissionDenied);
        }

        let timeout_ms = u64::try_from(self.options.timeout.as_millis()).unwrap_or(u64::MAX);
        debug!(
            high_accuracy = self.options.high_accuracy,
            timeout_ms,
            maximum_age_ms = self.options.maximum_age.as_millis() as u64,
            "Requesting position fix"
        );

        let position = tokio::time::timeout(
            self.options.timeout,
            self.source.current_position(&self.options),
        )
        .await
        .map_err(|_| LocationError::Timeout { timeout_ms })??;

        if !self.is_fresh(&position) {
            warn!(captured_at = %position.captured_at, "Rejected stale position fix");
            return Err(LocationError::unavailable("position fix is older than the allowed age"));
        }

        info!(
            latitude = position.coordinates.latitude,
            longitude = position.coordinates.longitude,
            accuracy_meters = ?position.accuracy_meters,
            "Position fix acquired"
        );
        Ok(position.coordinates)
    }
}

/// Position source returning configured coordinates
#[derive(Debug, Clone, Copy)]
pub struct FixedPositionSource {
    coordinates: Coordinates,
}

impl FixedPositionSource {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl PositionSource for FixedPositionSource {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Position, LocationError> {
        Ok(Position {
            coordinates: self.coordinates,
            captured_at: Utc::now(),
            accuracy_meters: Some(0.0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Position source backed by an ip-api.com compatible lookup endpoint
#[derive(Debug, Clone)]
pub struct IpPositionSource {
    client: Client,
    lookup_url: String,
}

impl IpPositionSource {
    pub fn new(client: Client, lookup_url: impl Into<String>) -> Self {
        Self {
            client,
            lookup_url: lookup_url.into(),
        }
    }
}

#[async_trait]
impl PositionSource for IpPositionSource {
    async fn current_position(&self, options: &PositionOptions) -> Result<Position, LocationError> {
        if options.high_accuracy {
            debug!("IP lookup cannot honor high accuracy; result is approximate");
        }

        let response = self
            .client
            .get(&self.lookup_url)
            .query(&[("fields", "status,message,lat,lon")])
            .send()
            .await
            .map_err(|e| LocationError::unavailable(format!("lookup request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LocationError::unavailable(format!(
                "lookup returned HTTP {}",
                response.status()
            )));
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| LocationError::unavailable(format!("malformed lookup response: {e}")))?;

        if body.status != "success" {
            return Err(LocationError::unavailable(
                body.message.unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Ok(Position {
                coordinates: Coordinates::new(lat, lon),
                captured_at: Utc::now(),
                accuracy_meters: None,
            }),
            _ => Err(LocationError::unavailable("lookup response had no coordinates")),
        }
    }
}
