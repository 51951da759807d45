//! Wires configured collaborators into an [`AttendanceWorkflow`]

use anyhow::{bail, Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::address::{AddressResolver, GeminiClient, GenerativeAddressResolver, TextCompletion};
use crate::camera::{CameraDevice, Capturer, StillImageCamera, TestPatternCamera};
use crate::config::{AttendanceConfig, CameraSourceKind, LocationSourceKind};
use crate::geolocation::{
    DeviceGeoLocator, FixedPositionSource, IpPositionSource, PositionOptions, PositionSource,
};
use crate::observability::AddressLookupMetrics;
use crate::permissions::{Capability, PermissionPrompter, PermissionStore};
use crate::persistence::{HttpPersistence, PersistenceClient, SimulatedPersistence};
use crate::types::Coordinates;
use crate::workflow::{AttendanceWorkflow, WorkflowSettings};

/// A ready-to-drive workflow and the handles the front end reports on
pub struct AttendanceApp {
    pub workflow: AttendanceWorkflow,
    pub permissions: Arc<PermissionStore>,
    pub address_metrics: Arc<AddressLookupMetrics>,
    pub address_lookup_configured: bool,
}

impl std::fmt::Debug for AttendanceApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceApp")
            .field("workflow", &self.workflow)
            .field("address_lookup_configured", &self.address_lookup_configured)
            .finish_non_exhaustive()
    }
}

fn http_client(timeout_seconds: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds.max(1)))
        .user_agent(concat!("attendance-tracker/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

pub fn build_app(
    config: &AttendanceConfig,
    prompter: Arc<dyn PermissionPrompter>,
) -> Result<AttendanceApp> {
    let permissions = Arc::new(
        PermissionStore::new(prompter)
            .with_state(Capability::Location, config.permissions.location)
            .with_state(Capability::Camera, config.permissions.camera),
    );

    let source: Arc<dyn PositionSource> = match config.geolocation.source {
        LocationSourceKind::Fixed => Arc::new(FixedPositionSource::new(Coordinates::new(
            config.geolocation.latitude,
            config.geolocation.longitude,
        ))),
        LocationSourceKind::Ip => Arc::new(IpPositionSource::new(
            http_client(config.persistence.request_timeout_seconds)?,
            config.geolocation.ip_lookup_url.clone(),
        )),
    };
    let geolocator = DeviceGeoLocator::new(source, Arc::clone(&permissions)).with_options(
        PositionOptions {
            high_accuracy: config.geolocation.high_accuracy,
            timeout: Duration::from_millis(config.geolocation.timeout_ms),
            maximum_age: Duration::from_millis(config.geolocation.maximum_age_ms),
        },
    );

    let ai = &config.ai;
    let ai_client = http_client(ai.request_timeout_seconds)?;
    let resolver = GenerativeAddressResolver::from_api_key(ai.api_key.as_deref(), |key| {
        let client: Arc<dyn TextCompletion> = Arc::new(
            GeminiClient::new(ai_client, key)
                .with_base_url(ai.base_url.clone())
                .with_model(ai.model.clone())
                .with_requests_per_minute(ai.requests_per_minute),
        );
        client
    })
    .with_cache_ttl(Duration::from_secs(ai.cache_ttl_seconds));
    let address_metrics = resolver.metrics();
    let address_lookup_configured = resolver.is_configured();
    let resolver: Arc<dyn AddressResolver> = Arc::new(resolver);

    let device: Arc<dyn CameraDevice> = match config.camera.source {
        CameraSourceKind::TestPattern => Arc::new(TestPatternCamera::new(
            config.camera.width,
            config.camera.height,
        )),
        CameraSourceKind::File => match &config.camera.image_path {
            Some(path) => Arc::new(StillImageCamera::new(path)),
            None => bail!("camera.source = \"file\" requires camera.image_path"),
        },
    };
    let capturer = Capturer::new(device, Arc::clone(&permissions))
        .with_quality(config.camera.jpeg_quality);

    let persistence: Arc<dyn PersistenceClient> = match &config.persistence.endpoint {
        Some(endpoint) => {
            let mut client = HttpPersistence::new(
                http_client(config.persistence.request_timeout_seconds)?,
                endpoint.clone(),
            );
            if let Some(url) = &config.persistence.photo_upload_url {
                client = client.with_photo_upload_url(url.clone());
            }
            if let Some(token) = &config.persistence.auth_token {
                client = client.with_auth_token(token.clone());
            }
            info!(endpoint = %endpoint, "Using HTTP attendance persistence");
            Arc::new(client)
        }
        None => {
            info!("No persistence endpoint configured; saves are simulated");
            Arc::new(SimulatedPersistence::new(Duration::from_millis(
                config.persistence.simulated_latency_ms,
            )))
        }
    };

    let workflow = AttendanceWorkflow::new(
        Arc::new(geolocator),
        resolver,
        Arc::new(capturer),
        persistence,
    )
    .with_settings(WorkflowSettings {
        reset_delay: Duration::from_millis(config.workflow.reset_delay_ms),
    });

    Ok(AttendanceApp {
        workflow,
        permissions,
        address_metrics,
        address_lookup_configured,
    })
}
