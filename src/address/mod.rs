//! Reverse geocoding through a generative text completion service
//!
//! Address resolution never fails outward. Without a configured credential
//! the resolver answers with a labeled mock string; any error from the
//! completion service is replaced by a deterministic fallback string.

pub mod completion;

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::observability::AddressLookupMetrics;

pub use completion::{CompletionError, GeminiClient, TextCompletion};

#[cfg(test)]
use mockall::automock;

/// Turns coordinates into a display address
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, latitude: f64, longitude: f64) -> String;
}

pub fn mock_address(latitude: f64, longitude: f64) -> String {
    format!("Mock Address for {latitude:.4}, {longitude:.4}. (API key not configured)")
}

pub fn fallback_address(latitude: f64, longitude: f64) -> String {
    format!("Could not fetch address. Coordinates: {latitude:.4}, {longitude:.4}")
}

pub fn address_prompt(latitude: f64, longitude: f64) -> String {
    format!(
        "Provide the full street address for latitude: {latitude}, longitude: {longitude}. \
         Respond with only the address text, without any introductory phrases like \"The address is\"."
    )
}

fn cache_key(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.4},{longitude:.4}")
}

/// Address resolver backed by an optional text completion service
pub struct GenerativeAddressResolver {
    completion: Option<Arc<dyn TextCompletion>>,
    cache: Cache<String, String>,
    metrics: Arc<AddressLookupMetrics>,
}

impl std::fmt::Debug for GenerativeAddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeAddressResolver")
            .field("completion", &self.completion.is_some())
            .field("cached_entries", &self.cache.entry_count())
            .finish()
    }
}

impl GenerativeAddressResolver {
    /// `None` means no credential is configured
    pub fn new(completion: Option<Arc<dyn TextCompletion>>) -> Self {
        Self {
            completion,
            cache: Cache::builder()
                .max_capacity(256)
                .time_to_live(Duration::from_secs(600))
                .build(),
            metrics: Arc::new(AddressLookupMetrics::new()),
        }
    }

    /// Build from an optional API key, treating a blank key as absent
    pub fn from_api_key(
        api_key: Option<&str>,
        build: impl FnOnce(&str) -> Arc<dyn TextCompletion>,
    ) -> Self {
        let completion = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(build);
        if completion.is_none() {
            warn!("No AI credential configured; addresses will be mocked");
        }
        Self::new(completion)
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Cache::builder().max_capacity(256).time_to_live(ttl).build();
        self
    }

    pub fn metrics(&self) -> Arc<AddressLookupMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn is_configured(&self) -> bool {
        self.completion.is_some()
    }
}

#[async_trait]
impl AddressResolver for GenerativeAddressResolver {
    async fn resolve(&self, latitude: f64, longitude: f64) -> String {
        self.metrics.record_lookup();

        let Some(completion) = &self.completion else {
            self.metrics.record_mock_response();
            return mock_address(latitude, longitude);
        };

        let key = cache_key(latitude, longitude);
        if let Some(address) = self.cache.get(&key).await {
            debug!(key = %key, "Address cache hit");
            self.metrics.record_cache_hit();
            return address;
        }

        self.metrics.record_completion_request();
        match completion.complete(&address_prompt(latitude, longitude)).await {
            Ok(text) => {
                let address = text.trim().to_string();
                if address.is_empty() {
                    warn!("Completion service returned an empty address");
                    self.metrics.record_fallback();
                    return fallback_address(latitude, longitude);
                }
                info!(address = %address, "Address resolved");
                self.cache.insert(key, address.clone()).await;
                address
            }
            Err(e) => {
                warn!(error = %e, "Address lookup failed; using fallback");
                self.metrics.record_fallback();
                fallback_address(latitude, longitude)
            }
        }
    }
}
