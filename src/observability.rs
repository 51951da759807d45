use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Address lookup usage metrics
#[derive(Debug, Default)]
pub struct AddressLookupMetrics {
    pub total_lookups: AtomicU64,
    pub completion_requests: AtomicU64,
    pub cache_hits: AtomicU64,
    pub fallbacks: AtomicU64,
    pub mock_responses: AtomicU64,
}

impl AddressLookupMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_lookup(&self) {
        self.total_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion_request(&self) {
        self.completion_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mock_response(&self) {
        self.mock_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> AddressLookupStats {
        AddressLookupStats {
            total_lookups: self.total_lookups.load(Ordering::Relaxed),
            completion_requests: self.completion_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            mock_responses: self.mock_responses.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            lookups = stats.total_lookups,
            completion_requests = stats.completion_requests,
            cache_hits = stats.cache_hits,
            fallbacks = stats.fallbacks,
            mock_responses = stats.mock_responses,
            "Address lookup metrics"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressLookupStats {
    pub total_lookups: u64,
    pub completion_requests: u64,
    pub cache_hits: u64,
    pub fallbacks: u64,
    pub mock_responses: u64,
}
