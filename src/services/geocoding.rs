//! Reverse-geocoding resolver.
//!
//! Looks a coordinate up in the cell cache, then asks each provider in turn,
//! rotating the starting provider on every retry. Provider failures only
//! change which label comes back; they never surface to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::models::location::{GeoPoint, LocationInfo};
use crate::services::geocode_cache::{CellKey, GeocodeCache};

/// Labels providers use when they do not actually know the place.
const UNKNOWN_SENTINELS: &[&str] = &["unknown", "inconnu", "ville inconnue", "pays inconnu"];

/// A reverse-geocoding backend.
///
/// `Ok(None)` means the provider answered but had nothing for the point.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn reverse(&self, point: GeoPoint) -> Result<Option<LocationInfo>, ProviderError>;
}

/// Bounded retry schedule: `max_retries` extra rounds, each delayed by
/// `min(step * retry, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub step: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            step: Duration::from_millis(500),
            cap: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Delay before round `retry` (0 is the first attempt).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.step.saturating_mul(retry).min(self.cap)
    }
}

pub struct GeocodingResolver {
    providers: Vec<Arc<dyn ReverseGeocoder>>,
    cache: Arc<GeocodeCache>,
    policy: RetryPolicy,
    call_timeout: Duration,
}

impl GeocodingResolver {
    pub fn new(
        providers: Vec<Arc<dyn ReverseGeocoder>>,
        cache: Arc<GeocodeCache>,
        policy: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            providers,
            cache,
            policy,
            call_timeout,
        }
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    /// Provider order for round `retry`: the list rotated left by
    /// `retry % len`.
    pub fn rotation(&self, retry: u32) -> Vec<&'static str> {
        self.rotated(retry).map(|p| p.name()).collect()
    }

    fn rotated(&self, retry: u32) -> impl Iterator<Item = &Arc<dyn ReverseGeocoder>> {
        let start = match self.providers.len() {
            0 => 0,
            len => retry as usize % len,
        };
        self.providers[start..]
            .iter()
            .chain(self.providers[..start].iter())
    }

    /// Resolve a label for `point`. Always returns something: a cached or
    /// freshly accepted result, or an uncached placeholder.
    pub async fn resolve(&self, point: GeoPoint) -> LocationInfo {
        let key = CellKey::for_point(point);
        if let Some(hit) = self.cache.get(&key) {
            metrics::counter!("geocode_cache_hits").increment(1);
            return hit;
        }
        metrics::counter!("geocode_cache_misses").increment(1);

        for retry in 0..=self.policy.max_retries {
            if retry > 0 {
                let delay = self.policy.delay_for(retry);
                info!(cell = %key, retry, delay_ms = delay.as_millis() as u64, "Retrying reverse geocoding");
                sleep(delay).await;

                // A concurrent lookup may have resolved the cell meanwhile.
                if let Some(hit) = self.cache.get(&key) {
                    return hit;
                }
            }

            for provider in self.rotated(retry) {
                match timeout(self.call_timeout, provider.reverse(point)).await {
                    Ok(Ok(Some(raw))) => match accept(raw, point) {
                        Some(info) => {
                            debug!(cell = %key, provider = provider.name(), city = %info.city, "Location resolved");
                            return self.cache.insert(key, info);
                        }
                        None => {
                            debug!(cell = %key, provider = provider.name(), "Rejected low-quality result");
                        }
                    },
                    Ok(Ok(None)) => {
                        debug!(cell = %key, provider = provider.name(), "Provider had no result");
                    }
                    Ok(Err(e)) => {
                        warn!(cell = %key, provider = provider.name(), error = %e, "Provider lookup failed");
                    }
                    Err(_) => {
                        warn!(
                            cell = %key,
                            provider = provider.name(),
                            timeout_ms = self.call_timeout.as_millis() as u64,
                            "Provider lookup timed out"
                        );
                    }
                }
            }
        }

        metrics::counter!("geocode_fallbacks").increment(1);
        warn!(cell = %key, "All geocoding providers failed, returning placeholder");
        LocationInfo::searching(point)
    }
}

fn is_known(label: &str) -> bool {
    let label = label.trim();
    !label.is_empty()
        && !UNKNOWN_SENTINELS
            .iter()
            .any(|sentinel| label.eq_ignore_ascii_case(sentinel))
}

/// Quality gate plus normalization. Requires a real city and country.
fn accept(raw: LocationInfo, point: GeoPoint) -> Option<LocationInfo> {
    if !is_known(&raw.city) || !is_known(&raw.country) {
        return None;
    }
    let full_address = if raw.full_address.trim().is_empty() {
        point.label()
    } else {
        raw.full_address
    };
    Some(LocationInfo {
        full_address,
        ..raw
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {0}")]
    Status(u16),
}
