use std::time::Duration;

use serde::Deserialize;

use crate::services::clustering::DEFAULT_TOLERANCE;
use crate::services::providers::{NOMINATIM_URL, PHOTON_URL};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:5000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Predictor HTTP endpoint (POST)
    pub predictor_url: String,

    /// Bearer token sent to the predictor, if it requires one
    #[serde(default)]
    pub predictor_api_token: Option<String>,

    #[serde(default = "default_predictor_timeout_secs")]
    pub predictor_timeout_secs: u64,

    /// Batch-size hint forwarded with every prediction
    #[serde(default = "default_predictor_batch_size")]
    pub predictor_batch_size: usize,

    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,

    #[serde(default = "default_photon_url")]
    pub photon_url: String,

    /// Per-provider call timeout
    #[serde(default = "default_geocode_timeout_secs")]
    pub geocode_timeout_secs: u64,

    /// Nominatim's usage policy requires an identifying User-Agent
    #[serde(default = "default_geocode_user_agent")]
    pub geocode_user_agent: String,

    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// How long finished jobs stay queryable
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Per-axis clustering tolerance in degrees
    #[serde(default = "default_cluster_tolerance")]
    pub cluster_tolerance: f64,

    /// Request body limit; images arrive base64-encoded in JSON
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_predictor_timeout_secs() -> u64 {
    120
}

fn default_predictor_batch_size() -> usize {
    1024
}

fn default_nominatim_url() -> String {
    NOMINATIM_URL.to_string()
}

fn default_photon_url() -> String {
    PHOTON_URL.to_string()
}

fn default_geocode_timeout_secs() -> u64 {
    3
}

fn default_geocode_user_agent() -> String {
    format!("geo-consensus/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_job_ttl_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_cluster_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn predictor_timeout(&self) -> Duration {
        Duration::from_secs(self.predictor_timeout_secs)
    }

    pub fn geocode_timeout(&self) -> Duration {
        Duration::from_secs(self.geocode_timeout_secs)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
