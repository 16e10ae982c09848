//! Helpers for driving the HTTP API in-process.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use geo_consensus::app_state::AppState;
use geo_consensus::routes;
use geo_consensus::services::geocode_cache::GeocodeCache;
use geo_consensus::services::geocoding::{GeocodingResolver, RetryPolicy, ReverseGeocoder};
use geo_consensus::services::job_store::JobStore;
use geo_consensus::services::orchestrator::{AnalysisOrchestrator, OrchestratorSettings};
use geo_consensus::services::predictor::Predictor;
use geo_consensus::services::providers::{NominatimClient, PhotonClient};
use serde_json::{json, Value};
use tokio::time::sleep;

const USER_AGENT: &str = "geo-consensus-tests/1.0";

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub jobs: Arc<JobStore>,
}

/// Where the reverse geocoders live and how hard to retry them.
pub struct GeocoderSetup {
    pub photon_url: String,
    pub nominatim_url: String,
    pub max_retries: u32,
}

impl GeocoderSetup {
    /// Points at ports nothing listens on; for tests that never geocode.
    pub fn unreachable() -> Self {
        Self {
            photon_url: "http://127.0.0.1:9".to_string(),
            nominatim_url: "http://127.0.0.1:9".to_string(),
            max_retries: 0,
        }
    }
}

/// Serve the API router on an ephemeral port.
pub async fn spawn_app(predictor: Arc<dyn Predictor>, geocoder: GeocoderSetup) -> TestApp {
    let timeout = Duration::from_secs(2);
    let photon = PhotonClient::new(&geocoder.photon_url, USER_AGENT, timeout).unwrap();
    let nominatim = NominatimClient::new(&geocoder.nominatim_url, USER_AGENT, timeout).unwrap();
    let providers: Vec<Arc<dyn ReverseGeocoder>> = vec![Arc::new(photon), Arc::new(nominatim)];
    let resolver = GeocodingResolver::new(
        providers,
        Arc::new(GeocodeCache::new()),
        RetryPolicy {
            max_retries: geocoder.max_retries,
            step: Duration::from_millis(5),
            cap: Duration::from_millis(20),
        },
        timeout,
    );

    let jobs = Arc::new(JobStore::new());
    let orchestrator =
        AnalysisOrchestrator::new(jobs.clone(), predictor, OrchestratorSettings::default());
    let app = routes::api_router(AppState::new(orchestrator, resolver));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        jobs,
    }
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> (u16, Value) {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// Submit an analysis and return its id, asserting it was accepted.
    pub async fn start(&self, body: Value) -> String {
        let (status, response) = self.post_json("/start_analysis", &body).await;
        assert_eq!(status, 200, "start_analysis rejected: {response}");
        assert_eq!(response["success"], json!(true));
        response["analysis_id"].as_str().unwrap().to_string()
    }

    /// Poll `/get_results` until it stops answering 202.
    pub async fn wait_for_results(&self, analysis_id: &str) -> (u16, Value) {
        for _ in 0..200 {
            let (status, body) = self.get_json(&format!("/get_results/{analysis_id}")).await;
            if status != 202 {
                return (status, body);
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("analysis {analysis_id} still in progress");
    }
}
