use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use geo_consensus::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{
        geocode_cache::GeocodeCache,
        geocoding::{GeocodingResolver, RetryPolicy, ReverseGeocoder},
        job_store::JobStore,
        orchestrator::{AnalysisOrchestrator, OrchestratorSettings},
        predictor::HttpPredictor,
        providers::{NominatimClient, PhotonClient},
        sweeper,
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing geo-consensus server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe_metrics();

    tracing::info!(endpoint = %config.predictor_url, "Initializing predictor client");
    let predictor = HttpPredictor::new(
        &config.predictor_url,
        config.predictor_api_token.clone(),
        config.predictor_timeout(),
    )
    .expect("Failed to initialize predictor client");

    tracing::info!(
        photon = %config.photon_url,
        nominatim = %config.nominatim_url,
        "Initializing reverse-geocoding providers"
    );
    let photon = PhotonClient::new(
        &config.photon_url,
        &config.geocode_user_agent,
        config.geocode_timeout(),
    )
    .expect("Failed to initialize Photon client");
    let nominatim = NominatimClient::new(
        &config.nominatim_url,
        &config.geocode_user_agent,
        config.geocode_timeout(),
    )
    .expect("Failed to initialize Nominatim client");
    let providers: Vec<Arc<dyn ReverseGeocoder>> = vec![Arc::new(photon), Arc::new(nominatim)];

    let geocoder = GeocodingResolver::new(
        providers,
        Arc::new(GeocodeCache::new()),
        RetryPolicy::default(),
        config.geocode_timeout(),
    );

    let jobs = Arc::new(JobStore::new());
    let orchestrator = AnalysisOrchestrator::new(
        jobs.clone(),
        Arc::new(predictor),
        OrchestratorSettings {
            max_concurrent_jobs: config.max_concurrent_jobs,
            batch_size: config.predictor_batch_size,
            cluster_tolerance: config.cluster_tolerance,
        },
    );

    tokio::spawn(sweeper::run_sweeper(
        jobs,
        config.job_ttl(),
        config.sweep_interval(),
    ));

    let state = AppState::new(orchestrator, geocoder);

    let app = routes::api_router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes));

    tracing::info!("Starting geo-consensus on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
