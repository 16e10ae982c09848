//! Background analysis jobs.
//!
//! `start_analysis` validates a request, registers a job and hands it to a
//! supervised tokio task. At most `max_concurrent_jobs` jobs run the
//! predictor at once; the rest wait as `pending`.

use std::sync::Arc;
use std::time::Instant;

use garde::Validate;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::models::analysis::{
    AnalysisResults, ConsensusPoint, ProgressResponse, ResultEntry, StartAnalysisRequest,
    DEFAULT_FINAL_RESULTS, DEFAULT_ITERATIONS, DEFAULT_MAX_RESULTS, MAX_ITERATIONS,
};
use crate::models::job::{AnalysisParams, JobStatus};
use crate::models::location::{GeoPoint, LocationInfo};
use crate::services::accuracy;
use crate::services::clustering::{self, DEFAULT_TOLERANCE};
use crate::services::image::{self, DecodedImage, ImageError};
use crate::services::job_store::{JobPatch, JobStore, JobStoreError};
use crate::services::predictor::{self, ModelInfo, Predictor, DEFAULT_MODEL};

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub max_concurrent_jobs: usize,
    pub batch_size: usize,
    pub cluster_tolerance: f64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            batch_size: 1024,
            cluster_tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// What a client gets when asking for a job's results.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Ready(AnalysisResults),
    Failed(String),
    InProgress,
    NotFound,
}

pub struct AnalysisOrchestrator {
    jobs: Arc<JobStore>,
    predictor: Arc<dyn Predictor>,
    permits: Arc<Semaphore>,
    settings: OrchestratorSettings,
}

impl AnalysisOrchestrator {
    pub fn new(
        jobs: Arc<JobStore>,
        predictor: Arc<dyn Predictor>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            jobs,
            predictor,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1))),
            settings,
        }
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    /// Validate the request, create the job and start it in the background.
    ///
    /// Input problems are reported here and no job is created.
    pub fn start_analysis(&self, request: StartAnalysisRequest) -> Result<String, AnalysisError> {
        let (image, params) = prepare(request)?;
        let model = predictor::find_model(&params.model)
            .ok_or_else(|| AnalysisError::UnknownModel(params.model.clone()))?;

        let job_id = self.jobs.create(params.clone());
        metrics::counter!("analysis_jobs_total").increment(1);
        info!(
            job_id = %job_id,
            model = model.id,
            precision_mode = params.precision_mode,
            iterations = params.iterations,
            width = image.width,
            height = image.height,
            "Analysis submitted"
        );

        let run = JobRun {
            job_id: job_id.clone(),
            jobs: self.jobs.clone(),
            predictor: self.predictor.clone(),
            settings: self.settings,
            model,
            image,
            params,
        };
        tokio::spawn(supervise(run, self.permits.clone()));

        Ok(job_id)
    }

    pub fn progress(&self, job_id: &str) -> ProgressResponse {
        self.jobs
            .progress(job_id)
            .unwrap_or_else(ProgressResponse::unknown)
    }

    pub fn results(&self, job_id: &str) -> AnalysisOutcome {
        let Ok(job) = self.jobs.get(job_id) else {
            return AnalysisOutcome::NotFound;
        };
        match (job.status, job.result) {
            (JobStatus::Completed, Some(result)) => AnalysisOutcome::Ready(result),
            (JobStatus::Error, _) => AnalysisOutcome::Failed(
                job.error.unwrap_or_else(|| "Unknown error".to_string()),
            ),
            _ => AnalysisOutcome::InProgress,
        }
    }
}

/// Turn a raw request into a decoded image plus normalized parameters.
fn prepare(request: StartAnalysisRequest) -> Result<(DecodedImage, AnalysisParams), AnalysisError> {
    request
        .validate()
        .map_err(|report| AnalysisError::InvalidRequest(report.to_string()))?;

    let data = request
        .image
        .as_deref()
        .filter(|data| !data.trim().is_empty())
        .ok_or(AnalysisError::MissingImage)?;
    let image = image::decode_data_uri(data)?;

    let precision_mode = request.precision_mode;
    let iterations = if precision_mode {
        let iterations = request.iterations.unwrap_or(DEFAULT_ITERATIONS);
        if !(1..=MAX_ITERATIONS).contains(&iterations) {
            return Err(AnalysisError::InvalidRequest(format!(
                "iterations must be between 1 and {MAX_ITERATIONS}"
            )));
        }
        iterations
    } else {
        1
    };
    let true_coordinates = match (request.true_lat, request.true_lon) {
        (Some(lat), Some(lon)) => Some(
            GeoPoint::new(lat, lon)
                .ok_or_else(|| AnalysisError::InvalidRequest("invalid true coordinates".into()))?,
        ),
        _ => None,
    };

    let params = AnalysisParams {
        model: request.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        max_results: request.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        precision_mode,
        iterations,
        final_results: request.final_results.unwrap_or(DEFAULT_FINAL_RESULTS),
        test_mode: request.test_mode,
        true_coordinates,
    };
    Ok((image, params))
}

/// Everything one background job needs, owned so the task is `'static`.
struct JobRun {
    job_id: String,
    jobs: Arc<JobStore>,
    predictor: Arc<dyn Predictor>,
    settings: OrchestratorSettings,
    model: &'static ModelInfo,
    image: DecodedImage,
    params: AnalysisParams,
}

/// Wait for a worker slot, run the job in its own task and record the
/// outcome, including panics.
async fn supervise(run: JobRun, permits: Arc<Semaphore>) {
    let job_id = run.job_id.clone();
    let jobs = run.jobs.clone();

    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            error!(job_id = %job_id, "Worker pool closed before job could start");
            let _ = jobs.update(&job_id, JobPatch::failed("Worker pool unavailable"));
            return;
        }
    };

    metrics::gauge!("analysis_jobs_active").increment(1.0);
    let started = Instant::now();
    let outcome = tokio::spawn(run.execute()).await;
    metrics::gauge!("analysis_jobs_active").decrement(1.0);
    metrics::histogram!("analysis_processing_seconds").record(started.elapsed().as_secs_f64());

    let patch = match outcome {
        Ok(Ok(results)) => {
            metrics::counter!("analysis_jobs_completed").increment(1);
            info!(
                job_id = %job_id,
                total_found = results.total_found,
                duration_ms = started.elapsed().as_millis() as u64,
                "Analysis completed"
            );
            JobPatch::completed(results)
        }
        Ok(Err(e)) => {
            metrics::counter!("analysis_jobs_failed").increment(1);
            error!(job_id = %job_id, error = %e, "Analysis failed");
            JobPatch::failed(e.to_string())
        }
        Err(join_error) => {
            metrics::counter!("analysis_jobs_failed").increment(1);
            error!(job_id = %job_id, error = %join_error, "Analysis task aborted");
            JobPatch::failed(format!("Analysis task aborted: {join_error}"))
        }
    };

    if let Err(e) = jobs.update(&job_id, patch) {
        warn!(job_id = %job_id, error = %e, "Could not record analysis outcome");
    }
}

impl JobRun {
    async fn execute(self) -> Result<AnalysisResults, AnalysisError> {
        let total = self.params.iterations;
        self.jobs.update(&self.job_id, JobPatch::running(total))?;

        let mut points: Vec<GeoPoint> = Vec::new();
        for iteration in 1..=total {
            self.jobs.update(&self.job_id, JobPatch::progress(iteration))?;

            match self
                .predictor
                .predict(self.model, &self.image, self.settings.batch_size)
                .await
            {
                Ok(output) => {
                    let batch = output.into_points(self.params.max_results);
                    info!(
                        job_id = %self.job_id,
                        iteration,
                        points = batch.len(),
                        "Prediction iteration complete"
                    );
                    if self.params.precision_mode {
                        points.extend(batch);
                    } else {
                        points = batch;
                        break;
                    }
                }
                Err(e) => {
                    metrics::counter!("predictor_iterations_failed").increment(1);
                    warn!(job_id = %self.job_id, iteration, error = %e, "Prediction iteration failed, skipping");
                }
            }
        }

        self.jobs.update(&self.job_id, JobPatch::progress(total))?;

        let limit = self.params.result_limit();
        let ranked: Vec<ConsensusPoint> = if self.params.precision_mode && !points.is_empty() {
            clustering::find_most_frequent_positions(&points, limit, self.settings.cluster_tolerance)
        } else {
            points
                .iter()
                .take(limit)
                .copied()
                .map(ConsensusPoint::single)
                .collect()
        };

        Ok(build_results(&self.params, &ranked))
    }
}

fn build_results(params: &AnalysisParams, ranked: &[ConsensusPoint]) -> AnalysisResults {
    let results: Vec<ResultEntry> = ranked
        .iter()
        .enumerate()
        .map(|(index, point)| ResultEntry {
            id: index + 1,
            latitude: point.coordinates.lat,
            longitude: point.coordinates.lon,
            confidence: point.confidence,
            total_points: point.total_points,
            location_info: LocationInfo::loading(point.coordinates),
        })
        .collect();

    let mut payload = AnalysisResults {
        success: true,
        total_found: results.len(),
        results,
        precision_mode: params.precision_mode,
        iterations: params.iterations,
        test_mode: None,
        true_coordinates: None,
        test_results: None,
        test_summary: None,
    };

    if params.test_mode {
        payload.test_mode = Some(true);
        payload.true_coordinates = params.true_coordinates;
        if let Some(truth) = params.true_coordinates {
            let scored = accuracy::score_results(ranked, truth);
            payload.test_summary = accuracy::summarize(&scored);
            payload.test_results = Some(scored);
        }
    }

    payload
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("No image provided")]
    MissingImage,

    #[error("Invalid image: {0}")]
    InvalidImage(#[from] ImageError),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] JobStoreError),
}

impl AnalysisError {
    /// Errors caused by the caller's input, reported before any job exists.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, AnalysisError::Store(_))
    }
}
