use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::services::job_store::JobStore;

/// Periodically evict finished jobs older than `ttl`. Runs until the task
/// is dropped.
pub async fn run_sweeper(jobs: Arc<JobStore>, ttl: Duration, interval: Duration) {
    tracing::info!(
        ttl_secs = ttl.as_secs(),
        interval_secs = interval.as_secs(),
        "Job sweeper started"
    );

    loop {
        sleep(interval).await;

        let removed = jobs.sweep(ttl);
        if removed > 0 {
            tracing::info!(removed, remaining = jobs.len(), "Evicted expired analysis jobs");
        } else {
            tracing::trace!("No expired analysis jobs");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::AnalysisParams;
    use crate::services::job_store::JobPatch;

    fn params() -> AnalysisParams {
        AnalysisParams {
            model: "nicolas-dufour/PLONK_YFCC".to_string(),
            max_results: 65,
            precision_mode: false,
            iterations: 1,
            final_results: 5,
            test_mode: false,
            true_coordinates: None,
        }
    }

    #[tokio::test]
    async fn test_sweeper_evicts_finished_jobs_only() {
        let jobs = Arc::new(JobStore::new());
        let finished = jobs.create(params());
        jobs.update(&finished, JobPatch::failed("boom")).unwrap();
        let pending = jobs.create(params());

        let handle = tokio::spawn(run_sweeper(
            jobs.clone(),
            Duration::ZERO,
            Duration::from_millis(10),
        ));
        for _ in 0..100 {
            if jobs.get(&finished).is_err() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(jobs.get(&finished).is_err());
        assert!(jobs.get(&pending).is_ok());
    }
}
