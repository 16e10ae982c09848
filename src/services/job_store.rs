use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::models::analysis::{AnalysisResults, ProgressResponse};
use crate::models::job::{AnalysisJob, AnalysisParams, JobStatus};

/// Partial update merged into a job record by [`JobStore::update`].
#[derive(Debug, Default, Clone)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub current: Option<usize>,
    pub total: Option<usize>,
    pub result: Option<AnalysisResults>,
    pub error: Option<String>,
}

impl JobPatch {
    pub fn running(total: usize) -> Self {
        Self {
            status: Some(JobStatus::Running),
            current: Some(0),
            total: Some(total),
            ..Self::default()
        }
    }

    pub fn progress(current: usize) -> Self {
        Self {
            current: Some(current),
            ..Self::default()
        }
    }

    /// Status and payload land together so a reader never sees
    /// `completed` without results.
    pub fn completed(result: AnalysisResults) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Per-status job counts, reported by the health endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub error: usize,
}

/// In-memory registry of analysis jobs.
///
/// Backed by a sharded map: each job is guarded by its shard lock only, so
/// polling one job never contends with the writer of another.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: DashMap<String, AnalysisJob>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job and return its id.
    pub fn create(&self, params: AnalysisParams) -> String {
        let id = Uuid::new_v4().to_string();
        self.jobs.insert(id.clone(), AnalysisJob::new(id.clone(), params));
        id
    }

    pub fn get(&self, job_id: &str) -> Result<AnalysisJob, JobStoreError> {
        self.jobs
            .get(job_id)
            .map(|job| job.clone())
            .ok_or_else(|| JobStoreError::NotFound(job_id.to_string()))
    }

    /// Merge `patch` into the job.
    ///
    /// Terminal jobs are frozen: any later patch is ignored. A stored result
    /// is never replaced.
    pub fn update(&self, job_id: &str, patch: JobPatch) -> Result<(), JobStoreError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| JobStoreError::NotFound(job_id.to_string()))?;

        if job.status.is_terminal() {
            warn!(
                job_id = %job_id,
                status = %job.status,
                attempted = ?patch.status,
                "Ignoring update to terminal job"
            );
            return Ok(());
        }

        if let Some(status) = patch.status {
            job.status = status;
        }
        if let Some(total) = patch.total {
            job.total = total;
        }
        if let Some(current) = patch.current {
            job.current = current.min(job.total);
        }
        if let Some(result) = patch.result {
            if job.result.is_none() {
                job.result = Some(result);
            }
        }
        if let Some(error) = patch.error {
            job.error = Some(error);
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    pub fn progress(&self, job_id: &str) -> Option<ProgressResponse> {
        self.jobs.get(job_id).map(|job| ProgressResponse {
            current: job.current,
            total: job.total,
            status: job.status.to_string(),
        })
    }

    /// Drop terminal jobs not updated within `ttl`. Returns how many were removed.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return 0;
        };
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !(job.status.is_terminal() && job.updated_at < cutoff));
        before.saturating_sub(self.jobs.len())
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in self.jobs.iter() {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Analysis not found: {0}")]
    NotFound(String),
}
