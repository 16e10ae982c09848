use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::analysis::AnalysisResults;
use crate::models::location::GeoPoint;

/// Lifecycle of an analysis job. `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// Normalized request parameters kept with the job (the image is not stored).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisParams {
    pub model: String,
    pub max_results: usize,
    pub precision_mode: bool,
    /// Forced to 1 outside precision mode.
    pub iterations: usize,
    pub final_results: usize,
    pub test_mode: bool,
    pub true_coordinates: Option<GeoPoint>,
}

impl AnalysisParams {
    /// Number of ranked results the job reports.
    pub fn result_limit(&self) -> usize {
        if self.precision_mode {
            self.final_results
        } else {
            self.max_results
        }
    }
}

/// An analysis job as tracked by the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: String,
    pub status: JobStatus,
    pub current: usize,
    pub total: usize,
    pub params: AnalysisParams,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<AnalysisResults>,
    pub error: Option<String>,
}

impl AnalysisJob {
    pub fn new(id: String, params: AnalysisParams) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            current: 0,
            total: params.iterations,
            params,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_strings() {
        assert_eq!(JobStatus::Pending.to_string(), "pending");
        assert_eq!(JobStatus::Completed.to_string(), "completed");
        assert_eq!(JobStatus::from_str("error").unwrap(), JobStatus::Error);
        assert_eq!(
            serde_json::to_value(JobStatus::Running).unwrap(),
            serde_json::json!("running")
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }
}
