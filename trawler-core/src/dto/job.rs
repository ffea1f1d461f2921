//! Job result DTOs

use crate::domain::job::{JobOutcome, JobStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `POST /callback`: the result report for a finished job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCallback {
    pub job_id: String,
    pub status: JobStatus,
    pub runner_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobCallback {
    /// Builds a callback from a processor outcome
    pub fn from_outcome(
        job_id: impl Into<String>,
        runner_name: impl Into<String>,
        outcome: JobOutcome,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: outcome.status,
            runner_name: runner_name.into(),
            results: outcome.results,
            error_message: outcome.error_message,
        }
    }
}
