//! Broadcast payloads
//!
//! Fire-and-forget messages fanned out to the admin dashboard over the
//! shared broadcast channel. These are observability signals, not data of
//! record: a message lost during a disconnect is simply gone.

use crate::domain::log::LogLevel;
use crate::domain::runner::RunnerIdentity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Progress update for a job being processed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: String,
    pub runner_id: String,
    pub runner_name: String,
    /// Current phase (started, running, completed, failed)
    pub status: String,
    /// Percentage, 0-100
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "empty_details")]
    pub details: Value,
    /// Unix seconds
    pub timestamp: i64,
}

/// Log line emitted while processing a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerLog {
    pub job_id: String,
    pub runner_id: String,
    pub runner_name: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default = "empty_details")]
    pub details: Value,
    pub timestamp: i64,
}

/// Runner lifecycle announcement (starting, stopping, error, idle)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub runner_id: String,
    pub runner_name: String,
    pub status: String,
    #[serde(default = "empty_details")]
    pub details: Value,
    pub timestamp: i64,
}

fn empty_details() -> Value {
    Value::Object(serde_json::Map::new())
}

impl JobProgress {
    pub fn new(
        identity: &RunnerIdentity,
        job_id: impl Into<String>,
        status: impl Into<String>,
        progress: u8,
        message: Option<String>,
        details: Option<Value>,
        timestamp: i64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            runner_id: identity.runner_id.clone(),
            runner_name: identity.runner_name.clone(),
            status: status.into(),
            progress,
            message,
            details: details.unwrap_or_else(empty_details),
            timestamp,
        }
    }
}

impl RunnerLog {
    pub fn new(
        identity: &RunnerIdentity,
        job_id: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
        details: Option<Value>,
        timestamp: i64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            runner_id: identity.runner_id.clone(),
            runner_name: identity.runner_name.clone(),
            level,
            message: message.into(),
            details: details.unwrap_or_else(empty_details),
            timestamp,
        }
    }
}

impl StatusUpdate {
    pub fn new(
        identity: &RunnerIdentity,
        status: impl Into<String>,
        details: Option<Value>,
        timestamp: i64,
    ) -> Self {
        Self {
            runner_id: identity.runner_id.clone(),
            runner_name: identity.runner_name.clone(),
            status: status.into(),
            details: details.unwrap_or_else(empty_details),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> RunnerIdentity {
        RunnerIdentity::new("runner-a", "id-1")
    }

    #[test]
    fn progress_payload_shape() {
        let payload = JobProgress::new(
            &identity(),
            "job-1",
            "running",
            40,
            Some("fetching".to_string()),
            None,
            1_700_000_000,
        );

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["job_id"], "job-1");
        assert_eq!(value["runner_id"], "id-1");
        assert_eq!(value["progress"], 40);
        assert_eq!(value["details"], json!({}));
    }

    #[test]
    fn log_payload_level_is_lowercase() {
        let payload = RunnerLog::new(
            &identity(),
            "job-1",
            LogLevel::Error,
            "selector missing",
            Some(json!({"scraper": "acme"})),
            1_700_000_000,
        );

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["level"], "error");
        assert_eq!(value["details"]["scraper"], "acme");
    }

    #[test]
    fn status_update_defaults_empty_details() {
        let payload = StatusUpdate::new(&identity(), "stopping", None, 1_700_000_000);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["status"], "stopping");
        assert_eq!(value["details"], json!({}));
    }
}
