//! Job domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A job notification pushed by the coordinator.
///
/// This is the inserted row carried by a realtime insert event. Only the
/// identifier and status are structural; everything else the coordinator
/// attaches (SKU lists, lease tokens, priorities) rides along in `fields`
/// untouched. A row without a `job_id` is malformed and is dropped before it
/// ever reaches a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingJob {
    /// Identifier assigned by the coordinator
    pub job_id: String,

    /// Job status at insert time (the subscription filters for "pending")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Any additional attributes on the inserted row
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Full job configuration fetched from the coordinator once a pending job
/// has been picked up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job_id: String,
    pub skus: Vec<String>,
    pub scrapers: Vec<ScraperConfig>,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_max_workers() -> usize {
    3
}

/// Configuration for a single scraper within a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_url_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_skus: Option<Vec<String>>,
}

/// Terminal status of a processed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What the job processor hands back once a job is done
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobOutcome {
    /// A successful outcome carrying scrape results
    pub fn completed(results: Value) -> Self {
        Self {
            status: JobStatus::Completed,
            results: Some(results),
            error_message: None,
        }
    }

    /// A failed outcome with an error message for the coordinator
    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            results: None,
            error_message: Some(error_message.into()),
        }
    }
}
