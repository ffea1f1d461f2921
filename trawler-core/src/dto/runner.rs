//! Runner registration DTOs

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `POST /runners/register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRunner {
    pub runner_name: String,
    /// Deployment metadata (host, version, labels); opaque to the runner
    #[serde(default)]
    pub metadata: Value,
}

/// Response body for a successful registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
}
