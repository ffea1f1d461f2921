//! Runner domain model
//!
//! Represents the identity of a runner process that executes scrape jobs.

use serde::{Deserialize, Serialize};

/// Identity of a runner process
///
/// Immutable for the lifetime of the process; stamped on every presence and
/// broadcast message so the admin dashboard can attribute activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerIdentity {
    /// Human-readable name, unique per deployment (e.g. "warehouse-01")
    pub runner_name: String,

    /// Stable identifier for presence tracking
    pub runner_id: String,
}

impl RunnerIdentity {
    /// Creates an identity; an empty `runner_id` falls back to the name,
    /// matching how runners without an assigned id present themselves.
    pub fn new(runner_name: impl Into<String>, runner_id: impl Into<String>) -> Self {
        let runner_name = runner_name.into();
        let runner_id = runner_id.into();
        let runner_id = if runner_id.is_empty() {
            runner_name.clone()
        } else {
            runner_id
        };
        Self {
            runner_name,
            runner_id,
        }
    }
}
