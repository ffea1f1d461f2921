//! Health and runner registration endpoints

use crate::CoordinatorClient;
use crate::error::Result;
use serde_json::Value;
use trawler_core::dto::runner::{RegisterRunner, RegisterResponse};

impl CoordinatorClient {
    /// Check that the coordinator is reachable and the API key is valid
    ///
    /// Returns `Ok(())` on a 2xx response; a bad key surfaces as an
    /// `ApiError` with status 401 (see [`crate::ClientError::is_unauthorized`]).
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url());
        let response = self.get(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Register this runner with the coordinator
    ///
    /// Should be called once at startup so the coordinator knows the runner
    /// exists before any presence tracking begins.
    ///
    /// # Arguments
    /// * `runner_name` - Unique name for this runner instance
    /// * `metadata` - Deployment metadata (host, version, labels)
    pub async fn register_runner(
        &self,
        runner_name: &str,
        metadata: Value,
    ) -> Result<RegisterResponse> {
        let url = format!("{}/runners/register", self.base_url());
        let response = self
            .post(&url)
            .json(&RegisterRunner {
                runner_name: runner_name.to_string(),
                metadata,
            })
            .send()
            .await?;

        self.handle_response(response).await
    }
}
