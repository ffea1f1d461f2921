//! Job configuration and result submission endpoints

use crate::CoordinatorClient;
use crate::error::Result;
use trawler_core::domain::job::JobConfig;
use trawler_core::dto::job::JobCallback;

impl CoordinatorClient {
    /// Fetch the full configuration for a job
    ///
    /// Called after a pending-job notification arrives; the push payload only
    /// carries the row, the real work description lives behind this endpoint.
    ///
    /// # Arguments
    /// * `job_id` - The job identifier from the push notification
    pub async fn get_job(&self, job_id: &str) -> Result<JobConfig> {
        let url = format!("{}/job", self.base_url());
        let response = self.get(&url).query(&[("job_id", job_id)]).send().await?;

        self.handle_response(response).await
    }

    /// Report the result of a finished job to the coordinator
    ///
    /// # Arguments
    /// * `callback` - The result report, including status and any error message
    pub async fn submit_results(&self, callback: &JobCallback) -> Result<()> {
        let url = format!("{}/callback", self.base_url());
        let response = self.post(&url).json(callback).send().await?;

        self.handle_empty_response(response).await
    }
}
