//! Worker loop
//!
//! Drives the runner end to end: connects the realtime subsystem, announces
//! the runner, then pulls queued jobs and pushes each one through the
//! injected [`JobProcessor`]. Progress and logs are broadcast as the job
//! moves; the final outcome is reported to the coordinator over HTTP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};
use trawler_client::CoordinatorClient;
use trawler_core::domain::job::{JobConfig, JobOutcome, JobStatus, PendingJob};
use trawler_core::domain::log::LogLevel;
use trawler_core::domain::runner::RunnerIdentity;
use trawler_core::dto::job::JobCallback;

use crate::realtime::RealtimeManager;
use crate::realtime::reconnect::ReconnectState;
use crate::realtime::subscription::JobHandler;

/// Executes one job's scraping work
///
/// The crate ships no scraping engine; embedders implement this against
/// whatever fetching stack they run. A returned error is treated as a failed
/// job, never as a worker fault.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, config: JobConfig) -> Result<JobOutcome>;
}

/// Logs each pushed notification; the queue is the delivery mechanism, so
/// the handler only needs to make arrival visible.
struct ReceiptLogger {
    runner: String,
}

#[async_trait]
impl JobHandler for ReceiptLogger {
    async fn on_job(&self, job: PendingJob) -> Result<()> {
        info!("[{}] Job notification received: {}", self.runner, job.job_id);
        Ok(())
    }
}

pub struct Worker {
    manager: Arc<RealtimeManager>,
    client: Arc<CoordinatorClient>,
    processor: Arc<dyn JobProcessor>,
    identity: RunnerIdentity,
    wait_timeout: Duration,
}

impl Worker {
    pub fn new(
        manager: Arc<RealtimeManager>,
        client: Arc<CoordinatorClient>,
        processor: Arc<dyn JobProcessor>,
        identity: RunnerIdentity,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            client,
            processor,
            identity,
            wait_timeout,
        }
    }

    /// Runs the worker until shutdown is requested on the manager
    ///
    /// Fails only when the initial connection cannot be established; once
    /// running, transport loss degrades to reconnection cycles and job
    /// faults degrade to failed-job reports.
    pub async fn run(&self) -> Result<()> {
        let runner = &self.identity.runner_name;

        if !self.manager.connect().await {
            anyhow::bail!("could not establish realtime connection");
        }

        let handler = Arc::new(ReceiptLogger {
            runner: runner.clone(),
        });
        if !self.manager.subscribe_to_jobs(handler).await {
            anyhow::bail!("could not subscribe to job notifications");
        }

        if !self.manager.enable_presence().await {
            warn!("[{}] Presence tracking unavailable", runner);
        }
        if !self.manager.enable_broadcast().await {
            warn!("[{}] Broadcast channel unavailable", runner);
        }

        self.manager
            .broadcast_runner_status(
                "starting",
                Some(json!({"message": "Runner initialized and waiting for jobs"})),
            )
            .await;
        info!("[{}] Worker started, waiting for jobs", runner);

        while !self.manager.shutdown_requested() {
            if !self.manager.is_connected() {
                // Exhaustion is terminal for the controller; the hosting
                // process decides whether to restart the runner. Queued
                // jobs are still drained meanwhile.
                match self.manager.reconnect_state() {
                    ReconnectState::Retrying | ReconnectState::Exhausted => {}
                    _ => self.manager.start_reconnection_loop(),
                }
            }

            if let Some(job) = self.manager.wait_for_job(Some(self.wait_timeout)).await {
                self.run_job(job).await;
            }
        }

        self.manager
            .broadcast_runner_status("stopping", None)
            .await;
        self.manager.disconnect().await;
        info!("[{}] Worker stopped", runner);
        Ok(())
    }

    /// Drives a single job from notification to reported outcome
    async fn run_job(&self, pending: PendingJob) {
        let runner = &self.identity.runner_name;
        let job_id = pending.job_id.as_str();
        info!("[{}] Processing job: {}", runner, job_id);

        self.manager
            .broadcast_job_progress(job_id, "started", 0, Some("Job received".to_string()), None)
            .await;
        self.manager
            .broadcast_job_log(job_id, LogLevel::Info, "Job received by runner", None)
            .await;

        self.manager
            .broadcast_job_progress(
                job_id,
                "running",
                10,
                Some("Fetching job configuration".to_string()),
                None,
            )
            .await;

        let config = match self.client.get_job(job_id).await {
            Ok(config) => config,
            Err(e) => {
                error!("[{}] Failed to fetch job {}: {:#}", runner, job_id, e);
                let outcome =
                    JobOutcome::failed(format!("failed to fetch job configuration: {}", e));
                self.finish_job(job_id, outcome).await;
                return;
            }
        };

        let outcome = match self.processor.process(config).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[{}] Job {} failed: {:#}", runner, job_id, e);
                JobOutcome::failed(format!("{:#}", e))
            }
        };

        self.finish_job(job_id, outcome).await;
    }

    /// Broadcasts the terminal state and reports the outcome over HTTP
    async fn finish_job(&self, job_id: &str, outcome: JobOutcome) {
        let runner = &self.identity.runner_name;

        match outcome.status {
            JobStatus::Completed => {
                info!("[{}] Job {} completed", runner, job_id);
                self.manager
                    .broadcast_job_progress(
                        job_id,
                        "completed",
                        100,
                        Some("Job completed".to_string()),
                        None,
                    )
                    .await;
            }
            JobStatus::Failed => {
                let message = outcome
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "job failed".to_string());
                self.manager
                    .broadcast_job_progress(job_id, "failed", 0, Some(message.clone()), None)
                    .await;
                self.manager
                    .broadcast_job_log(job_id, LogLevel::Error, &message, None)
                    .await;
            }
        }

        let callback = JobCallback::from_outcome(job_id, runner.clone(), outcome);
        // A lost report is logged and dropped; the coordinator reaps stale
        // jobs on its own timetable.
        if let Err(e) = self.client.submit_results(&callback).await {
            error!(
                "[{}] Failed to report results for job {}: {:#}",
                runner, job_id, e
            );
        } else {
            info!("[{}] Reported results for job {}", runner, job_id);
        }
    }
}
