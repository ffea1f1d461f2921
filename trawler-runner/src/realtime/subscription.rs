//! Job subscription
//!
//! Registers interest in pending-job inserts on the runner-scoped channel
//! and turns push events into queue entries. Events are handled one at a
//! time in arrival order; for each event the job is enqueued before the
//! handler runs, so the queue, not handler side effects, is the
//! authoritative arrival record.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use trawler_core::domain::job::PendingJob;

use crate::realtime::queue::JobQueue;
use crate::realtime::session::Session;
use crate::realtime::transport::{ChangeFilter, ChangePayload};
use crate::realtime::{JOB_TABLE, PENDING_JOB_FILTER};

/// Consumer callback invoked for each queued job notification
///
/// One capability: invoke and await completion. Implementations that finish
/// immediately and implementations that suspend are registered the same way;
/// a returned error is logged and swallowed, it never unqueues the job or
/// stops the subscription.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn on_job(&self, job: PendingJob) -> Result<()>;
}

pub struct JobSubscription {
    session: Arc<Session>,
    queue: Arc<JobQueue>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl JobSubscription {
    pub fn new(session: Arc<Session>, queue: Arc<JobQueue>) -> Self {
        Self {
            session,
            queue,
            task: Mutex::new(None),
        }
    }

    /// Registers the change filter and starts the delivery task
    ///
    /// Requires an established session; without one this logs an error and
    /// returns `false` without raising.
    pub async fn attach(&self, handler: Arc<dyn JobHandler>) -> bool {
        let runner = self.session.runner_name().to_string();

        let Some(client) = self.session.client() else {
            error!("[{}] Cannot subscribe: no transport session", runner);
            return false;
        };

        let channel = client.channel(&format!("runner:{}", runner));
        let mut events = channel.changes(ChangeFilter::pending_job_inserts());

        if let Err(e) = channel.subscribe().await {
            error!("[{}] Failed to subscribe to job inserts: {:#}", runner, e);
            return false;
        }

        info!(
            "[{}] Subscribed to {} INSERT events ({})",
            runner, JOB_TABLE, PENDING_JOB_FILTER
        );

        let queue = Arc::clone(&self.queue);
        let delivery = tokio::spawn(async move {
            while let Some(payload) = events.recv().await {
                handle_insert(&runner, &queue, handler.as_ref(), payload).await;
            }
        });

        // Replacing an earlier subscription cancels its delivery task.
        if let Some(previous) = self.task.lock().unwrap().replace(delivery) {
            previous.abort();
        }

        true
    }

    /// Cancels the delivery task and waits for it to wind down
    pub async fn stop(&self) {
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }
}

async fn handle_insert(
    runner: &str,
    queue: &JobQueue,
    handler: &dyn JobHandler,
    payload: ChangePayload,
) {
    let row = match payload.record {
        None | Some(Value::Null) => {
            warn!("[{}] Received INSERT with no new row", runner);
            return;
        }
        Some(row) => row,
    };

    let job: PendingJob = match serde_json::from_value(row) {
        Ok(job) => job,
        Err(e) => {
            warn!("[{}] Dropping malformed job row: {}", runner, e);
            return;
        }
    };

    queue.push(job.clone());
    info!("[{}] Queued pending job: {}", runner, job.job_id);

    if let Err(e) = handler.on_job(job).await {
        error!("[{}] Job handler error: {:#}", runner, e);
    }
}
