//! Broadcast publisher
//!
//! Best-effort fan-out of job progress, job logs and runner status to the
//! admin-observable broadcast channel. Fire-and-forget: when the runner is
//! not connected or broadcast was never enabled these are silent no-ops,
//! and a failed send is logged and discarded. Messages lost during a
//! disconnect window are gone; these are observability signals, not data
//! of record.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use trawler_core::domain::log::LogLevel;
use trawler_core::dto::broadcast::{JobProgress, RunnerLog, StatusUpdate};

use crate::realtime::session::Session;
use crate::realtime::transport::TransportChannel;
use crate::realtime::{
    CHANNEL_JOB_BROADCAST, EVENT_JOB_PROGRESS, EVENT_RUNNER_LOG, EVENT_RUNNER_STATUS,
};

pub struct BroadcastPublisher {
    session: Arc<Session>,
    channel: Mutex<Option<Arc<dyn TransportChannel>>>,
}

impl BroadcastPublisher {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            channel: Mutex::new(None),
        }
    }

    /// Subscribes the shared broadcast channel
    ///
    /// Calling again replaces the stored channel handle, so re-enabling
    /// after a reconnect picks up the fresh connection.
    pub async fn enable(&self) -> bool {
        let runner = self.session.runner_name();

        let Some(client) = self.session.client() else {
            error!("[{}] Cannot enable broadcast: no transport session", runner);
            return false;
        };

        let channel = client.channel(CHANNEL_JOB_BROADCAST);
        if let Err(e) = channel.subscribe().await {
            error!("[{}] Failed to enable broadcast: {:#}", runner, e);
            return false;
        }

        *self.channel.lock().unwrap() = Some(channel);
        info!("[{}] Broadcast channel enabled", runner);
        true
    }

    /// Announces progress for a job being processed
    pub async fn job_progress(
        &self,
        job_id: &str,
        status: &str,
        progress: u8,
        message: Option<String>,
        details: Option<Value>,
    ) {
        let payload = JobProgress::new(
            self.session.identity(),
            job_id,
            status,
            progress,
            message,
            details,
            now(),
        );
        self.dispatch(EVENT_JOB_PROGRESS, &payload).await;
    }

    /// Fans out a log line for a job
    pub async fn job_log(
        &self,
        job_id: &str,
        level: LogLevel,
        message: &str,
        details: Option<Value>,
    ) {
        let payload = RunnerLog::new(
            self.session.identity(),
            job_id,
            level,
            message,
            details,
            now(),
        );
        self.dispatch(EVENT_RUNNER_LOG, &payload).await;
    }

    /// Announces a runner lifecycle change (starting, stopping, error, idle)
    pub async fn runner_status(&self, status: &str, details: Option<Value>) {
        let payload = StatusUpdate::new(self.session.identity(), status, details, now());
        self.dispatch(EVENT_RUNNER_STATUS, &payload).await;
    }

    async fn dispatch<T: Serialize>(&self, event: &str, payload: &T) {
        let Some(channel) = self.active_channel() else {
            return;
        };

        let Ok(value) = serde_json::to_value(payload) else {
            return;
        };

        match channel.send(event, value).await {
            Ok(()) => debug!("[{}] Broadcast {}", self.session.runner_name(), event),
            Err(e) => warn!(
                "[{}] Failed to broadcast {}: {:#}",
                self.session.runner_name(),
                event,
                e
            ),
        }
    }

    fn active_channel(&self) -> Option<Arc<dyn TransportChannel>> {
        if !self.session.is_connected() {
            return None;
        }
        self.channel.lock().unwrap().clone()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
