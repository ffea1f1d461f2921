//! Realtime subsystem
//!
//! Maintains the persistent pub/sub session with the coordinator's realtime
//! transport:
//! - [`session::Session`] owns the connection and the shutdown flag
//! - [`reconnect::ReconnectController`] drives bounded-backoff recovery
//! - [`subscription::JobSubscription`] turns pending-job inserts into queue entries
//! - [`presence::PresencePublisher`] keeps the runner marked online
//! - [`broadcast::BroadcastPublisher`] fans out progress/log/status signals
//! - [`queue::JobQueue`] bridges push arrival and pull consumption
//!
//! [`RealtimeManager`] wires these together behind one handle. The subsystem
//! never lets an internal fault escape: recoverable failures degrade to
//! "disconnected" and are reflected through return values and state, not
//! panics or propagated errors.

pub mod broadcast;
pub mod presence;
pub mod queue;
pub mod reconnect;
pub mod session;
pub mod subscription;
pub mod transport;
pub mod ws;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;
use trawler_core::domain::job::PendingJob;
use trawler_core::domain::log::LogLevel;
use trawler_core::domain::runner::RunnerIdentity;

use broadcast::BroadcastPublisher;
use presence::PresencePublisher;
use queue::JobQueue;
use reconnect::{ReconnectController, ReconnectState};
use session::Session;
use subscription::{JobHandler, JobSubscription};
use transport::TransportConnector;

/// Shared presence channel all runners announce on
pub const CHANNEL_RUNNER_PRESENCE: &str = "runner-presence";
/// Shared broadcast channel observed by the admin dashboard
pub const CHANNEL_JOB_BROADCAST: &str = "job-broadcast";
/// Table whose inserts carry new job notifications
pub const JOB_TABLE: &str = "scrape_jobs";
/// Server-side predicate for the job subscription
pub const PENDING_JOB_FILTER: &str = "status=eq.pending";

/// Broadcast event names
pub const EVENT_JOB_PROGRESS: &str = "job_progress";
pub const EVENT_RUNNER_LOG: &str = "runner_log";
pub const EVENT_RUNNER_STATUS: &str = "runner_status";

/// The fixed reconnect delay schedule: 1, 2, 4, 8, 16, 32 seconds
pub fn default_reconnect_schedule() -> Vec<Duration> {
    [1, 2, 4, 8, 16, 32]
        .into_iter()
        .map(Duration::from_secs)
        .collect()
}

/// Settings for one realtime manager instance
#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    /// Transport endpoint (http(s) or ws(s) URL)
    pub endpoint: String,
    /// Access key for the transport
    pub access_key: String,
    /// Identity stamped on presence and broadcast messages
    pub identity: RunnerIdentity,
    /// Interval between online re-announcements
    pub presence_interval: Duration,
    /// Delay schedule for reconnect cycles
    pub reconnect_schedule: Vec<Duration>,
}

impl RealtimeSettings {
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        identity: RunnerIdentity,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            identity,
            presence_interval: Duration::from_secs(30),
            reconnect_schedule: default_reconnect_schedule(),
        }
    }
}

/// Facade over the realtime subsystem
///
/// One manager per runner process; the connector is injected so tests (and
/// alternative transports) run with independent instances instead of a
/// process-wide client singleton.
pub struct RealtimeManager {
    session: Arc<Session>,
    queue: Arc<JobQueue>,
    reconnect: ReconnectController,
    presence: PresencePublisher,
    broadcast: BroadcastPublisher,
    subscription: JobSubscription,
}

impl RealtimeManager {
    pub fn new(connector: Arc<dyn TransportConnector>, settings: RealtimeSettings) -> Self {
        let session = Arc::new(Session::new(
            connector,
            settings.endpoint,
            settings.access_key,
            settings.identity,
        ));
        let queue = Arc::new(JobQueue::new());

        Self {
            reconnect: ReconnectController::new(Arc::clone(&session), settings.reconnect_schedule),
            presence: PresencePublisher::new(Arc::clone(&session), settings.presence_interval),
            broadcast: BroadcastPublisher::new(Arc::clone(&session)),
            subscription: JobSubscription::new(Arc::clone(&session), Arc::clone(&queue)),
            session,
            queue,
        }
    }

    /// Attempts to open the realtime transport; never raises
    pub async fn connect(&self) -> bool {
        self.session.connect().await
    }

    /// Gracefully closes the connection and stops every background task
    ///
    /// Sets the shutdown signal, cancels the presence heartbeat, any
    /// in-flight reconnection cycle and the delivery task (awaiting their
    /// cooperative cancellation), unsubscribes every attached channel and
    /// closes the transport. Safe to call when never connected.
    pub async fn disconnect(&self) {
        info!(
            "[{}] Disconnecting from realtime transport",
            self.session.runner_name()
        );

        self.session.request_shutdown();
        self.presence.stop().await;
        self.reconnect.stop().await;
        self.subscription.stop().await;
        self.session.teardown().await;

        info!(
            "[{}] Disconnected from realtime transport",
            self.session.runner_name()
        );
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn shutdown_requested(&self) -> bool {
        self.session.shutdown_requested()
    }

    /// Registers the pending-job subscription and its handler
    pub async fn subscribe_to_jobs(&self, handler: Arc<dyn JobHandler>) -> bool {
        self.subscription.attach(handler).await
    }

    /// Enables presence tracking for this runner
    pub async fn enable_presence(&self) -> bool {
        self.presence.enable().await
    }

    /// Enables the broadcast channel for progress/log/status fan-out
    pub async fn enable_broadcast(&self) -> bool {
        self.broadcast.enable().await
    }

    pub async fn broadcast_job_progress(
        &self,
        job_id: &str,
        status: &str,
        progress: u8,
        message: Option<String>,
        details: Option<Value>,
    ) {
        self.broadcast
            .job_progress(job_id, status, progress, message, details)
            .await;
    }

    pub async fn broadcast_job_log(
        &self,
        job_id: &str,
        level: LogLevel,
        message: &str,
        details: Option<Value>,
    ) {
        self.broadcast.job_log(job_id, level, message, details).await;
    }

    pub async fn broadcast_runner_status(&self, status: &str, details: Option<Value>) {
        self.broadcast.runner_status(status, details).await;
    }

    /// Starts a background reconnect cycle; a no-op while one is in flight
    pub fn start_reconnection_loop(&self) {
        self.reconnect.start();
    }

    pub fn reconnect_state(&self) -> ReconnectState {
        self.reconnect.state()
    }

    /// Records a detected transport loss so readers observe disconnected
    pub fn mark_disconnected(&self) {
        self.session.mark_disconnected();
    }

    /// Polling-style pull with a short fixed timeout; `None` on expiry
    pub async fn get_pending_job(&self) -> Option<PendingJob> {
        self.queue.pop().await
    }

    /// Blocking pull; `None` timeout waits until a job arrives
    pub async fn wait_for_job(&self, timeout: Option<Duration>) -> Option<PendingJob> {
        self.queue.wait(timeout).await
    }

    /// Instantaneous queue length, advisory only
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// Best-effort drain of everything currently queued
    pub fn clear_pending_jobs(&self) {
        let drained = self.queue.clear();
        info!(
            "[{}] Cleared {} pending job(s) from queue",
            self.session.runner_name(),
            drained
        );
    }
}
