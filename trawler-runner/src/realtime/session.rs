//! Transport session
//!
//! Owns the single realtime connection: the connection state machine, the
//! live client handle and the process-wide shutdown flag the background
//! loops check at their iteration boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};
use trawler_core::domain::runner::RunnerIdentity;

use crate::realtime::transport::{TransportClient, TransportConnector};

/// State of the realtime connection
///
/// Single writer (the session), many readers. Readers may observe a stale
/// value for one scheduling tick; that staleness is acceptable at the
/// granularity this flag is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// The owner of the realtime connection
pub struct Session {
    connector: Arc<dyn TransportConnector>,
    endpoint: String,
    access_key: String,
    identity: RunnerIdentity,
    state: Mutex<ConnectionState>,
    client: Mutex<Option<Arc<dyn TransportClient>>>,
    shutdown: AtomicBool,
}

impl Session {
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        endpoint: String,
        access_key: String,
        identity: RunnerIdentity,
    ) -> Self {
        Self {
            connector,
            endpoint,
            access_key,
            identity,
            state: Mutex::new(ConnectionState::Disconnected),
            client: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &RunnerIdentity {
        &self.identity
    }

    pub fn runner_name(&self) -> &str {
        &self.identity.runner_name
    }

    /// Attempts to open the realtime transport
    ///
    /// A no-op returning `true` while already connected. On success the
    /// previous client handle (if any) is replaced and the state becomes
    /// `Connected`. On failure the error is logged, the state is left
    /// `Disconnected` and `false` is returned; this method never panics and
    /// never propagates.
    pub async fn connect(&self) -> bool {
        if self.is_connected() {
            return true;
        }

        self.set_state(ConnectionState::Connecting);

        match self
            .connector
            .connect(&self.endpoint, &self.access_key)
            .await
        {
            Ok(client) => {
                *self.client.lock().unwrap() = Some(client);
                self.set_state(ConnectionState::Connected);
                info!("[{}] Connected to realtime transport", self.runner_name());
                true
            }
            Err(e) => {
                error!(
                    "[{}] Failed to connect to realtime transport: {:#}",
                    self.runner_name(),
                    e
                );
                self.set_state(ConnectionState::Disconnected);
                false
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The live client handle, if connected
    pub fn client(&self) -> Option<Arc<dyn TransportClient>> {
        self.client.lock().unwrap().clone()
    }

    /// Sets the shutdown flag; idempotent, never cleared
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Records a detected transport loss (or reconnect exhaustion)
    pub fn mark_disconnected(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    /// Unsubscribes every channel the client handed out, closes the
    /// connection and drops the handle. Safe to call when never connected.
    pub async fn teardown(&self) {
        let client = self.client.lock().unwrap().take();

        if let Some(client) = client {
            for channel in client.channels() {
                if let Err(e) = channel.unsubscribe().await {
                    warn!(
                        "[{}] Failed to unsubscribe channel: {:#}",
                        self.runner_name(),
                        e
                    );
                }
            }
            if let Err(e) = client.close().await {
                warn!(
                    "[{}] Failed to close realtime transport: {:#}",
                    self.runner_name(),
                    e
                );
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::mock::MockConnector;
    use std::sync::atomic::Ordering;

    fn session(connector: Arc<MockConnector>) -> Session {
        Session::new(
            connector,
            "http://localhost:4000".to_string(),
            "test-key".to_string(),
            RunnerIdentity::new("test-runner", "test-id"),
        )
    }

    #[tokio::test]
    async fn connect_success_sets_connected() {
        let connector = MockConnector::new();
        let session = session(Arc::clone(&connector));

        assert!(!session.is_connected());
        assert!(session.connect().await);
        assert!(session.is_connected());
        assert_eq!(session.state(), ConnectionState::Connected);
        assert!(session.client().is_some());
    }

    #[tokio::test]
    async fn connect_while_connected_is_a_noop() {
        let connector = MockConnector::new();
        let session = session(Arc::clone(&connector));

        assert!(session.connect().await);
        assert!(session.connect().await);
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn connect_failure_returns_false_without_panicking() {
        let connector = MockConnector::failing();
        let session = session(Arc::clone(&connector));

        assert!(!session.connect().await);
        assert!(!session.is_connected());
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.client().is_none());
    }

    #[tokio::test]
    async fn teardown_when_never_connected_is_a_noop() {
        let connector = MockConnector::new();
        let session = session(Arc::clone(&connector));

        session.teardown().await;
        assert!(!session.is_connected());
        assert_eq!(connector.client.closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn teardown_unsubscribes_every_channel_once_and_closes_once() {
        let connector = MockConnector::new();
        let session = session(Arc::clone(&connector));

        assert!(session.connect().await);
        let client = session.client().unwrap();
        client.channel("runner:test-runner");
        client.channel("runner-presence");
        client.channel("job-broadcast");

        session.teardown().await;

        assert!(!session.is_connected());
        for name in ["runner:test-runner", "runner-presence", "job-broadcast"] {
            let channel = connector.client.mock_channel(name).unwrap();
            assert_eq!(channel.unsubscribes.load(Ordering::SeqCst), 1);
        }
        assert_eq!(connector.client.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_flag_is_idempotent() {
        let connector = MockConnector::new();
        let session = session(connector);

        assert!(!session.shutdown_requested());
        session.request_shutdown();
        session.request_shutdown();
        assert!(session.shutdown_requested());
    }
}
