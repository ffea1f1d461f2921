//! Presence publisher
//!
//! Announces this runner as online on the shared presence channel and keeps
//! re-announcing on a fixed interval so the coordinator's dashboard can show
//! online/offline state. Individual heartbeat failures are tolerated; only
//! shutdown stops the loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use trawler_core::domain::runner::RunnerIdentity;

use crate::realtime::CHANNEL_RUNNER_PRESENCE;
use crate::realtime::session::Session;

pub struct PresencePublisher {
    session: Arc<Session>,
    interval: Duration,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl PresencePublisher {
    pub fn new(session: Arc<Session>, interval: Duration) -> Self {
        Self {
            session,
            interval,
            heartbeat: Mutex::new(None),
            watcher: Mutex::new(None),
        }
    }

    /// Subscribes the presence channel, announces online immediately and
    /// starts the heartbeat loop
    ///
    /// Requires an established session. Any failure while enabling is
    /// logged and reported as `false`; nothing raises.
    pub async fn enable(&self) -> bool {
        let runner = self.session.runner_name().to_string();

        let Some(client) = self.session.client() else {
            error!("[{}] Cannot enable presence: no transport session", runner);
            return false;
        };

        let channel = client.channel(CHANNEL_RUNNER_PRESENCE);
        let mut events = channel.presence_events();

        if let Err(e) = channel.subscribe().await {
            error!("[{}] Failed to subscribe presence channel: {:#}", runner, e);
            return false;
        }
        info!("[{}] Presence channel subscribed", runner);

        if let Err(e) = channel.track(online_state(self.session.identity())).await {
            error!("[{}] Failed to enable presence: {:#}", runner, e);
            return false;
        }
        info!("[{}] Presence tracking enabled", runner);

        let watcher = {
            let runner = runner.clone();
            tokio::spawn(async move {
                while let Some(update) = events.recv().await {
                    debug!("[{}] Presence {}: {}", runner, update.event, update.state);
                }
            })
        };
        if let Some(previous) = self.watcher.lock().unwrap().replace(watcher) {
            previous.abort();
        }

        let heartbeat = {
            let session = Arc::clone(&self.session);
            let interval = self.interval;
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;

                    if session.shutdown_requested() {
                        info!(
                            "[{}] Presence heartbeat loop stopped",
                            session.runner_name()
                        );
                        break;
                    }

                    if !session.is_connected() {
                        continue;
                    }

                    match channel.track(online_state(session.identity())).await {
                        Ok(()) => debug!("[{}] Presence heartbeat sent", session.runner_name()),
                        Err(e) => warn!(
                            "[{}] Failed to send presence heartbeat: {:#}",
                            session.runner_name(),
                            e
                        ),
                    }
                }
            })
        };
        if let Some(previous) = self.heartbeat.lock().unwrap().replace(heartbeat) {
            previous.abort();
        }

        true
    }

    /// Cancels the heartbeat and watcher tasks and waits for them
    pub async fn stop(&self) {
        let heartbeat = self.heartbeat.lock().unwrap().take();
        if let Some(handle) = heartbeat {
            handle.abort();
            let _ = handle.await;
        }

        let watcher = self.watcher.lock().unwrap().take();
        if let Some(handle) = watcher {
            handle.abort();
            let _ = handle.await;
        }
    }
}

/// The state announced on the presence channel
fn online_state(identity: &RunnerIdentity) -> Value {
    json!({
        "runner_id": identity.runner_id,
        "runner_name": identity.runner_name,
        "status": "online",
        "last_seen": chrono::Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::mock::MockConnector;
    use crate::realtime::transport::{PresenceEvent, PresenceUpdate, TransportConnector};
    use std::sync::atomic::Ordering;

    struct Fixture {
        connector: Arc<MockConnector>,
        session: Arc<Session>,
        presence: PresencePublisher,
    }

    async fn connected_fixture(interval: Duration) -> Fixture {
        let connector = MockConnector::new();
        let session = Arc::new(Session::new(
            Arc::clone(&connector) as Arc<dyn TransportConnector>,
            "http://localhost:4000".to_string(),
            "test-key".to_string(),
            RunnerIdentity::new("test-runner", "test-id"),
        ));
        assert!(session.connect().await);
        let presence = PresencePublisher::new(Arc::clone(&session), interval);
        Fixture {
            connector,
            session,
            presence,
        }
    }

    #[tokio::test]
    async fn enable_without_session_returns_false() {
        let connector = MockConnector::new();
        let session = Arc::new(Session::new(
            Arc::clone(&connector) as Arc<dyn TransportConnector>,
            "http://localhost:4000".to_string(),
            "test-key".to_string(),
            RunnerIdentity::new("test-runner", "test-id"),
        ));
        let presence = PresencePublisher::new(session, Duration::from_secs(30));

        assert!(!presence.enable().await);
    }

    #[tokio::test]
    async fn enable_subscribes_and_announces_online() {
        let fixture = connected_fixture(Duration::from_secs(30)).await;

        assert!(fixture.presence.enable().await);

        let channel = fixture
            .connector
            .client
            .mock_channel(CHANNEL_RUNNER_PRESENCE)
            .expect("presence channel should exist");
        assert_eq!(channel.subscribes.load(Ordering::SeqCst), 1);

        let tracked = channel.tracked.lock().unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0]["runner_id"], "test-id");
        assert_eq!(tracked[0]["runner_name"], "test-runner");
        assert_eq!(tracked[0]["status"], "online");
        assert!(tracked[0]["last_seen"].is_i64());

        fixture.presence.stop().await;
    }

    #[tokio::test]
    async fn enable_reports_subscribe_failure() {
        let fixture = connected_fixture(Duration::from_secs(30)).await;

        // Create the channel first so the failure can be injected.
        let client = fixture.session.client().unwrap();
        client.channel(CHANNEL_RUNNER_PRESENCE);
        fixture
            .connector
            .client
            .mock_channel(CHANNEL_RUNNER_PRESENCE)
            .unwrap()
            .fail_subscribe();

        assert!(!fixture.presence.enable().await);
    }

    #[tokio::test]
    async fn heartbeat_reannounces_until_shutdown() {
        let fixture = connected_fixture(Duration::from_millis(20)).await;
        assert!(fixture.presence.enable().await);

        tokio::time::sleep(Duration::from_millis(90)).await;

        let channel = fixture
            .connector
            .client
            .mock_channel(CHANNEL_RUNNER_PRESENCE)
            .unwrap();
        let after_run = channel.track_count();
        assert!(after_run >= 3, "expected heartbeats, saw {}", after_run);

        fixture.session.request_shutdown();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let after_shutdown = channel.track_count();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(channel.track_count(), after_shutdown);

        fixture.presence.stop().await;
    }

    #[tokio::test]
    async fn single_heartbeat_failure_does_not_stop_the_loop() {
        let fixture = connected_fixture(Duration::from_millis(20)).await;
        assert!(fixture.presence.enable().await);

        let channel = fixture
            .connector
            .client
            .mock_channel(CHANNEL_RUNNER_PRESENCE)
            .unwrap();
        let before = channel.track_count();
        channel.fail_next_tracks(1);

        tokio::time::sleep(Duration::from_millis(90)).await;
        assert!(
            channel.track_count() > before,
            "heartbeats should continue after one failure"
        );

        fixture.presence.stop().await;
    }

    #[tokio::test]
    async fn watcher_logs_presence_events_without_crashing() {
        let fixture = connected_fixture(Duration::from_secs(30)).await;
        assert!(fixture.presence.enable().await);

        let channel = fixture
            .connector
            .client
            .mock_channel(CHANNEL_RUNNER_PRESENCE)
            .unwrap();
        channel.push_presence(PresenceUpdate {
            event: PresenceEvent::Join,
            state: json!({"runner_id": "other"}),
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        fixture.presence.stop().await;
    }
}
