//! In-memory transport doubles for the realtime test suites
//!
//! One connector/client/channel family with call counters and injectable
//! failures. Tests hold the concrete `Arc<Mock*>` types directly, so no
//! downcasting is needed to inspect what the subsystem did.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::realtime::transport::{
    ChangeFilter, ChangePayload, PresenceUpdate, TransportChannel, TransportClient,
    TransportConnector,
};

pub(crate) struct MockConnector {
    pub client: Arc<MockClient>,
    attempts: AtomicUsize,
    failures_before_success: usize,
    always_fail: bool,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            client: Arc::new(MockClient::new()),
            attempts: AtomicUsize::new(0),
            failures_before_success: 0,
            always_fail: false,
        })
    }

    /// Every connect attempt fails
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            client: Arc::new(MockClient::new()),
            attempts: AtomicUsize::new(0),
            failures_before_success: 0,
            always_fail: true,
        })
    }

    /// Fails the first `n` attempts, then succeeds
    pub fn succeeding_after(n: usize) -> Arc<Self> {
        Arc::new(Self {
            client: Arc::new(MockClient::new()),
            attempts: AtomicUsize::new(0),
            failures_before_success: n,
            always_fail: false,
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(
        &self,
        _endpoint: &str,
        _access_key: &str,
    ) -> Result<Arc<dyn TransportClient>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.always_fail || attempt < self.failures_before_success {
            anyhow::bail!("connection refused");
        }
        Ok(Arc::clone(&self.client) as Arc<dyn TransportClient>)
    }
}

pub(crate) struct MockClient {
    channels: Mutex<Vec<(String, Arc<MockChannel>)>>,
    pub closed: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(Vec::new()),
            closed: AtomicUsize::new(0),
        }
    }

    /// The concrete channel double, for assertions
    pub fn mock_channel(&self, name: &str) -> Option<Arc<MockChannel>> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| Arc::clone(c))
    }
}

#[async_trait]
impl TransportClient for MockClient {
    fn channel(&self, name: &str) -> Arc<dyn TransportChannel> {
        let mut channels = self.channels.lock().unwrap();
        if let Some((_, existing)) = channels.iter().find(|(n, _)| n == name) {
            return Arc::clone(existing) as Arc<dyn TransportChannel>;
        }
        let channel = Arc::new(MockChannel::new());
        channels.push((name.to_string(), Arc::clone(&channel)));
        channel as Arc<dyn TransportChannel>
    }

    fn channels(&self) -> Vec<Arc<dyn TransportChannel>> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| Arc::clone(c) as Arc<dyn TransportChannel>)
            .collect()
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct MockChannel {
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub filters: Mutex<Vec<ChangeFilter>>,
    pub tracked: Mutex<Vec<Value>>,
    pub sent: Mutex<Vec<(String, Value)>>,
    subscribe_fails: AtomicBool,
    send_fails: AtomicBool,
    track_failures: AtomicUsize,
    change_tx: Mutex<Option<mpsc::UnboundedSender<ChangePayload>>>,
    presence_tx: Mutex<Option<mpsc::UnboundedSender<PresenceUpdate>>>,
}

impl MockChannel {
    fn new() -> Self {
        Self {
            subscribes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
            filters: Mutex::new(Vec::new()),
            tracked: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            subscribe_fails: AtomicBool::new(false),
            send_fails: AtomicBool::new(false),
            track_failures: AtomicUsize::new(0),
            change_tx: Mutex::new(None),
            presence_tx: Mutex::new(None),
        }
    }

    /// Delivers a change event to whoever registered the change feed
    pub fn push_change(&self, payload: ChangePayload) {
        if let Some(tx) = &*self.change_tx.lock().unwrap() {
            let _ = tx.send(payload);
        }
    }

    pub fn push_presence(&self, update: PresenceUpdate) {
        if let Some(tx) = &*self.presence_tx.lock().unwrap() {
            let _ = tx.send(update);
        }
    }

    pub fn fail_subscribe(&self) {
        self.subscribe_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_sends(&self) {
        self.send_fails.store(true, Ordering::SeqCst);
    }

    /// The next `n` track calls fail, later ones succeed
    pub fn fail_next_tracks(&self, n: usize) {
        self.track_failures.store(n, Ordering::SeqCst);
    }

    pub fn track_count(&self) -> usize {
        self.tracked.lock().unwrap().len()
    }
}

#[async_trait]
impl TransportChannel for MockChannel {
    fn changes(&self, filter: ChangeFilter) -> mpsc::UnboundedReceiver<ChangePayload> {
        self.filters.lock().unwrap().push(filter);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.change_tx.lock().unwrap() = Some(tx);
        rx
    }

    fn presence_events(&self) -> mpsc::UnboundedReceiver<PresenceUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.presence_tx.lock().unwrap() = Some(tx);
        rx
    }

    async fn track(&self, state: Value) -> Result<()> {
        let remaining = self.track_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.track_failures.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("track failed");
        }
        self.tracked.lock().unwrap().push(state);
        Ok(())
    }

    async fn send(&self, event: &str, payload: Value) -> Result<()> {
        if self.send_fails.load(Ordering::SeqCst) {
            anyhow::bail!("send failed");
        }
        self.sent.lock().unwrap().push((event.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self) -> Result<()> {
        if self.subscribe_fails.load(Ordering::SeqCst) {
            anyhow::bail!("subscribe failed");
        }
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
