//! Websocket transport adapter
//!
//! Production implementation of the transport traits over the coordinator's
//! Phoenix-style realtime endpoint. Every frame on the wire is a JSON
//! object with `topic`, `event`, `payload` and `ref`; channels are topics
//! named `realtime:{channel}`, joined with `phx_join` and left with
//! `phx_leave`. A single reader task routes inbound frames to channel
//! receivers, a single writer task serializes outbound frames, and a
//! heartbeat task keeps the socket alive on the reserved `phoenix` topic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::realtime::transport::{
    ChangeFilter, ChangePayload, PresenceEvent, PresenceUpdate, TransportChannel, TransportClient,
    TransportConnector,
};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_TOPIC: &str = "phoenix";

/// One frame of the wire protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    payload: Value,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

/// Builds the websocket URL from the configured http(s) endpoint
fn websocket_url(endpoint: &str, access_key: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!(
        "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        base, access_key
    )
}

/// Connects over websocket
pub struct WebsocketConnector;

impl WebsocketConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl TransportConnector for WebsocketConnector {
    async fn connect(
        &self,
        endpoint: &str,
        access_key: &str,
    ) -> Result<Arc<dyn TransportClient>> {
        let url = websocket_url(endpoint, access_key);
        let (socket, _response) = connect_async(&url)
            .await
            .context("websocket handshake failed")?;
        let (mut sink, mut stream) = socket.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() {
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let client = Arc::new(WebsocketClient {
            out_tx: out_tx.clone(),
            refs: Arc::new(AtomicU64::new(0)),
            channels: Mutex::new(Vec::new()),
            writer: Mutex::new(Some(writer)),
            tasks: Mutex::new(Vec::new()),
        });

        let reader = {
            let client = Arc::downgrade(&client);
            tokio::spawn(async move {
                while let Some(frame) = stream.next().await {
                    let message = match frame {
                        Ok(message) => message,
                        Err(e) => {
                            warn!("Realtime socket read error: {}", e);
                            break;
                        }
                    };
                    let Some(client) = client.upgrade() else {
                        break;
                    };
                    match message {
                        Message::Text(text) => client.route(text.as_str()),
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            })
        };

        let heartbeat = {
            let out_tx = out_tx;
            let refs = Arc::clone(&client.refs);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(HEARTBEAT_INTERVAL).await;
                    let frame = Frame {
                        topic: HEARTBEAT_TOPIC.to_string(),
                        event: "heartbeat".to_string(),
                        payload: json!({}),
                        reference: Some(next_ref(&refs)),
                    };
                    let Ok(text) = serde_json::to_string(&frame) else {
                        continue;
                    };
                    if out_tx.send(Message::Text(text.into())).is_err() {
                        break;
                    }
                }
            })
        };

        client.tasks.lock().unwrap().extend([reader, heartbeat]);

        Ok(client)
    }
}

fn next_ref(refs: &AtomicU64) -> String {
    refs.fetch_add(1, Ordering::SeqCst).to_string()
}

/// A live websocket connection
pub struct WebsocketClient {
    out_tx: mpsc::UnboundedSender<Message>,
    refs: Arc<AtomicU64>,
    channels: Mutex<Vec<(String, Arc<WebsocketChannel>)>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WebsocketClient {
    /// Routes one inbound frame to the channel owning its topic
    fn route(&self, raw: &str) {
        let frame: Frame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping unparseable realtime frame: {}", e);
                return;
            }
        };

        if frame.topic == HEARTBEAT_TOPIC {
            return;
        }

        let channel = {
            let channels = self.channels.lock().unwrap();
            channels
                .iter()
                .find(|(_, channel)| channel.topic == frame.topic)
                .map(|(_, channel)| Arc::clone(channel))
        };
        let Some(channel) = channel else {
            debug!("Frame for unjoined topic {}", frame.topic);
            return;
        };

        channel.deliver(&frame.event, frame.payload);
    }
}

#[async_trait]
impl TransportClient for WebsocketClient {
    fn channel(&self, name: &str) -> Arc<dyn TransportChannel> {
        let mut channels = self.channels.lock().unwrap();
        if let Some((_, channel)) = channels.iter().find(|(n, _)| n == name) {
            return Arc::clone(channel) as Arc<dyn TransportChannel>;
        }

        let channel = Arc::new(WebsocketChannel {
            topic: format!("realtime:{}", name),
            out_tx: self.out_tx.clone(),
            refs: Arc::clone(&self.refs),
            filters: Mutex::new(Vec::new()),
            change_feeds: Mutex::new(Vec::new()),
            presence_feeds: Mutex::new(Vec::new()),
        });
        channels.push((name.to_string(), Arc::clone(&channel)));
        channel
    }

    fn channels(&self) -> Vec<Arc<dyn TransportChannel>> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .map(|(_, channel)| Arc::clone(channel) as Arc<dyn TransportChannel>)
            .collect()
    }

    async fn close(&self) -> Result<()> {
        // The writer exits on its own after flushing the close frame, so it
        // is awaited, not aborted; a send failure means the socket is
        // already gone and there is nothing left to flush.
        let _ = self.out_tx.send(Message::Close(None));

        let writer = self.writer.lock().unwrap().take();
        if let Some(writer) = writer {
            let _ = writer.await;
        }

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().unwrap());
        for task in tasks {
            task.abort();
            let _ = task.await;
        }
        Ok(())
    }
}

/// A joined topic on the websocket
pub struct WebsocketChannel {
    topic: String,
    out_tx: mpsc::UnboundedSender<Message>,
    refs: Arc<AtomicU64>,
    filters: Mutex<Vec<ChangeFilter>>,
    change_feeds: Mutex<Vec<(ChangeFilter, mpsc::UnboundedSender<ChangePayload>)>>,
    presence_feeds: Mutex<Vec<mpsc::UnboundedSender<PresenceUpdate>>>,
}

impl WebsocketChannel {
    fn send_frame(&self, event: &str, payload: Value) -> Result<()> {
        let frame = Frame {
            topic: self.topic.clone(),
            event: event.to_string(),
            payload,
            reference: Some(next_ref(&self.refs)),
        };
        let text = serde_json::to_string(&frame).context("failed to encode realtime frame")?;
        self.out_tx
            .send(Message::Text(text.into()))
            .context("realtime socket closed")?;
        Ok(())
    }

    /// Fans one inbound event out to this channel's receivers
    fn deliver(&self, event: &str, payload: Value) {
        match event {
            "postgres_changes" => {
                let data = payload.get("data").cloned().unwrap_or(Value::Null);
                let kind = data
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let record = data.get("record").cloned();
                let update = ChangePayload { record };

                let mut feeds = self.change_feeds.lock().unwrap();
                feeds.retain(|(filter, tx)| {
                    if filter.event.to_string() != kind {
                        return true;
                    }
                    tx.send(update.clone()).is_ok()
                });
            }
            "presence_state" => {
                self.deliver_presence(PresenceEvent::Sync, payload);
            }
            "presence_diff" => {
                let joins = payload.get("joins").cloned().unwrap_or(Value::Null);
                if joins.as_object().is_some_and(|m| !m.is_empty()) {
                    self.deliver_presence(PresenceEvent::Join, joins);
                }
                let leaves = payload.get("leaves").cloned().unwrap_or(Value::Null);
                if leaves.as_object().is_some_and(|m| !m.is_empty()) {
                    self.deliver_presence(PresenceEvent::Leave, leaves);
                }
            }
            "phx_reply" => {
                debug!("Reply on {}: {}", self.topic, payload);
            }
            other => {
                debug!("Unhandled event {} on {}", other, self.topic);
            }
        }
    }

    fn deliver_presence(&self, event: PresenceEvent, state: Value) {
        let mut feeds = self.presence_feeds.lock().unwrap();
        feeds.retain(|tx| {
            tx.send(PresenceUpdate {
                event,
                state: state.clone(),
            })
            .is_ok()
        });
    }

    fn join_payload(&self) -> Value {
        let filters = self.filters.lock().unwrap();
        json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": *filters,
            }
        })
    }
}

#[async_trait]
impl TransportChannel for WebsocketChannel {
    fn changes(&self, filter: ChangeFilter) -> mpsc::UnboundedReceiver<ChangePayload> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.filters.lock().unwrap().push(filter.clone());
        self.change_feeds.lock().unwrap().push((filter, tx));
        rx
    }

    fn presence_events(&self) -> mpsc::UnboundedReceiver<PresenceUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.presence_feeds.lock().unwrap().push(tx);
        rx
    }

    async fn track(&self, state: Value) -> Result<()> {
        self.send_frame(
            "presence",
            json!({
                "type": "presence",
                "event": "track",
                "payload": state,
            }),
        )
    }

    async fn send(&self, event: &str, payload: Value) -> Result<()> {
        self.send_frame(
            "broadcast",
            json!({
                "type": "broadcast",
                "event": event,
                "payload": payload,
            }),
        )
    }

    async fn subscribe(&self) -> Result<()> {
        self.send_frame("phx_join", self.join_payload())
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.send_frame("phx_leave", json!({}))
    }
}
