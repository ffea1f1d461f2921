//! Transport abstraction
//!
//! Object-safe traits over the managed publish/subscribe transport. The
//! realtime subsystem only ever talks to these traits; the websocket adapter
//! in [`crate::realtime::ws`] implements them for production and the test
//! suite injects in-memory doubles. This keeps the subsystem free of global
//! client state: one connector is handed to one manager instance.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::realtime::{JOB_TABLE, PENDING_JOB_FILTER};

/// Opens transport connections
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Establishes a connection to the transport endpoint
    ///
    /// Errors here are reported to the caller as a failed connect attempt;
    /// the session translates them into a logged `false`.
    async fn connect(&self, endpoint: &str, access_key: &str)
    -> Result<Arc<dyn TransportClient>>;
}

/// A live transport connection that hands out channels
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Returns the channel with the given name, creating it on first use.
    /// Repeated calls with the same name return the same handle.
    fn channel(&self, name: &str) -> Arc<dyn TransportChannel>;

    /// Every channel handle this client has created so far
    fn channels(&self) -> Vec<Arc<dyn TransportChannel>>;

    /// Closes the underlying connection
    async fn close(&self) -> Result<()>;
}

/// A named channel on the transport
///
/// Mirrors the managed transport's channel surface: change-feed
/// registration, presence tracking and broadcast sends. Event delivery is
/// recast from callbacks into `mpsc` receivers so consumers control their
/// own scheduling; events arrive on the receiver in transport-delivery
/// order.
#[async_trait]
pub trait TransportChannel: Send + Sync {
    /// Registers a server-side change filter; the receiver yields matching
    /// events in arrival order once the channel is subscribed
    fn changes(&self, filter: ChangeFilter) -> mpsc::UnboundedReceiver<ChangePayload>;

    /// Presence sync/join/leave events observed on this channel
    fn presence_events(&self) -> mpsc::UnboundedReceiver<PresenceUpdate>;

    /// Announces this participant's presence state
    async fn track(&self, state: Value) -> Result<()>;

    /// Sends a broadcast message on this channel
    async fn send(&self, event: &str, payload: Value) -> Result<()>;

    /// Activates the channel on the transport
    async fn subscribe(&self) -> Result<()>;

    /// Deactivates the channel
    async fn unsubscribe(&self) -> Result<()>;
}

/// Database change kinds a filter can match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEvent {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeEvent::Insert => write!(f, "INSERT"),
            ChangeEvent::Update => write!(f, "UPDATE"),
            ChangeEvent::Delete => write!(f, "DELETE"),
        }
    }
}

/// Server-side change filter registered at subscribe time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilter {
    pub event: ChangeEvent,
    pub schema: String,
    pub table: String,
    pub filter: String,
}

impl ChangeFilter {
    /// The filter the job subscription registers: inserts on the job table
    /// constrained to pending status
    pub fn pending_job_inserts() -> Self {
        Self {
            event: ChangeEvent::Insert,
            schema: "public".to_string(),
            table: JOB_TABLE.to_string(),
            filter: PENDING_JOB_FILTER.to_string(),
        }
    }
}

/// A change event delivered by the transport
///
/// `record` is the inserted row. The wire calls it `"new"`; upstream
/// payloads that are missing it, or carry an explicit null, are malformed
/// and get dropped by the subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangePayload {
    #[serde(default, rename = "new", alias = "record")]
    pub record: Option<Value>,
}

impl ChangePayload {
    pub fn insert(record: Value) -> Self {
        Self {
            record: Some(record),
        }
    }
}

/// Presence event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    Sync,
    Join,
    Leave,
}

impl std::fmt::Display for PresenceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresenceEvent::Sync => write!(f, "sync"),
            PresenceEvent::Join => write!(f, "join"),
            PresenceEvent::Leave => write!(f, "leave"),
        }
    }
}

/// A presence state change observed on a channel
#[derive(Debug, Clone)]
pub struct PresenceUpdate {
    pub event: PresenceEvent,
    pub state: Value,
}
