//! Trawler Runner
//!
//! A worker that receives scrape-job assignments pushed by a central
//! coordinator, executes them and reports results back over HTTP.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Realtime: Persistent pub/sub session with job subscription, presence
//!   tracking, broadcast fan-out and bounded-backoff reconnection
//! - Worker: Pulls queued jobs and drives them through an injected processor
//!
//! The scraping engine itself and the hosting process are collaborators, not
//! part of this crate: embedders implement [`worker::JobProcessor`], install
//! a `tracing` subscriber, build a [`RealtimeManager`] with a transport
//! connector (the websocket adapter in [`realtime::ws`] or a custom one) and
//! call [`worker::Worker::run`].

pub mod config;
pub mod realtime;
pub mod worker;

pub use config::Config;
pub use realtime::{RealtimeManager, RealtimeSettings};
pub use worker::{JobProcessor, Worker};
