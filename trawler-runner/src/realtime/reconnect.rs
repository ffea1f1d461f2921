//! Reconnection controller
//!
//! Drives bounded-retry reconnection over a fixed delay schedule. A cycle
//! walks the schedule from the first (shortest) delay every time it is
//! started: brief blips recover fast, and the worst-case retry window per
//! cycle is the sum of the schedule. Exhausting the schedule is terminal
//! for that cycle; a supervisor decides whether to start another.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::realtime::session::Session;

/// Observable state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    /// No cycle running (also the terminal state after shutdown interrupts one)
    Idle,
    /// A cycle is walking the schedule
    Retrying,
    /// The last cycle re-established the connection
    Succeeded,
    /// The last cycle ran out of delays without connecting
    Exhausted,
}

pub struct ReconnectController {
    session: Arc<Session>,
    schedule: Vec<Duration>,
    state: Arc<Mutex<ReconnectState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectController {
    pub fn new(session: Arc<Session>, schedule: Vec<Duration>) -> Self {
        Self {
            session,
            schedule,
            state: Arc::new(Mutex::new(ReconnectState::Idle)),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ReconnectState {
        *self.state.lock().unwrap()
    }

    /// Starts a retry cycle in the background
    ///
    /// A no-op (logged) while a cycle is already in flight.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap();

        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                warn!(
                    "[{}] Reconnection loop already running",
                    self.session.runner_name()
                );
                return;
            }
        }

        *self.state.lock().unwrap() = ReconnectState::Retrying;

        let session = Arc::clone(&self.session);
        let schedule = self.schedule.clone();
        let state = Arc::clone(&self.state);
        *task = Some(tokio::spawn(run_cycle(session, schedule, state)));

        info!("[{}] Started reconnection loop", self.session.runner_name());
    }

    /// Cancels any in-flight cycle and waits for it to wind down
    pub async fn stop(&self) {
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }
}

async fn run_cycle(session: Arc<Session>, schedule: Vec<Duration>, state: Arc<Mutex<ReconnectState>>) {
    let runner = session.runner_name().to_string();
    let total = schedule.len();

    info!("[{}] Starting auto-reconnect sequence", runner);

    for (attempt, delay) in schedule.into_iter().enumerate() {
        if session.shutdown_requested() {
            info!("[{}] Shutdown requested, skipping reconnect", runner);
            *state.lock().unwrap() = ReconnectState::Idle;
            return;
        }

        info!(
            "[{}] Reconnect attempt {}/{} in {:?}",
            runner,
            attempt + 1,
            total,
            delay
        );
        tokio::time::sleep(delay).await;

        if session.shutdown_requested() {
            info!("[{}] Shutdown requested, skipping reconnect", runner);
            *state.lock().unwrap() = ReconnectState::Idle;
            return;
        }

        if session.connect().await {
            info!("[{}] Reconnection successful", runner);
            *state.lock().unwrap() = ReconnectState::Succeeded;
            return;
        }
    }

    error!(
        "[{}] Reconnect schedule exhausted after {} attempts",
        runner, total
    );
    session.mark_disconnected();
    *state.lock().unwrap() = ReconnectState::Exhausted;
}
