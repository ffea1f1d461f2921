//! Pending job queue
//!
//! An unbounded, insertion-ordered FIFO bridging push-driven arrival (the
//! job subscription's delivery task) and pull-driven consumption (the job
//! processor). Producing and consuming from different tasks or threads is
//! safe; ordering beyond insertion order is not promised and duplicate
//! inserts upstream are queued twice.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use trawler_core::domain::job::PendingJob;

/// Default wait used by the polling-style pull
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Thread-safe FIFO of pending jobs
pub struct JobQueue {
    jobs: Mutex<VecDeque<PendingJob>>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Enqueues a job and wakes one waiting consumer
    pub fn push(&self, job: PendingJob) {
        self.jobs.lock().unwrap().push_back(job);
        self.notify.notify_one();
    }

    /// Removes and returns the oldest job without waiting
    pub fn try_pop(&self) -> Option<PendingJob> {
        self.jobs.lock().unwrap().pop_front()
    }

    /// Polling-style pull: waits up to [`DEFAULT_POLL_TIMEOUT`] and returns
    /// `None` on expiry so callers can loop without busy-spinning
    pub async fn pop(&self) -> Option<PendingJob> {
        self.wait(Some(DEFAULT_POLL_TIMEOUT)).await
    }

    /// Blocking pull
    ///
    /// With a finite timeout, returns `None` on expiry. With `None`, waits
    /// until a job arrives; only the caller's own cancellation (dropping the
    /// future) interrupts it.
    pub async fn wait(&self, timeout: Option<Duration>) -> Option<PendingJob> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.next()).await.ok(),
            None => Some(self.next().await),
        }
    }

    async fn next(&self) -> PendingJob {
        loop {
            if let Some(job) = self.try_pop() {
                return job;
            }
            // A push between try_pop and this await leaves a stored permit,
            // so the wakeup is not lost.
            self.notify.notified().await;
        }
    }

    /// Instantaneous length; advisory only, may race with producers and
    /// consumers on other tasks
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-effort drain: removes everything currently queued and returns
    /// how many jobs were dropped. Concurrent pushes may land after the
    /// drain; an empty queue afterwards is not guaranteed.
    pub fn clear(&self) -> usize {
        let mut jobs = self.jobs.lock().unwrap();
        let drained = jobs.len();
        jobs.clear();
        drained
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
