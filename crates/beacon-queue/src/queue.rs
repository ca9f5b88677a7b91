//! The durable, retrying submission queue between the pipeline and the
//! remote collector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use beacon_core::Event;

use crate::client::{SubmissionClient, SubmissionResponse};
use crate::storage::{EventStorage, StorageError};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_ITEMS: usize = 250;
pub const DEFAULT_WORKER_INTERVAL: Duration = Duration::from_secs(10);

const BACKOFF_BASE: Duration = Duration::from_secs(2);
const BACKOFF_MAX: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Submission queue is full ({0} pending events)")]
    Full(usize),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transient submission failure, will retry: {0}")]
    Transport(String),
}

#[derive(Default)]
struct RetryState {
    attempts: u32,
    suspended_until: Option<Instant>,
}

/// Holds accepted events durably, drains them in batches to the submission
/// client, and retries transient failures with exponential backoff.
///
/// Capture-side `enqueue` is synchronous and touches only local storage; a
/// slow or unavailable network never blocks pipeline execution.
pub struct SubmissionQueue {
    storage: Arc<dyn EventStorage>,
    client: Arc<dyn SubmissionClient>,
    batch_size: usize,
    max_items: usize,
    retry: Mutex<RetryState>,
    stopped: AtomicBool,
}

impl SubmissionQueue {
    pub fn new(storage: Arc<dyn EventStorage>, client: Arc<dyn SubmissionClient>) -> Self {
        Self::with_limits(storage, client, DEFAULT_BATCH_SIZE, DEFAULT_MAX_ITEMS)
    }

    pub fn with_limits(
        storage: Arc<dyn EventStorage>,
        client: Arc<dyn SubmissionClient>,
        batch_size: usize,
        max_items: usize,
    ) -> Self {
        Self {
            storage,
            client,
            batch_size: batch_size.max(1),
            max_items: max_items.max(1),
            retry: Mutex::new(RetryState::default()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Persist an accepted event for later delivery. A serialization
    /// failure is permanent for that event; a full queue rejects it.
    pub fn enqueue(&self, event: &Event) -> Result<(), QueueError> {
        let pending = self.storage.count();
        if pending >= self.max_items {
            warn!(pending, "Submission queue is full, discarding event");
            return Err(QueueError::Full(pending));
        }

        match self.storage.save(event) {
            Ok(id) => {
                debug!(id, event_type = %event.event_type, "Enqueued event");
                Ok(())
            }
            Err(err @ StorageError::Serialization(_)) => {
                error!("Dropping event that failed to serialize: {}", err);
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Number of events awaiting delivery.
    pub fn pending(&self) -> usize {
        self.storage.count()
    }

    /// Whether delivery is currently suspended by backoff.
    pub fn is_suspended(&self) -> bool {
        self.retry
            .lock()
            .unwrap()
            .suspended_until
            .is_some_and(|deadline| Instant::now() < deadline)
    }

    fn suspend_after_failure(&self) {
        let mut retry = self.retry.lock().unwrap();
        retry.attempts = retry.attempts.saturating_add(1);
        let exponent = retry.attempts.saturating_sub(1).min(16);
        let delay = BACKOFF_BASE
            .saturating_mul(1u32 << exponent)
            .min(BACKOFF_MAX);
        retry.suspended_until = Some(Instant::now() + delay);
        warn!(
            attempts = retry.attempts,
            delay_secs = delay.as_secs(),
            "Suspending submission queue after transient failure"
        );
    }

    fn reset_backoff(&self) {
        let mut retry = self.retry.lock().unwrap();
        retry.attempts = 0;
        retry.suspended_until = None;
    }

    /// Drain the queue now, ignoring any backoff suspension. Returns the
    /// number of events delivered; a transient transport failure stops the
    /// drain and surfaces as an error while the events stay stored.
    pub async fn process(&self) -> Result<usize, QueueError> {
        let mut delivered = 0usize;

        loop {
            let batch = self.storage.load_batch(self.batch_size)?;
            if batch.is_empty() {
                break;
            }

            let events: Vec<Event> = batch.iter().map(|entry| entry.event.clone()).collect();
            match self.client.submit(&events).await {
                SubmissionResponse::Accepted => {
                    for entry in &batch {
                        self.storage.remove(entry.id)?;
                    }
                    delivered += events.len();
                    self.reset_backoff();
                }
                SubmissionResponse::Rejected(reason) => {
                    // Permanent: drop the batch, it would never be accepted.
                    error!(
                        count = events.len(),
                        reason, "Collector rejected batch, dropping events"
                    );
                    for entry in &batch {
                        self.storage.remove(entry.id)?;
                    }
                }
                SubmissionResponse::TransientFailure(reason) => {
                    self.suspend_after_failure();
                    return Err(QueueError::Transport(reason));
                }
            }
        }

        if delivered > 0 {
            info!(delivered, "Delivered queued events");
        }
        Ok(delivered)
    }

    /// Spawn the background drain worker. It wakes on an interval, skips
    /// while suspended, and stops after [`SubmissionQueue::stop_worker`].
    pub fn start_worker(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            debug!("Submission queue worker started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if queue.stopped.load(Ordering::Relaxed) {
                    debug!("Submission queue worker stopping");
                    break;
                }
                if queue.is_suspended() || queue.pending() == 0 {
                    continue;
                }
                if let Err(err) = queue.process().await {
                    debug!("Queue processing will be retried: {}", err);
                }
            }
        })
    }

    pub fn stop_worker(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}
