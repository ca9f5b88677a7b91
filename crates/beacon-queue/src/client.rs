//! The submission-client contract the queue delivers through.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use beacon_core::Event;

/// Outcome of delivering one batch to the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResponse {
    /// The batch was accepted; entries can be removed from the store.
    Accepted,
    /// Transport-level failure (network, timeout); retry later.
    TransientFailure(String),
    /// The collector refused the batch (validation, quota); do not retry.
    Rejected(String),
}

impl SubmissionResponse {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionResponse::Accepted)
    }
}

/// Delivers batches of finalized events to the remote collector.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit(&self, events: &[Event]) -> SubmissionResponse;
}

/// In-memory submission client: records accepted events and replays
/// scripted responses. The default response is `Accepted`.
#[derive(Default)]
pub struct InMemorySubmissionClient {
    events: Mutex<Vec<Event>>,
    batch_sizes: Mutex<Vec<usize>>,
    responses: Mutex<VecDeque<SubmissionResponse>>,
}

impl InMemorySubmissionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next submission attempt.
    pub fn push_response(&self, response: SubmissionResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Every event accepted so far, in delivery order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Sizes of the batches received, accepted or not.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionClient for InMemorySubmissionClient {
    async fn submit(&self, events: &[Event]) -> SubmissionResponse {
        self.batch_sizes.lock().unwrap().push(events.len());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SubmissionResponse::Accepted);
        if response.is_accepted() {
            self.events.lock().unwrap().extend_from_slice(events);
        }
        response
    }
}
