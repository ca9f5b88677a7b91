//! The Beacon client facade: wires the default plugin pipeline to the
//! durable submission queue.
//!
//! Capture-path failures are logged and swallowed; submitting an event
//! never propagates an error back into application code.

use std::sync::{Arc, Weak};
use std::time::Duration;

use beacon_core::{
    CapturedException, Configuration, ContextData, Event, EventContext, EventPipeline,
    EventSubmitter, EventType,
};
use beacon_plugins::{
    priority, ConfigurationDefaultsPlugin, DedupCache, DiscardSessionsWithoutIdentityPlugin,
    EnvironmentInfoPlugin, ErrorPlugin, IgnoreBotTrafficPlugin, ReferenceIdPlugin,
    SetLocalIdentityPlugin, SplitAggregateExceptionsPlugin,
};
use beacon_queue::{
    EventStorage, InMemoryStorage, QueueError, SubmissionClient, SubmissionQueue,
    DEFAULT_WORKER_INTERVAL,
};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Client-side entry point: events submitted here run the plugin pipeline
/// and, unless cancelled, land in the submission queue.
pub struct BeaconClient {
    config: Arc<Configuration>,
    submission_queue: Arc<SubmissionQueue>,
    self_ref: Weak<BeaconClient>,
}

impl BeaconClient {
    /// Client with the default plugin set and an in-memory spool.
    pub fn new(client: Arc<dyn SubmissionClient>) -> Arc<Self> {
        Self::with_parts(
            Arc::new(Configuration::new()),
            Arc::new(InMemoryStorage::new()),
            client,
        )
    }

    /// Client over caller-supplied configuration and spool storage. The
    /// default plugins are registered on the given configuration; callers
    /// may add, replace or remove plugins afterwards.
    pub fn with_parts(
        config: Arc<Configuration>,
        storage: Arc<dyn EventStorage>,
        client: Arc<dyn SubmissionClient>,
    ) -> Arc<Self> {
        Self::register_default_plugins(&config);
        let submission_queue = Arc::new(SubmissionQueue::new(storage, client));
        Arc::new_cyclic(|self_ref| Self {
            config,
            submission_queue,
            self_ref: self_ref.clone(),
        })
    }

    fn register_default_plugins(config: &Configuration) {
        let plugins = config.plugins();
        plugins.add_plugin(
            "aggregate-exceptions",
            priority::AGGREGATE,
            Arc::new(SplitAggregateExceptionsPlugin),
        );
        plugins.add_plugin(
            "configuration-defaults",
            priority::CONFIGURATION_DEFAULTS,
            Arc::new(ConfigurationDefaultsPlugin),
        );
        plugins.add_plugin(
            "error",
            priority::ERROR,
            Arc::new(ErrorPlugin::new(Arc::new(DedupCache::default()))),
        );
        plugins.add_plugin(
            "environment-info",
            priority::ENVIRONMENT,
            Arc::new(EnvironmentInfoPlugin::default()),
        );
        plugins.add_plugin(
            "local-identity",
            priority::IDENTITY,
            Arc::new(SetLocalIdentityPlugin),
        );
        plugins.add_plugin(
            "ignore-bots",
            priority::BOT_DISCARD,
            Arc::new(IgnoreBotTrafficPlugin),
        );
        plugins.add_plugin(
            "discard-anonymous-sessions",
            priority::SESSION_DISCARD,
            Arc::new(DiscardSessionsWithoutIdentityPlugin),
        );
        plugins.add_plugin(
            "reference-ids",
            priority::REFERENCE_ID,
            Arc::new(ReferenceIdPlugin),
        );
    }

    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    pub fn submission_queue(&self) -> &Arc<SubmissionQueue> {
        &self.submission_queue
    }

    /// Run the pipeline over an event and queue it unless cancelled.
    pub fn submit_event(&self, event: Event) {
        self.submit_with_context(event, ContextData::new());
    }

    /// Capture an exception as an error event.
    pub fn submit_exception(&self, exception: CapturedException) {
        let mut context_data = ContextData::new();
        context_data.set_exception(Arc::new(exception));
        self.submit_with_context(Event::new(EventType::Error), context_data);
    }

    fn submit_with_context(&self, event: Event, context_data: ContextData) {
        let Some(submitter) = self.self_ref.upgrade() else {
            return;
        };
        let mut context =
            EventContext::with_submitter(self.config.clone(), submitter, event, context_data);
        EventPipeline::run(&mut context);

        if context.is_cancelled() {
            debug!(event_type = %context.event.event_type, "Event was cancelled, not queueing");
            return;
        }
        if let Err(err) = self.submission_queue.enqueue(&context.event) {
            error!("Failed to enqueue event: {}", err);
        }
    }

    /// Synchronously drain the queue; used for flush-on-exit and tests.
    pub async fn process_queue(&self) -> Result<usize, QueueError> {
        self.submission_queue.process().await
    }

    /// Start the background delivery worker on the default interval.
    pub fn start_worker(&self) -> JoinHandle<()> {
        self.start_worker_with_interval(DEFAULT_WORKER_INTERVAL)
    }

    pub fn start_worker_with_interval(&self, interval: Duration) -> JoinHandle<()> {
        self.submission_queue.start_worker(interval)
    }

    pub fn stop_worker(&self) {
        self.submission_queue.stop_worker();
    }
}

impl EventSubmitter for BeaconClient {
    fn submit(&self, event: Event, context_data: ContextData) {
        self.submit_with_context(event, context_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_queue::InMemorySubmissionClient;

    #[tokio::test]
    async fn submitted_events_reach_the_collector() {
        let collector = Arc::new(InMemorySubmissionClient::new());
        let client = BeaconClient::new(collector.clone());

        client.submit_event(Event::with_message(EventType::Log, "hello"));
        assert_eq!(client.submission_queue().pending(), 1);

        let delivered = client.process_queue().await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(collector.events()[0].message.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn capture_path_swallows_queue_errors() {
        let collector = Arc::new(InMemorySubmissionClient::new());
        let storage = Arc::new(InMemoryStorage::new());
        let client = BeaconClient::with_parts(
            Arc::new(Configuration::new()),
            storage.clone(),
            collector,
        );
        // Fill the spool past its bound; submission must not panic or error.
        for index in 0..(beacon_queue::DEFAULT_MAX_ITEMS + 10) {
            client.submit_event(Event::with_message(EventType::Log, format!("{}", index)));
        }
        assert_eq!(client.submission_queue().pending(), beacon_queue::DEFAULT_MAX_ITEMS);
    }

    #[tokio::test]
    async fn cancelled_events_are_not_queued() {
        let collector = Arc::new(InMemorySubmissionClient::new());
        let client = BeaconClient::new(collector);
        client
            .config()
            .plugins()
            .add_plugin_fn("cancel-everything", -100, |ctx| ctx.cancel());

        client.submit_event(Event::new(EventType::Log));
        assert_eq!(client.submission_queue().pending(), 0);
    }
}
