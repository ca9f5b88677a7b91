//! End-to-end pipeline tests: events submitted through the client, drained
//! through the queue, observed at the in-memory submission client.

use std::sync::Arc;

use beacon_client::BeaconClient;
use beacon_core::{
    CapturedException, Configuration, Event, EventType, RequestInfo, StackFrame, UserIdentity,
};
use beacon_queue::{FileStorage, InMemorySubmissionClient, JsonStorageSerializer};
use serde_json::json;

fn client_and_collector() -> (Arc<BeaconClient>, Arc<InMemorySubmissionClient>) {
    let collector = Arc::new(InMemorySubmissionClient::new());
    let client = BeaconClient::new(collector.clone());
    (client, collector)
}

fn crashing_exception(message: &str) -> CapturedException {
    CapturedException::new("ValueError", message)
        .with_stack(vec![StackFrame::at("handle", "handler.rs", 12)])
}

#[tokio::test]
async fn single_inner_aggregate_is_unwrapped_into_one_event() {
    let (client, collector) = client_and_collector();

    let inner = Arc::new(crashing_exception("one"));
    client.submit_exception(CapturedException::aggregate("wrapper", vec![inner]));

    let delivered = client.process_queue().await.unwrap();
    assert_eq!(delivered, 1);

    let events = collector.events();
    assert_eq!(events.len(), 1);
    let error = events[0].error().unwrap();
    assert_eq!(error.type_name, "ValueError");
    assert_eq!(error.message.as_deref(), Some("one"));
}

#[tokio::test]
async fn multi_inner_aggregate_fans_out_into_independent_events() {
    let (client, collector) = client_and_collector();

    let one = Arc::new(crashing_exception("one"));
    let two = Arc::new(
        CapturedException::new("IoError", "two")
            .with_stack(vec![StackFrame::at("read", "io.rs", 7)]),
    );
    client.submit_exception(CapturedException::aggregate("both failed", vec![one, two]));

    let delivered = client.process_queue().await.unwrap();
    assert_eq!(delivered, 2);

    let events = collector.events();
    assert_eq!(events.len(), 2);
    for event in &events {
        assert_eq!(event.event_type, EventType::Error);
        assert!(event.error().is_some());
    }
    let messages: Vec<_> = events
        .iter()
        .map(|event| event.error().unwrap().message.unwrap())
        .collect();
    assert!(messages.contains(&"one".to_string()));
    assert!(messages.contains(&"two".to_string()));
}

#[tokio::test]
async fn cancellation_skips_later_plugins_and_the_queue() {
    let (client, _collector) = client_and_collector();
    let plugins = client.config().plugins();
    plugins.clear();
    plugins.add_plugin_fn("cancel", 1, |ctx| ctx.cancel());
    plugins.add_plugin_fn("add-tag", 2, |ctx| ctx.event.add_tag("Was Not Canceled"));

    client.submit_event(Event::new(EventType::Log));
    assert_eq!(client.submission_queue().pending(), 0);
}

#[tokio::test]
async fn plugins_run_in_priority_order_with_insertion_tie_break() {
    let (client, collector) = client_and_collector();
    let plugins = client.config().plugins();
    plugins.clear();

    fn record(name: &'static str) -> impl Fn(&mut beacon_core::EventContext) {
        move |ctx| {
            let order = ctx
                .event
                .data
                .entry("order".to_string())
                .or_insert_with(|| json!([]));
            order.as_array_mut().unwrap().push(json!(name));
        }
    }

    plugins.add_plugin_fn("late", 10, record("late"));
    plugins.add_plugin_fn("default-a", 0, record("default-a"));
    plugins.add_plugin_fn("default-b", 0, record("default-b"));
    plugins.add_plugin_fn("early", 1, record("early"));

    client.submit_event(Event::new(EventType::Log));
    client.process_queue().await.unwrap();

    let events = collector.events();
    assert_eq!(
        events[0].data["order"],
        json!(["default-a", "default-b", "early", "late"])
    );
}

#[tokio::test]
async fn reference_ids_only_assigned_when_enabled() {
    let (client, collector) = client_and_collector();
    client.submit_exception(crashing_exception("no reference id"));
    client.process_queue().await.unwrap();
    assert_eq!(collector.events()[0].reference_id, None);

    let (client, collector) = client_and_collector();
    client.config().enable_reference_ids();
    client.submit_exception(crashing_exception("with reference id"));
    client.process_queue().await.unwrap();
    assert!(collector.events()[0].reference_id.is_some());
}

#[tokio::test]
async fn duplicate_errors_are_suppressed_within_the_session() {
    let (client, collector) = client_and_collector();

    client.submit_exception(crashing_exception("boom"));
    client.submit_exception(crashing_exception("boom"));
    client.submit_exception(crashing_exception("a different failure"));

    let delivered = client.process_queue().await.unwrap();
    assert_eq!(delivered, 2);
    assert_eq!(collector.event_count(), 2);
}

#[tokio::test]
async fn bot_traffic_is_discarded() {
    let (client, collector) = client_and_collector();
    client
        .config()
        .add_user_agent_bot_patterns(["*Bot*"]);

    let mut bot_event = Event::new(EventType::Log);
    bot_event.set_request_info(RequestInfo::with_user_agent(
        "Mozilla/5.0 (compatible; bingbot/2.0 +http://www.bing.com/bingbot.htm)",
    ));
    client.submit_event(bot_event);

    let mut browser_event = Event::new(EventType::Log);
    browser_event.set_request_info(RequestInfo::with_user_agent(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_3) Safari/601.4.4",
    ));
    client.submit_event(browser_event);

    client.submit_event(Event::new(EventType::Log));

    let delivered = client.process_queue().await.unwrap();
    assert_eq!(delivered, 2);
    assert!(collector
        .events()
        .iter()
        .all(|event| match event.request_info() {
            Some(request) => !request.user_agent.unwrap_or_default().contains("bingbot"),
            None => true,
        }));
}

#[tokio::test]
async fn sessions_without_identity_are_discarded() {
    let (client, collector) = client_and_collector();
    // Without the default identity enrichment, anonymous sessions stay
    // anonymous and must be dropped.
    client.config().plugins().remove("local-identity");

    client.submit_event(Event::new(EventType::SessionStart));

    let mut identified = Event::new(EventType::SessionHeartbeat);
    identified.set_user_identity(UserIdentity::new("123456789"));
    client.submit_event(identified);

    let delivered = client.process_queue().await.unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(
        collector.events()[0].event_type,
        EventType::SessionHeartbeat
    );
}

#[tokio::test]
async fn configuration_defaults_are_applied_to_delivered_events() {
    let (client, collector) = client_and_collector();
    let config = client.config();
    config.add_default_tag("Critical");
    config.add_default_data("Build", json!("1.2.3"));
    config.add_data_exclusions(["Secret*"]);
    config.add_default_data("SecretToken", json!("never"));

    client.submit_event(Event::new(EventType::Log));
    client.process_queue().await.unwrap();

    let event = &collector.events()[0];
    assert!(event.tags.contains("Critical"));
    assert_eq!(event.data["Build"], json!("1.2.3"));
    assert!(!event.data.contains_key("SecretToken"));
}

#[tokio::test]
async fn environment_info_is_attached_by_default() {
    let (client, collector) = client_and_collector();
    client.submit_event(Event::with_message(EventType::Log, "with environment"));
    client.process_queue().await.unwrap();

    let environment = collector.events()[0].environment_info().unwrap();
    assert!(environment.os_name.is_some());
}

#[tokio::test]
async fn file_backed_queue_survives_a_restart() {
    let spool = tempfile::tempdir().unwrap();

    {
        let collector = Arc::new(InMemorySubmissionClient::new());
        let storage = Arc::new(
            FileStorage::new(spool.path(), Arc::new(JsonStorageSerializer)).unwrap(),
        );
        let client =
            BeaconClient::with_parts(Arc::new(Configuration::new()), storage, collector);
        client.submit_event(Event::with_message(EventType::Log, "survives"));
        assert_eq!(client.submission_queue().pending(), 1);
        // Process exits before anything is delivered.
    }

    let collector = Arc::new(InMemorySubmissionClient::new());
    let storage =
        Arc::new(FileStorage::new(spool.path(), Arc::new(JsonStorageSerializer)).unwrap());
    let client = BeaconClient::with_parts(Arc::new(Configuration::new()), storage, collector.clone());

    let delivered = client.process_queue().await.unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(collector.events()[0].message.as_deref(), Some("survives"));
}

#[tokio::test]
async fn background_worker_delivers_without_manual_flushing() {
    let (client, collector) = client_and_collector();
    let handle = client.start_worker_with_interval(std::time::Duration::from_millis(10));

    client.submit_event(Event::with_message(EventType::Log, "background"));

    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while collector.event_count() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("worker should deliver within timeout");

    client.stop_worker();
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("worker should stop within timeout")
        .unwrap();
}
