mod support;

use std::time::Duration;

use assist_session::{OutboundMessage, SessionStore, Suggestion, UpdateDispatcher};
use pretty_assertions::assert_eq;
use tokio::time::sleep;

use support::RecordingSink;

#[tokio::test(start_paused = true)]
async fn burst_within_quiet_period_sends_only_last_value() {
    let sink = RecordingSink::new();
    let dispatcher =
        UpdateDispatcher::new(sink.clone(), Duration::from_millis(300)).expect("runtime");

    dispatcher.notify("a");
    sleep(Duration::from_millis(100)).await;
    dispatcher.notify("ab");

    sleep(Duration::from_millis(299)).await;
    assert!(sink.attempts().is_empty(), "timer restarted by second notify");

    sleep(Duration::from_millis(2)).await;
    assert_eq!(sink.delivered(), vec![OutboundMessage::code_update("ab")]);
}

#[tokio::test(start_paused = true)]
async fn separate_bursts_each_send_once() {
    let sink = RecordingSink::new();
    let dispatcher =
        UpdateDispatcher::new(sink.clone(), Duration::from_millis(300)).expect("runtime");

    dispatcher.notify("x");
    sleep(Duration::from_millis(350)).await;
    dispatcher.notify("x = 1");
    dispatcher.notify("x = 10");
    sleep(Duration::from_millis(350)).await;

    assert_eq!(
        sink.delivered(),
        vec![
            OutboundMessage::code_update("x"),
            OutboundMessage::code_update("x = 10"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn send_while_disconnected_is_dropped_not_retried() {
    let sink = RecordingSink::new();
    sink.set_disconnected(true);
    let dispatcher =
        UpdateDispatcher::new(sink.clone(), Duration::from_millis(300)).expect("runtime");

    dispatcher.notify("lost edit");
    sleep(Duration::from_millis(301)).await;
    assert_eq!(sink.attempts().len(), 1);

    sink.set_disconnected(false);
    sleep(Duration::from_secs(10)).await;

    assert_eq!(sink.attempts().len(), 1);
    assert!(sink.delivered().is_empty());
    assert!(!dispatcher.has_pending());
}

#[tokio::test(start_paused = true)]
async fn attached_store_feeds_code_changes_only() {
    let sink = RecordingSink::new();
    let dispatcher =
        UpdateDispatcher::new(sink.clone(), Duration::from_millis(300)).expect("runtime");
    let store = SessionStore::new();
    let _feed = dispatcher.attach(&store);

    store.append_suggestion(Suggestion::recommendation("not code"));
    sleep(Duration::from_millis(400)).await;
    assert!(sink.attempts().is_empty());

    store.set_code("print(1)");
    store.apply_suggestion("print(2)");
    sleep(Duration::from_millis(301)).await;

    assert_eq!(sink.delivered(), vec![OutboundMessage::code_update("print(2)")]);
}

#[tokio::test(start_paused = true)]
async fn dropped_feed_stops_forwarding() {
    let sink = RecordingSink::new();
    let dispatcher =
        UpdateDispatcher::new(sink.clone(), Duration::from_millis(300)).expect("runtime");
    let store = SessionStore::new();

    let feed = dispatcher.attach(&store);
    drop(feed);
    store.set_code("ignored");
    sleep(Duration::from_secs(1)).await;

    assert!(sink.attempts().is_empty());
    assert!(!dispatcher.has_pending());
}

#[test]
fn dispatcher_requires_a_runtime() {
    let sink = RecordingSink::new();
    assert!(UpdateDispatcher::new(sink, Duration::from_millis(300)).is_err());
}
