mod support;

use std::sync::Arc;
use std::time::Duration;

use assist_channel_mock::{ConnectStep, MockConnector};
use assist_session::{
    ConnectionManager, ConnectionState, ConnectionStatus, FixedDelay, OutboundMessage,
    ReconnectPolicy, SendError, SessionStore, Suggestion, CLOSED_BY_PEER,
};
use pretty_assertions::assert_eq;
use tokio::time::sleep;

use support::{lock_unpoisoned, record_connection_states, settle};

fn manager_with(
    connector: &MockConnector,
    policy: impl ReconnectPolicy,
    store: &SessionStore,
) -> ConnectionManager {
    ConnectionManager::new(Arc::new(connector.clone()), Arc::new(policy), store.clone())
        .expect("inside runtime")
}

#[tokio::test(start_paused = true)]
async fn transport_failure_while_connected_reconnects_once_after_delay() {
    let connector = MockConnector::accepting();
    let store = SessionStore::new();
    let (history, _subscription) = record_connection_states(&store);
    let manager = manager_with(&connector, FixedDelay::default(), &store);

    manager.start();
    settle().await;
    assert_eq!(manager.status(), ConnectionStatus::new(ConnectionState::Connected));

    connector
        .latest_link()
        .expect("accepted link")
        .fail("connection reset");
    settle().await;

    assert_eq!(
        manager.status(),
        ConnectionStatus::with_error(
            ConnectionState::Reconnecting,
            "receive failed: connection reset"
        )
    );
    assert_eq!(connector.attempts(), 1, "no reconnect before the delay");

    sleep(Duration::from_secs(5)).await;

    assert_eq!(manager.status(), ConnectionStatus::new(ConnectionState::Connected));
    assert_eq!(connector.attempts(), 2);
    assert_eq!(
        *lock_unpoisoned(&history),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ]
    );

    sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts(), 2, "exactly one attempt per failure");
}

#[tokio::test(start_paused = true)]
async fn clean_close_is_treated_as_unexpected_closure() {
    let connector = MockConnector::accepting();
    let store = SessionStore::new();
    let manager = manager_with(&connector, FixedDelay::new(Duration::from_millis(200)), &store);

    manager.start();
    settle().await;
    connector.latest_link().expect("accepted link").close();
    settle().await;

    let status = manager.status();
    assert_eq!(status.state, ConnectionState::Reconnecting);
    assert_eq!(status.last_error.as_deref(), Some(CLOSED_BY_PEER));

    sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.status().state, ConnectionState::Connected);
    assert_eq!(manager.status().last_error, None);
    assert_eq!(connector.links().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn refused_connect_keeps_error_through_connecting() {
    let connector = MockConnector::scripted(
        vec![ConnectStep::Refuse("backend down".to_string())],
        ConnectStep::Accept,
    );
    let store = SessionStore::new();
    let (history, _subscription) = record_connection_states(&store);
    let manager = manager_with(&connector, FixedDelay::new(Duration::from_millis(100)), &store);

    manager.start();
    settle().await;
    assert_eq!(
        manager.status(),
        ConnectionStatus::with_error(
            ConnectionState::Reconnecting,
            "connect failed: backend down"
        )
    );

    sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.status(), ConnectionStatus::new(ConnectionState::Connected));
    assert_eq!(
        *lock_unpoisoned(&history),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Reconnecting,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn send_only_reaches_the_channel_while_connected() {
    let connector = MockConnector::accepting();
    let store = SessionStore::new();
    let manager = manager_with(&connector, FixedDelay::new(Duration::from_millis(100)), &store);

    manager.start();
    assert_eq!(
        manager.send(OutboundMessage::code_update("too early")),
        Err(SendError::NotConnected(ConnectionState::Connecting))
    );

    settle().await;
    manager
        .send(OutboundMessage::code_update("x = 1"))
        .expect("connected send");
    settle().await;

    let link = connector.latest_link().expect("accepted link");
    assert_eq!(
        link.sent(),
        vec![r#"{"type":"code_update","content":"x = 1"}"#.to_string()]
    );

    link.fail("reset");
    settle().await;
    assert_eq!(
        manager.send(OutboundMessage::code_update("during outage")),
        Err(SendError::NotConnected(ConnectionState::Reconnecting))
    );

    sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.status().state, ConnectionState::Connected);
    assert!(
        connector.latest_link().expect("second link").sent().is_empty(),
        "dropped frames are not replayed after reconnect"
    );
}

#[tokio::test(start_paused = true)]
async fn inbound_frames_are_routed_to_suggestions() {
    let connector = MockConnector::accepting();
    let store = SessionStore::new();
    let manager = manager_with(&connector, FixedDelay::default(), &store);

    manager.start();
    settle().await;
    let link = connector.latest_link().expect("accepted link");

    link.push_frame(r#"{"type":"suggestions","content":["Add type hints","Use a list comprehension"]}"#);
    link.push_frame(r#"{"type":"explanation","content":"Prints one."}"#);
    link.push_frame(r#"{"type":"error","content":"analysis failed"}"#);
    link.push_frame(r#"{"type":"heartbeat"}"#);
    settle().await;

    assert_eq!(
        store.suggestions(),
        vec![
            Suggestion::recommendation("Add type hints"),
            Suggestion::recommendation("Use a list comprehension"),
            Suggestion::explanation("Prints one."),
            Suggestion::error("analysis failed"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped_and_channel_stays_connected() {
    let connector = MockConnector::accepting();
    let store = SessionStore::new();
    let manager = manager_with(&connector, FixedDelay::default(), &store);

    manager.start();
    settle().await;
    let link = connector.latest_link().expect("accepted link");

    link.push_frame("not json at all");
    link.push_frame(r#"{"content":"missing type"}"#);
    link.push_frame(r#"{"type":"explanation","content":42}"#);
    link.push_frame(r#"["array"]"#);
    link.push_frame(r#"{"type":"suggestions","content":["still works"]}"#);
    settle().await;

    assert_eq!(manager.status().state, ConnectionState::Connected);
    assert_eq!(store.suggestions(), vec![Suggestion::recommendation("still works")]);
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn policy_give_up_ends_in_disconnected_with_error() {
    let connector = MockConnector::refusing("backend down");
    let store = SessionStore::new();
    let manager = manager_with(
        &connector,
        FixedDelay::new(Duration::from_millis(100)).with_max_attempts(2),
        &store,
    );

    manager.start();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(connector.attempts(), 3, "initial attempt plus two reconnects");
    let status = manager.status();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(
        status.last_error.as_deref(),
        Some("reconnect abandoned after 3 consecutive failures: connect failed: backend down")
    );

    assert!(manager.start(), "a later start begins a fresh cycle");
    settle().await;
    assert_eq!(connector.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn stop_during_reconnecting_cancels_the_timer() {
    let connector = MockConnector::refusing("backend down");
    let store = SessionStore::new();
    let manager = manager_with(&connector, FixedDelay::default(), &store);

    manager.start();
    settle().await;
    assert_eq!(manager.status().state, ConnectionState::Reconnecting);

    manager.stop();
    assert_eq!(manager.status(), ConnectionStatus::new(ConnectionState::Disconnected));

    sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(manager.status().state, ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn stop_while_connected_releases_channel_without_later_status_writes() {
    let connector = MockConnector::accepting();
    let store = SessionStore::new();
    let (history, _subscription) = record_connection_states(&store);
    let manager = manager_with(&connector, FixedDelay::default(), &store);

    manager.start();
    settle().await;
    manager.stop();
    sleep(Duration::from_secs(30)).await;

    assert!(connector
        .latest_link()
        .expect("accepted link")
        .is_closed_by_client());
    assert_eq!(
        *lock_unpoisoned(&history),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ]
    );
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn start_is_a_no_op_while_reconnecting() {
    let connector = MockConnector::refusing("backend down");
    let store = SessionStore::new();
    let manager = manager_with(&connector, FixedDelay::default(), &store);

    manager.start();
    settle().await;

    assert!(!manager.start());
    settle().await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(manager.status().state, ConnectionState::Reconnecting);
}

#[tokio::test(start_paused = true)]
async fn subscriber_can_send_as_soon_as_the_stream_connects() {
    let connector = MockConnector::accepting();
    let store = SessionStore::new();
    let manager = manager_with(&connector, FixedDelay::default(), &store);
    let results = Arc::new(std::sync::Mutex::new(Vec::new()));

    let _resync = store.subscribe({
        let manager = manager.clone();
        let results = Arc::clone(&results);
        move |_, state| {
            if state.connection.state == ConnectionState::Connected {
                let sent = manager.send(OutboundMessage::code_update(state.code.clone()));
                lock_unpoisoned(&results).push(sent);
            }
        }
    });

    store.set_code("x = 1");
    assert!(manager.start());
    settle().await;

    assert_eq!(manager.status(), ConnectionStatus::new(ConnectionState::Connected));
    assert_eq!(*lock_unpoisoned(&results), vec![Ok(())]);
    assert_eq!(
        connector.latest_link().expect("accepted link").sent(),
        vec![r#"{"type":"code_update","content":"x = 1"}"#.to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn subscriber_reading_status_during_stop_does_not_block() {
    let connector = MockConnector::accepting();
    let store = SessionStore::new();
    let manager = manager_with(&connector, FixedDelay::default(), &store);
    let observed = Arc::new(std::sync::Mutex::new(Vec::new()));

    let _observer = store.subscribe({
        let manager = manager.clone();
        let observed = Arc::clone(&observed);
        move |_, _| {
            let status = manager.status();
            let send = manager.send(OutboundMessage::code_update("resync"));
            lock_unpoisoned(&observed).push((status.state, send.is_ok()));
        }
    });

    manager.start();
    settle().await;
    manager.stop();

    assert_eq!(
        *lock_unpoisoned(&observed),
        vec![
            (ConnectionState::Connecting, false),
            (ConnectionState::Connected, true),
            (ConnectionState::Disconnected, false),
        ]
    );
}
