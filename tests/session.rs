mod support;

use std::sync::Arc;
use std::time::Duration;

use assist_channel_mock::{MockConnector, MOCK_ENDPOINT};
use assist_session::{
    ConnectionState, DetailLevel, RequestOutcome, Session, SessionConfig, SessionError,
};
use pretty_assertions::assert_eq;
use tokio::time::sleep;

use support::{settle, success_response, MockBackend};

fn config() -> SessionConfig {
    SessionConfig::default().with_debounce(Duration::from_millis(300))
}

fn session_with(config: SessionConfig) -> (Session, MockConnector, Arc<MockBackend>) {
    let connector = MockConnector::accepting();
    let backend = MockBackend::new();
    let session = Session::with_transports(config, Arc::new(connector.clone()), backend.clone())
        .expect("inside runtime");
    (session, connector, backend)
}

fn code_update(content: &str) -> String {
    format!(r#"{{"type":"code_update","content":"{content}"}}"#)
}

#[tokio::test(start_paused = true)]
async fn edits_are_debounced_onto_the_stream() {
    let (session, connector, _backend) = session_with(config());
    assert!(session.start());
    settle().await;
    assert_eq!(
        session.store().connection_status().state,
        ConnectionState::Connected
    );
    assert_eq!(session.connection().endpoint(), MOCK_ENDPOINT);

    session.edit("a");
    sleep(Duration::from_millis(100)).await;
    session.edit("ab");
    sleep(Duration::from_millis(301)).await;

    let link = connector.latest_link().expect("accepted link");
    assert_eq!(link.sent(), vec![code_update("ab")]);
    assert_eq!(session.store().code(), "ab");
}

#[tokio::test(start_paused = true)]
async fn applying_a_suggestion_replaces_code_and_sends_it() {
    let (session, connector, _backend) = session_with(config());
    session.start();
    settle().await;

    session.edit("x=1");
    session.apply_suggestion("x = 1");
    sleep(Duration::from_millis(301)).await;

    assert_eq!(session.store().code(), "x = 1");
    assert_eq!(
        connector.latest_link().expect("accepted link").sent(),
        vec![code_update("x = 1")]
    );
}

#[tokio::test(start_paused = true)]
async fn edit_while_disconnected_is_not_queued() {
    let (session, connector, _backend) = session_with(config());

    session.edit("offline edit");
    sleep(Duration::from_millis(500)).await;
    assert!(!session.dispatcher().has_pending());

    session.start();
    settle().await;
    sleep(Duration::from_secs(1)).await;

    assert!(connector.latest_link().expect("accepted link").sent().is_empty());
    assert_eq!(session.store().code(), "offline edit");
}

#[tokio::test(start_paused = true)]
async fn run_and_explain_use_current_code_and_configured_level() {
    let (session, _connector, backend) =
        session_with(config().with_detail_level(DetailLevel::Detailed));
    backend.push_execute(Duration::ZERO, Ok(success_response("1\n", 0.01)));
    backend.push_explain(Duration::ZERO, Ok("Prints one."));
    backend.push_explain(Duration::ZERO, Ok("Short."));

    session.edit("print(1)");
    assert_eq!(
        session.run().await.expect("join"),
        Some(RequestOutcome::Applied)
    );
    assert_eq!(
        session.explain().await.expect("join"),
        Some(RequestOutcome::Applied)
    );
    assert_eq!(
        session.explain_with(DetailLevel::Basic).await.expect("join"),
        Some(RequestOutcome::Applied)
    );

    assert_eq!(backend.execute_requests()[0].code, "print(1)");
    let levels: Vec<DetailLevel> = backend
        .explain_requests()
        .iter()
        .map(|request| request.detail_level)
        .collect();
    assert_eq!(levels, vec![DetailLevel::Detailed, DetailLevel::Basic]);
    assert_eq!(session.store().suggestions().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_everything_and_ignores_late_responses() {
    let (session, connector, backend) = session_with(config());
    backend.push_execute(Duration::from_millis(500), Ok(success_response("late\n", 0.5)));
    session.start();
    settle().await;

    session.edit("pending edit");
    let request = session.run();
    settle().await;
    assert!(session.dispatcher().has_pending());
    assert_eq!(session.orchestrator().pending_requests().len(), 1);

    session.shutdown();
    assert!(session.is_shut_down());
    assert!(!session.dispatcher().has_pending());
    assert_eq!(
        session.store().connection_status().state,
        ConnectionState::Disconnected
    );
    assert_eq!(request.await.expect("join"), None);

    sleep(Duration::from_secs(1)).await;
    let link = connector.latest_link().expect("accepted link");
    assert!(link.is_closed_by_client());
    assert!(link.sent().is_empty(), "pending debounce was cancelled");
    assert_eq!(session.store().last_execution(), None);

    session.shutdown();
    assert!(!session.start(), "shut down sessions stay down");
    sleep(Duration::from_secs(10)).await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_releases_the_channel() {
    let (session, connector, _backend) = session_with(config());
    session.start();
    settle().await;

    drop(session);
    settle().await;

    assert!(connector
        .latest_link()
        .expect("accepted link")
        .is_closed_by_client());
}

#[test]
fn sessions_require_a_runtime() {
    let result = Session::with_transports(
        config(),
        Arc::new(MockConnector::accepting()),
        MockBackend::new(),
    );
    assert!(matches!(result, Err(SessionError::NoRuntime)));
}

#[tokio::test]
async fn unsupported_backend_scheme_is_rejected() {
    let result = Session::new(SessionConfig::new("ftp://example.com"));
    assert!(matches!(result, Err(SessionError::Api(_))));
}

#[tokio::test]
async fn default_session_streams_from_local_backend() {
    let session = Session::new(SessionConfig::default()).expect("valid default config");
    assert_eq!(
        session.connection().endpoint(),
        "ws://localhost:8000/ws/code-suggestions"
    );
    assert_eq!(session.detail_level(), DetailLevel::Medium);
}
