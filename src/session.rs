//! Session composition root.
//!
//! A [`Session`] wires the store, connection manager, update dispatcher and
//! request orchestrator together and turns presentation intents into calls on
//! them. It must be created inside a Tokio runtime.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use assist_api::{AssistApiClient, DetailLevel};
use assist_channel::{Connector, WsConnector};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument, Span};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::connection::ConnectionManager;
use crate::dispatcher::UpdateDispatcher;
use crate::error::SessionError;
use crate::lock_unpoisoned;
use crate::orchestrator::{AssistBackend, RequestOrchestrator, RequestOutcome};
use crate::state::{SessionStore, Subscription};

pub struct Session {
    id: Uuid,
    span: Span,
    detail_level: DetailLevel,
    runtime: Handle,
    store: SessionStore,
    connection: ConnectionManager,
    dispatcher: UpdateDispatcher,
    orchestrator: Arc<RequestOrchestrator>,
    requests: CancellationToken,
    code_feed: Mutex<Option<Subscription>>,
    shut_down: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Session {
    /// Builds a session with the WebSocket stream and HTTP backend described
    /// by `config`.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let id = Uuid::new_v4();
        let client = AssistApiClient::new(config.api_config(&id.to_string()))?;
        let stream_url = config
            .stream_url
            .clone()
            .unwrap_or_else(|| client.stream_url());

        let mut connector =
            WsConnector::new(stream_url).with_header("x-session-id", id.to_string());
        if let Some(token) = config.access_token.as_deref().map(str::trim) {
            if !token.is_empty() {
                connector = connector.with_header("authorization", format!("Bearer {token}"));
            }
        }

        Self::build(id, config, Arc::new(connector), Arc::new(client))
    }

    /// Builds a session over caller-supplied transports.
    pub fn with_transports(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        backend: Arc<dyn AssistBackend>,
    ) -> Result<Self, SessionError> {
        Self::build(Uuid::new_v4(), config, connector, backend)
    }

    fn build(
        id: Uuid,
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        backend: Arc<dyn AssistBackend>,
    ) -> Result<Self, SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let span = info_span!("session", session_id = %id);
        let entered = span.enter();

        let store = SessionStore::new();
        let connection =
            ConnectionManager::new(connector, Arc::new(config.reconnect), store.clone())?;
        let dispatcher = UpdateDispatcher::new(Arc::new(connection.clone()), config.debounce)?;
        let code_feed = dispatcher.attach(&store);
        let orchestrator = Arc::new(RequestOrchestrator::new(
            backend,
            store.clone(),
            config.orchestrator_options(),
        ));

        info!(
            endpoint = %connection.endpoint(),
            debounce_ms = u64::try_from(config.debounce.as_millis()).unwrap_or(u64::MAX),
            "session created"
        );
        drop(entered);

        Ok(Self {
            id,
            span,
            detail_level: config.detail_level,
            runtime,
            store,
            connection,
            dispatcher,
            orchestrator,
            requests: CancellationToken::new(),
            code_feed: Mutex::new(Some(code_feed)),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Starts the streaming connection. Returns false if it was already
    /// running or the session is shut down.
    pub fn start(&self) -> bool {
        let _entered = self.span.enter();
        if self.is_shut_down() {
            return false;
        }
        self.connection.start()
    }

    /// The "code changed" intent.
    pub fn edit(&self, code: impl Into<String>) {
        let _entered = self.span.enter();
        self.store.set_code(code);
    }

    /// The "apply suggestion" intent. Feeds the dispatcher like an edit.
    pub fn apply_suggestion(&self, content: impl Into<String>) {
        let _entered = self.span.enter();
        self.store.apply_suggestion(content);
    }

    /// The "run" intent: executes the current code in the background.
    ///
    /// The task resolves to `None` if the session shuts down first.
    pub fn run(&self) -> JoinHandle<Option<RequestOutcome>> {
        let code = self.store.code();
        let orchestrator = Arc::clone(&self.orchestrator);
        self.spawn_request(async move { orchestrator.execute(code).await })
    }

    /// The "explain" intent at the configured detail level.
    pub fn explain(&self) -> JoinHandle<Option<RequestOutcome>> {
        self.explain_with(self.detail_level)
    }

    pub fn explain_with(&self, detail_level: DetailLevel) -> JoinHandle<Option<RequestOutcome>> {
        let code = self.store.code();
        let orchestrator = Arc::clone(&self.orchestrator);
        self.spawn_request(async move { orchestrator.explain(code, detail_level).await })
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn dispatcher(&self) -> &UpdateDispatcher {
        &self.dispatcher
    }

    pub fn orchestrator(&self) -> &RequestOrchestrator {
        &self.orchestrator
    }

    pub fn detail_level(&self) -> DetailLevel {
        self.detail_level
    }

    /// Tears the session down: stops the connection, cancels the debounce
    /// timer and in-flight requests, and closes the store. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let _entered = self.span.enter();

        self.connection.stop();
        lock_unpoisoned(&self.code_feed).take();
        self.dispatcher.cancel();
        self.requests.cancel();
        self.store.close();
        info!("session shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn spawn_request<F>(&self, request: F) -> JoinHandle<Option<RequestOutcome>>
    where
        F: std::future::Future<Output = RequestOutcome> + Send + 'static,
    {
        let cancel = self.requests.clone();
        self.runtime.spawn(
            async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    outcome = request => Some(outcome),
                }
            }
            .instrument(self.span.clone()),
        )
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
