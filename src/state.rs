//! Session state store.
//!
//! The store is the single owner of [`SessionState`]. Every mutation goes
//! through one of its methods, bumps [`SessionState::version`], and then
//! notifies subscribers synchronously with the post-mutation state.
//! Notifications are delivered in mutation order.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use assist_api::{ExecuteResponse, ExecutionStatus};
use serde::Serialize;
use tracing::debug;

use crate::lock_unpoisoned;

/// Lifecycle state of the streaming channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state,
            last_error: None,
        }
    }

    pub fn with_error(state: ConnectionState, error: impl Into<String>) -> Self {
        Self {
            state,
            last_error: Some(error.into()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Explanation,
    Recommendation,
    Error,
}

/// One entry of the suggestion feed. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub content: String,
}

impl Suggestion {
    pub fn new(kind: SuggestionKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn explanation(content: impl Into<String>) -> Self {
        Self::new(SuggestionKind::Explanation, content)
    }

    pub fn recommendation(content: impl Into<String>) -> Self {
        Self::new(SuggestionKind::Recommendation, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(SuggestionKind::Error, content)
    }
}

/// Outcome of the most recent code execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub execution_time_seconds: Option<f64>,
}

impl ExecutionResult {
    /// Result recorded when the execute request itself failed.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            output: None,
            error: Some(message.into()),
            execution_time_seconds: None,
        }
    }
}

impl From<ExecuteResponse> for ExecutionResult {
    fn from(response: ExecuteResponse) -> Self {
        Self {
            status: response.status,
            output: response.output,
            error: response.error,
            execution_time_seconds: response.execution_time,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub code: String,
    pub connection: ConnectionStatus,
    pub suggestions: Vec<Suggestion>,
    pub last_execution: Option<ExecutionResult>,
    /// Bumped once per applied mutation.
    pub version: u64,
}

/// Which part of the state a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChange {
    Code,
    Connection,
    SuggestionAppended,
    ExecutionResult,
}

type Subscriber = Arc<dyn Fn(StateChange, &SessionState) + Send + Sync>;

struct StoreInner {
    state: Mutex<Arc<SessionState>>,
    subscribers: Mutex<Vec<(u64, Subscriber)>>,
    // Held across mutate + notify so notifications keep mutation order.
    order: Mutex<()>,
    next_subscriber_id: AtomicU64,
    closed: AtomicBool,
}

/// Shared handle to the session state. Cloning is cheap.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("version", &self.snapshot().version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(Arc::new(SessionState::default())),
                subscribers: Mutex::new(Vec::new()),
                order: Mutex::new(()),
                next_subscriber_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Current state. The returned value never changes; take a new snapshot
    /// to observe later mutations.
    pub fn snapshot(&self) -> Arc<SessionState> {
        Arc::clone(&lock_unpoisoned(&self.inner.state))
    }

    pub fn code(&self) -> String {
        self.snapshot().code.clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.snapshot().connection.clone()
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.snapshot().suggestions.clone()
    }

    pub fn last_execution(&self) -> Option<ExecutionResult> {
        self.snapshot().last_execution.clone()
    }

    /// Registers `callback` for every subsequent mutation.
    ///
    /// Callbacks run on the mutating thread while the store serializes
    /// notifications, so they may read the store but must not mutate it.
    /// Holding no other lock, they may hand frames to
    /// [`crate::ConnectionManager::send`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(StateChange, &SessionState) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        if !self.is_closed() {
            lock_unpoisoned(&self.inner.subscribers).push((id, Arc::new(callback)));
        }

        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn set_code(&self, code: impl Into<String>) -> bool {
        let code = code.into();
        self.mutate(StateChange::Code, |state| {
            state.code = code;
            true
        })
    }

    /// Replaces the code with a suggestion's content. Equivalent to an edit.
    pub fn apply_suggestion(&self, content: impl Into<String>) -> bool {
        self.set_code(content)
    }

    /// Only the connection manager moves the connection state machine.
    ///
    /// Writes `status` only if `still_current` returns true. The check runs
    /// in mutation order, so no other write can land between it and the
    /// write. `still_current` runs before subscribers are notified and must
    /// not touch the store.
    pub(crate) fn set_connection_status(
        &self,
        status: ConnectionStatus,
        still_current: impl FnOnce() -> bool,
    ) -> bool {
        self.mutate_if(StateChange::Connection, still_current, |state| {
            if state.connection == status {
                return false;
            }
            state.connection = status;
            true
        })
    }

    pub fn append_suggestion(&self, suggestion: Suggestion) -> bool {
        self.mutate(StateChange::SuggestionAppended, |state| {
            state.suggestions.push(suggestion);
            true
        })
    }

    pub fn set_execution_result(&self, result: ExecutionResult) -> bool {
        self.mutate(StateChange::ExecutionResult, |state| {
            state.last_execution = Some(result);
            true
        })
    }

    /// Ends the session: drops all subscribers and ignores later mutations.
    pub fn close(&self) {
        let _order = lock_unpoisoned(&self.inner.order);
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        lock_unpoisoned(&self.inner.subscribers).clear();
        debug!("session store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn mutate(&self, change: StateChange, apply: impl FnOnce(&mut SessionState) -> bool) -> bool {
        self.mutate_if(change, || true, apply)
    }

    fn mutate_if(
        &self,
        change: StateChange,
        precondition: impl FnOnce() -> bool,
        apply: impl FnOnce(&mut SessionState) -> bool,
    ) -> bool {
        let _order = lock_unpoisoned(&self.inner.order);
        if !precondition() {
            return false;
        }
        if self.is_closed() {
            debug!(?change, "ignoring mutation on closed store");
            return false;
        }

        let snapshot = {
            let mut current = lock_unpoisoned(&self.inner.state);
            let state = Arc::make_mut(&mut current);
            if !apply(state) {
                return false;
            }
            state.version += 1;
            Arc::clone(&current)
        };

        let subscribers: Vec<Subscriber> = lock_unpoisoned(&self.inner.subscribers)
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(change, &snapshot);
        }

        true
    }
}

/// Keeps a subscriber registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: u64,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            lock_unpoisoned(&store.subscribers).retain(|(id, _)| *id != self.id);
        }
    }
}
