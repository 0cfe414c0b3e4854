//! Client-side session coordination for an interactive coding assistant.
//!
//! A user edits code; edits are streamed to the backend over a persistent
//! channel to receive suggestions, while execute/explain are discrete
//! request/response calls. This crate owns the coordination between them:
//!
//! - [`SessionStore`] is the single owner of observable [`SessionState`].
//! - [`ConnectionManager`] runs the streaming channel state machine
//!   (`Disconnected -> Connecting -> Connected`, `Reconnecting` on failure).
//! - [`UpdateDispatcher`] debounces outbound code-sync frames.
//! - [`RequestOrchestrator`] maps execute/explain outcomes onto state.
//! - [`Session`] wires them together and accepts presentation intents.
//!
//! Transports live in sibling crates: `assist_api` (HTTP + frame codec) and
//! `assist_channel` (streaming channel contract + WebSocket).

use std::sync::{Mutex, MutexGuard};

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod reconnect;
pub mod session;
pub mod state;

pub use crate::config::{ConfigError, EnvConfig, SessionConfig};
pub use crate::connection::{ConnectionManager, CLOSED_BY_PEER};
pub use crate::dispatcher::{OutboundSink, UpdateDispatcher, DEFAULT_QUIET_PERIOD};
pub use crate::error::{SendError, SessionError};
pub use crate::logging::{init_logging, LogConfig, LogError};
pub use crate::orchestrator::{
    AssistBackend, OrchestratorOptions, PendingRequest, RequestId, RequestKind,
    RequestOrchestrator, RequestOutcome, EXECUTION_FAILED, EXPLANATION_FAILED,
};
pub use crate::reconnect::{ExponentialBackoff, FixedDelay, ReconnectPolicy, ReconnectStrategy};
pub use crate::session::Session;
pub use crate::state::{
    ConnectionState, ConnectionStatus, ExecutionResult, SessionState, SessionStore, StateChange,
    Subscription, Suggestion, SuggestionKind,
};

pub use assist_api::{DetailLevel, ExecutionStatus, OutboundMessage};

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
