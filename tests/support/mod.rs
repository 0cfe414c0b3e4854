#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use assist_api::{
    ApiError, ExecuteRequest, ExecuteResponse, ExecutionStatus, ExplainRequest, ExplainResponse,
};
use assist_session::{
    AssistBackend, ConnectionState, OutboundMessage, OutboundSink, SendError, SessionStore,
    StateChange, Subscription,
};
use async_trait::async_trait;

/// Lets spawned tasks run, then advances paused time by one millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn success_response(output: &str, execution_time: f64) -> ExecuteResponse {
    ExecuteResponse {
        status: ExecutionStatus::Success,
        output: Some(output.to_string()),
        error: None,
        execution_time: Some(execution_time),
    }
}

/// Connection states observed by a store subscriber, in notification order.
pub fn record_connection_states(
    store: &SessionStore,
) -> (Arc<Mutex<Vec<ConnectionState>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = store.subscribe(move |change, state| {
        if change == StateChange::Connection {
            lock_unpoisoned(&sink).push(state.connection.state);
        }
    });
    (seen, subscription)
}

type Reply<T> = (Duration, Result<T, String>);

/// Scripted backend. Replies are consumed in call order; each waits for its
/// delay before resolving. An exhausted script fails the call.
#[derive(Default)]
pub struct MockBackend {
    execute_replies: Mutex<VecDeque<Reply<ExecuteResponse>>>,
    explain_replies: Mutex<VecDeque<Reply<String>>>,
    execute_requests: Mutex<Vec<ExecuteRequest>>,
    explain_requests: Mutex<Vec<ExplainRequest>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_execute(&self, delay: Duration, reply: Result<ExecuteResponse, &str>) {
        lock_unpoisoned(&self.execute_replies)
            .push_back((delay, reply.map_err(ToString::to_string)));
    }

    pub fn push_explain(&self, delay: Duration, reply: Result<&str, &str>) {
        lock_unpoisoned(&self.explain_replies).push_back((
            delay,
            reply.map(ToString::to_string).map_err(ToString::to_string),
        ));
    }

    pub fn execute_requests(&self) -> Vec<ExecuteRequest> {
        lock_unpoisoned(&self.execute_requests).clone()
    }

    pub fn explain_requests(&self) -> Vec<ExplainRequest> {
        lock_unpoisoned(&self.explain_requests).clone()
    }
}

#[async_trait]
impl AssistBackend for MockBackend {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse, ApiError> {
        lock_unpoisoned(&self.execute_requests).push(request);
        let reply = lock_unpoisoned(&self.execute_replies).pop_front();
        let (delay, reply) =
            reply.unwrap_or((Duration::ZERO, Err("no scripted execute reply".to_string())));
        tokio::time::sleep(delay).await;
        reply.map_err(ApiError::Decode)
    }

    async fn explain(&self, request: ExplainRequest) -> Result<ExplainResponse, ApiError> {
        lock_unpoisoned(&self.explain_requests).push(request);
        let reply = lock_unpoisoned(&self.explain_replies).pop_front();
        let (delay, reply) =
            reply.unwrap_or((Duration::ZERO, Err("no scripted explain reply".to_string())));
        tokio::time::sleep(delay).await;
        reply
            .map(|explanation| ExplainResponse { explanation })
            .map_err(ApiError::Decode)
    }
}

/// Outbound sink that records every send attempt.
#[derive(Default)]
pub struct RecordingSink {
    disconnected: Mutex<bool>,
    attempts: Mutex<Vec<OutboundMessage>>,
    delivered: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_disconnected(&self, disconnected: bool) {
        *lock_unpoisoned(&self.disconnected) = disconnected;
    }

    pub fn attempts(&self) -> Vec<OutboundMessage> {
        lock_unpoisoned(&self.attempts).clone()
    }

    pub fn delivered(&self) -> Vec<OutboundMessage> {
        lock_unpoisoned(&self.delivered).clone()
    }
}

impl OutboundSink for RecordingSink {
    fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
        lock_unpoisoned(&self.attempts).push(message.clone());
        if *lock_unpoisoned(&self.disconnected) {
            return Err(SendError::NotConnected(ConnectionState::Reconnecting));
        }
        lock_unpoisoned(&self.delivered).push(message);
        Ok(())
    }
}
