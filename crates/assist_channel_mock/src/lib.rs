//! Deterministic scripted implementation of the `assist_channel` contract.
//!
//! This crate contains no network logic and is intended for session-level
//! tests and offline runs. Each connect attempt consumes one scripted step;
//! every accepted attempt yields a [`MockLink`] through which the test plays
//! the server side.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use assist_channel::{Channel, Connector, TransportError};
use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Stable endpoint reported by the mock connector.
pub const MOCK_ENDPOINT: &str = "mock://assist";

/// Outcome of one scripted connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStep {
    Accept,
    Refuse(String),
}

#[derive(Debug)]
enum ServerEvent {
    Frame(String),
    Close,
    Fail(String),
}

#[derive(Debug, Default)]
struct LinkState {
    sent: Vec<String>,
    closed_by_client: bool,
}

/// Server-side handle of one accepted mock channel.
#[derive(Debug, Clone)]
pub struct MockLink {
    inbound: UnboundedSender<ServerEvent>,
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    /// Delivers one text frame to the client.
    pub fn push_frame(&self, frame: impl Into<String>) {
        let _ = self.inbound.send(ServerEvent::Frame(frame.into()));
    }

    /// Closes the channel cleanly from the server side.
    pub fn close(&self) {
        let _ = self.inbound.send(ServerEvent::Close);
    }

    /// Breaks the channel with a transport error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.inbound.send(ServerEvent::Fail(reason.into()));
    }

    /// Frames the client has sent on this channel, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        lock_unpoisoned(&self.state).sent.clone()
    }

    #[must_use]
    pub fn is_closed_by_client(&self) -> bool {
        lock_unpoisoned(&self.state).closed_by_client
    }
}

#[derive(Debug)]
struct ConnectorState {
    script: VecDeque<ConnectStep>,
    fallback: ConnectStep,
    attempts: usize,
    links: Vec<MockLink>,
}

/// Scripted connector. Cloning shares the script and observed links.
#[derive(Debug, Clone)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    /// Plays `script` in order, then repeats `fallback` for later attempts.
    #[must_use]
    pub fn scripted(script: Vec<ConnectStep>, fallback: ConnectStep) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectorState {
                script: script.into(),
                fallback,
                attempts: 0,
                links: Vec::new(),
            })),
        }
    }

    /// Accepts every connect attempt.
    #[must_use]
    pub fn accepting() -> Self {
        Self::scripted(Vec::new(), ConnectStep::Accept)
    }

    /// Refuses every connect attempt with `reason`.
    #[must_use]
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self::scripted(Vec::new(), ConnectStep::Refuse(reason.into()))
    }

    /// Number of connect attempts observed so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        lock_unpoisoned(&self.state).attempts
    }

    /// Server handles of accepted channels, oldest first.
    #[must_use]
    pub fn links(&self) -> Vec<MockLink> {
        lock_unpoisoned(&self.state).links.clone()
    }

    #[must_use]
    pub fn latest_link(&self) -> Option<MockLink> {
        lock_unpoisoned(&self.state).links.last().cloned()
    }

    /// All frames sent by the client across every accepted channel.
    #[must_use]
    pub fn all_sent(&self) -> Vec<String> {
        self.links().iter().flat_map(MockLink::sent).collect()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::accepting()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn endpoint(&self) -> String {
        MOCK_ENDPOINT.to_string()
    }

    async fn connect(&self) -> Result<Box<dyn Channel>, TransportError> {
        let mut state = lock_unpoisoned(&self.state);
        state.attempts += 1;

        let step = state
            .script
            .pop_front()
            .unwrap_or_else(|| state.fallback.clone());

        match step {
            ConnectStep::Refuse(reason) => Err(TransportError::Connect(reason)),
            ConnectStep::Accept => {
                let (inbound_tx, inbound_rx) = unbounded_channel();
                let link_state = Arc::new(Mutex::new(LinkState::default()));
                state.links.push(MockLink {
                    inbound: inbound_tx,
                    state: Arc::clone(&link_state),
                });

                Ok(Box::new(MockChannel {
                    inbound: inbound_rx,
                    state: link_state,
                    finished: false,
                }))
            }
        }
    }
}

/// Client side of an accepted mock channel.
#[derive(Debug)]
pub struct MockChannel {
    inbound: UnboundedReceiver<ServerEvent>,
    state: Arc<Mutex<LinkState>>,
    finished: bool,
}

#[async_trait]
impl Channel for MockChannel {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.finished {
            return Err(TransportError::Closed);
        }

        let mut state = lock_unpoisoned(&self.state);
        if state.closed_by_client {
            return Err(TransportError::Closed);
        }
        state.sent.push(text);
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<Result<String, TransportError>> {
        if self.finished {
            return None;
        }

        match self.inbound.recv().await {
            Some(ServerEvent::Frame(frame)) => Some(Ok(frame)),
            Some(ServerEvent::Fail(reason)) => {
                self.finished = true;
                Some(Err(TransportError::Receive(reason)))
            }
            Some(ServerEvent::Close) | None => {
                self.finished = true;
                None
            }
        }
    }

    async fn close(&mut self) {
        self.finished = true;
        lock_unpoisoned(&self.state).closed_by_client = true;
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
