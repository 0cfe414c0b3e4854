//! Connection manager for the persistent suggestion stream.
//!
//! One supervisor task per connection cycle owns the channel. It multiplexes
//! outbound frames and inbound frames, and on failure walks
//! `Reconnecting -> Connecting` according to the reconnect policy. Every status
//! write is checked against the lifecycle generation inside the store's
//! mutation order, so a supervisor that lost a race with `stop()` can never
//! write status. The lifecycle lock is never held while subscribers run.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use assist_api::{parse_frame, OutboundMessage, StreamEvent};
use assist_channel::{Channel, Connector, TransportError};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::dispatcher::OutboundSink;
use crate::error::{SendError, SessionError};
use crate::lock_unpoisoned;
use crate::reconnect::ReconnectPolicy;
use crate::state::{ConnectionState, ConnectionStatus, SessionStore, Suggestion};

/// `last_error` recorded when the peer closes the channel cleanly.
pub const CLOSED_BY_PEER: &str = "connection closed";

#[derive(Default)]
struct Lifecycle {
    generation: u64,
    outbound: Option<UnboundedSender<String>>,
    cancel: Option<CancellationToken>,
}

struct ManagerInner {
    connector: Arc<dyn Connector>,
    policy: Arc<dyn ReconnectPolicy>,
    store: SessionStore,
    runtime: Handle,
    lifecycle: Mutex<Lifecycle>,
    connect_attempts: AtomicU64,
}

/// Owns the streaming channel lifecycle. Cloning yields another handle to the
/// same manager.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.connector.endpoint())
            .field("policy", &self.inner.policy)
            .field("status", &self.status())
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager bound to the current Tokio runtime.
    pub fn new(
        connector: Arc<dyn Connector>,
        policy: Arc<dyn ReconnectPolicy>,
        store: SessionStore,
    ) -> Result<Self, SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        Ok(Self {
            inner: Arc::new(ManagerInner {
                connector,
                policy,
                store,
                runtime,
                lifecycle: Mutex::new(Lifecycle::default()),
                connect_attempts: AtomicU64::new(0),
            }),
        })
    }

    /// Begins a connection cycle. Returns false when a cycle is already
    /// running (`Connecting`, `Connected`, or `Reconnecting`).
    pub fn start(&self) -> bool {
        let (generation, cancel) = {
            let mut lifecycle = lock_unpoisoned(&self.inner.lifecycle);
            if lifecycle.cancel.is_some() {
                debug!(status = %self.status().state, "start ignored; connection cycle already running");
                return false;
            }

            lifecycle.generation += 1;
            let cancel = CancellationToken::new();
            lifecycle.cancel = Some(cancel.clone());
            (lifecycle.generation, cancel)
        };
        self.inner.write_status(
            generation,
            ConnectionStatus::new(ConnectionState::Connecting),
            |_| {},
        );

        info!(endpoint = %self.inner.connector.endpoint(), generation, "starting stream connection");
        self.inner
            .runtime
            .spawn(supervise(Arc::clone(&self.inner), generation, cancel).in_current_span());
        true
    }

    /// Tears the connection down: `Disconnected`, channel released, pending
    /// reconnect timer cancelled.
    ///
    /// `stop()` writes the store, so store subscribers must not call it.
    pub fn stop(&self) {
        let (generation, cancel) = {
            let mut lifecycle = lock_unpoisoned(&self.inner.lifecycle);
            lifecycle.generation += 1;
            lifecycle.outbound = None;
            (lifecycle.generation, lifecycle.cancel.take())
        };
        // A `start()` that slipped in after the bump owns the status now.
        self.inner.store.set_connection_status(
            ConnectionStatus::new(ConnectionState::Disconnected),
            || lock_unpoisoned(&self.inner.lifecycle).generation == generation,
        );

        if let Some(cancel) = cancel {
            info!("stopping stream connection");
            cancel.cancel();
        }
    }

    /// Hands `message` to the channel if it is `Connected`; otherwise the
    /// message is dropped and the caller is told why.
    pub fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
        let lifecycle = lock_unpoisoned(&self.inner.lifecycle);
        let state = self.inner.store.connection_status().state;
        let outbound = match (&lifecycle.outbound, state) {
            (Some(outbound), ConnectionState::Connected) => outbound,
            _ => {
                debug!(kind = message.kind(), status = %state, "dropping outbound frame");
                return Err(SendError::NotConnected(state));
            }
        };

        let frame = message
            .to_frame()
            .map_err(|error| SendError::Encode(error.to_string()))?;
        let len = frame.len();
        outbound
            .send(frame)
            .map_err(|_| SendError::NotConnected(ConnectionState::Reconnecting))?;
        debug!(kind = message.kind(), len, "queued outbound frame");
        Ok(())
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.store.connection_status()
    }

    /// Total connect attempts made by this manager, across all cycles.
    pub fn connect_attempts(&self) -> u64 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self) -> String {
        self.inner.connector.endpoint()
    }
}

impl OutboundSink for ConnectionManager {
    fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
        ConnectionManager::send(self, message)
    }
}

enum DriveOutcome {
    Stopped,
    Closed,
    Failed(TransportError),
}

impl ManagerInner {
    /// Applies `update` to the lifecycle and writes `status`, but only while
    /// `generation` is the live cycle. The lifecycle lock is released before
    /// the store notifies subscribers.
    fn write_status(
        &self,
        generation: u64,
        status: ConnectionStatus,
        update: impl FnOnce(&mut Lifecycle),
    ) -> bool {
        let mut current = false;
        self.store.set_connection_status(status, || {
            let mut lifecycle = lock_unpoisoned(&self.lifecycle);
            current = lifecycle.generation == generation && lifecycle.cancel.is_some();
            if current {
                update(&mut lifecycle);
            }
            current
        });
        current
    }

    /// Leaving `Connected` always detaches the outbound queue.
    fn transition(&self, generation: u64, status: ConnectionStatus) -> bool {
        self.write_status(generation, status, |lifecycle| lifecycle.outbound = None)
    }

    fn enter_connected(&self, generation: u64, outbound: UnboundedSender<String>) -> bool {
        self.write_status(
            generation,
            ConnectionStatus::new(ConnectionState::Connected),
            move |lifecycle| lifecycle.outbound = Some(outbound),
        )
    }

    fn give_up(&self, generation: u64, failures: u32, failure: &str) {
        let status = ConnectionStatus::with_error(
            ConnectionState::Disconnected,
            format!("reconnect abandoned after {failures} consecutive failures: {failure}"),
        );
        let gave_up = self.write_status(generation, status, |lifecycle| {
            lifecycle.outbound = None;
            lifecycle.cancel = None;
        });
        if gave_up {
            warn!(failures, error = %failure, "giving up on stream reconnects");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let lifecycle = lock_unpoisoned(&self.lifecycle);
        lifecycle.generation == generation && lifecycle.cancel.is_some()
    }

    fn route_inbound(&self, generation: u64, frame: &str) {
        if !self.is_current(generation) {
            return;
        }

        match parse_frame(frame) {
            Ok(StreamEvent::Suggestions { items }) => {
                debug!(count = items.len(), "received suggestions");
                for item in items {
                    self.store.append_suggestion(Suggestion::recommendation(item));
                }
            }
            Ok(StreamEvent::Explanation { content }) => {
                self.store.append_suggestion(Suggestion::explanation(content));
            }
            Ok(StreamEvent::Error { content }) => {
                self.store.append_suggestion(Suggestion::error(content));
            }
            Ok(StreamEvent::Unknown { event_type }) => {
                debug!(%event_type, "ignoring stream frame of unknown type");
            }
            Err(error) => {
                warn!(%error, len = frame.len(), "dropping malformed stream frame");
            }
        }
    }
}

async fn supervise(inner: Arc<ManagerInner>, generation: u64, cancel: CancellationToken) {
    let mut failures: u32 = 0;

    loop {
        let attempt_number = inner.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = inner.connector.connect() => result,
        };

        let failure = match connected {
            Ok(mut channel) => {
                let (outbound_tx, outbound_rx) = unbounded_channel();
                if !inner.enter_connected(generation, outbound_tx) {
                    channel.close().await;
                    return;
                }
                failures = 0;
                info!(attempt = attempt_number, "stream connected");

                let outcome = drive(&inner, generation, channel.as_mut(), outbound_rx, &cancel).await;
                channel.close().await;
                match outcome {
                    DriveOutcome::Stopped => return,
                    DriveOutcome::Closed => CLOSED_BY_PEER.to_string(),
                    DriveOutcome::Failed(error) => error.to_string(),
                }
            }
            Err(error) => error.to_string(),
        };

        failures = failures.saturating_add(1);
        let Some(delay) = inner.policy.next_delay(failures) else {
            inner.give_up(generation, failures, &failure);
            return;
        };

        if !inner.transition(
            generation,
            ConnectionStatus::with_error(ConnectionState::Reconnecting, failure.clone()),
        ) {
            return;
        }
        warn!(
            error = %failure,
            failures,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "stream lost; scheduling reconnect"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        if !inner.transition(
            generation,
            ConnectionStatus::with_error(ConnectionState::Connecting, failure),
        ) {
            return;
        }
    }
}

async fn drive(
    inner: &ManagerInner,
    generation: u64,
    channel: &mut dyn Channel,
    mut outbound: UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> DriveOutcome {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return DriveOutcome::Stopped,
            Some(frame) = outbound.recv() => {
                if let Err(error) = channel.send_text(frame).await {
                    return DriveOutcome::Failed(error);
                }
            }
            inbound = channel.recv_text() => match inbound {
                None => return DriveOutcome::Closed,
                Some(Err(error)) => return DriveOutcome::Failed(error),
                Some(Ok(frame)) => inner.route_inbound(generation, &frame),
            },
        }
    }
}
