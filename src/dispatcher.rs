//! Trailing-edge debounce for outbound code-sync frames.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use assist_api::OutboundMessage;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use crate::error::{SendError, SessionError};
use crate::lock_unpoisoned;
use crate::state::{SessionStore, StateChange, Subscription};

/// Default quiet period between the last edit and the code-sync send.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(400);

/// Destination of debounced frames.
pub trait OutboundSink: Send + Sync + 'static {
    fn send(&self, message: OutboundMessage) -> Result<(), SendError>;
}

struct PendingUpdate {
    generation: u64,
    task: JoinHandle<()>,
}

struct DispatcherInner {
    sink: Arc<dyn OutboundSink>,
    quiet_period: Duration,
    runtime: Handle,
    pending: Mutex<Option<PendingUpdate>>,
    generation: AtomicU64,
}

/// Holds at most one pending timer. Every `notify` restarts it, so only the
/// last value of a burst is sent.
#[derive(Clone)]
pub struct UpdateDispatcher {
    inner: Arc<DispatcherInner>,
}

impl fmt::Debug for UpdateDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateDispatcher")
            .field("quiet_period", &self.inner.quiet_period)
            .field("has_pending", &self.has_pending())
            .finish()
    }
}

impl UpdateDispatcher {
    pub fn new(sink: Arc<dyn OutboundSink>, quiet_period: Duration) -> Result<Self, SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        Ok(Self {
            inner: Arc::new(DispatcherInner {
                sink,
                quiet_period,
                runtime,
                pending: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        })
    }

    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet_period
    }

    /// Schedules a code-sync frame carrying `code`, replacing any pending one.
    pub fn notify(&self, code: impl Into<String>) {
        self.inner.notify(code.into());
    }

    /// Discards the pending timer, if any.
    pub fn cancel(&self) {
        if let Some(pending) = lock_unpoisoned(&self.inner.pending).take() {
            pending.task.abort();
            debug!("pending code update cancelled");
        }
    }

    pub fn has_pending(&self) -> bool {
        lock_unpoisoned(&self.inner.pending).is_some()
    }

    /// Feeds every code change of `store` into this dispatcher.
    pub fn attach(&self, store: &SessionStore) -> Subscription {
        let dispatcher: Weak<DispatcherInner> = Arc::downgrade(&self.inner);
        store.subscribe(move |change, state| {
            if change != StateChange::Code {
                return;
            }
            if let Some(dispatcher) = dispatcher.upgrade() {
                dispatcher.notify(state.code.clone());
            }
        })
    }
}

impl DispatcherInner {
    fn notify(self: &Arc<Self>, code: String) {
        let mut pending = lock_unpoisoned(&self.pending);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = pending.take() {
            previous.task.abort();
        }

        let dispatcher = Arc::clone(self);
        let task = self.runtime.spawn(
            async move {
                tokio::time::sleep(dispatcher.quiet_period).await;
                dispatcher.fire(generation, code);
            }
            .in_current_span(),
        );
        *pending = Some(PendingUpdate { generation, task });
    }

    fn fire(&self, generation: u64, code: String) {
        {
            let mut pending = lock_unpoisoned(&self.pending);
            match pending.as_ref() {
                Some(current) if current.generation == generation => {
                    pending.take();
                }
                _ => return,
            }
        }

        let len = code.len();
        match self.sink.send(OutboundMessage::code_update(code)) {
            Ok(()) => debug!(len, "code update sent"),
            Err(error) => debug!(%error, len, "code update dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use assist_api::OutboundMessage;

    use super::{OutboundSink, UpdateDispatcher};
    use crate::error::SendError;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<OutboundMessage>>,
    }

    impl OutboundSink for RecordingSink {
        fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
            self.sent.lock().expect("sink lock").push(message);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_timer() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher =
            UpdateDispatcher::new(sink.clone(), Duration::from_millis(300)).expect("runtime");

        dispatcher.notify("draft");
        assert!(dispatcher.has_pending());

        dispatcher.cancel();
        assert!(!dispatcher.has_pending());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sink.sent.lock().expect("sink lock").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fired_timer_clears_pending_state() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher =
            UpdateDispatcher::new(sink.clone(), Duration::from_millis(300)).expect("runtime");

        dispatcher.notify("x = 1");
        tokio::time::sleep(Duration::from_millis(301)).await;

        assert!(!dispatcher.has_pending());
        assert_eq!(
            *sink.sent.lock().expect("sink lock"),
            vec![OutboundMessage::code_update("x = 1")]
        );
    }
}
