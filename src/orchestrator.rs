//! Execute/explain request orchestration.
//!
//! Requests are independent of the streaming channel. Every outcome, success
//! or failure, is folded into session state; errors never escape.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use assist_api::{
    ApiError, AssistApiClient, DetailLevel, ExecuteRequest, ExecuteResponse, ExplainRequest,
    ExplainResponse,
};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::lock_unpoisoned;
use crate::state::{ExecutionResult, SessionStore, Suggestion};

/// Recorded as `ExecutionResult.error` when the execute call fails.
pub const EXECUTION_FAILED: &str = "execution failed";
/// Appended as an error suggestion when the explain call fails.
pub const EXPLANATION_FAILED: &str = "explanation failed";

/// Identifier for one orchestrated request.
pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Execute,
    Explain,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Explain => "explain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub started_at: Instant,
}

/// What a request did to session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Applied,
    Failed,
    /// Skipped without I/O because a request of the same kind was pending.
    Suppressed,
}

/// Request/response endpoints of the assistant backend.
#[async_trait]
pub trait AssistBackend: Send + Sync + 'static {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse, ApiError>;

    async fn explain(&self, request: ExplainRequest) -> Result<ExplainResponse, ApiError>;
}

#[async_trait]
impl AssistBackend for AssistApiClient {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse, ApiError> {
        AssistApiClient::execute(self, &request).await
    }

    async fn explain(&self, request: ExplainRequest) -> Result<ExplainResponse, ApiError> {
        AssistApiClient::explain(self, &request).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Server-side execution timeout sent with execute requests.
    pub execute_timeout_sec: Option<u64>,
    /// Suppress a request while another of the same kind is pending.
    pub single_flight: bool,
}

pub struct RequestOrchestrator {
    backend: Arc<dyn AssistBackend>,
    store: SessionStore,
    options: OrchestratorOptions,
    next_request_id: AtomicU64,
    pending: Mutex<Vec<PendingRequest>>,
}

impl fmt::Debug for RequestOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOrchestrator")
            .field("options", &self.options)
            .field("pending", &self.pending_requests())
            .finish()
    }
}

impl RequestOrchestrator {
    pub fn new(
        backend: Arc<dyn AssistBackend>,
        store: SessionStore,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            backend,
            store,
            options,
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn options(&self) -> OrchestratorOptions {
        self.options
    }

    /// Runs `code` on the backend and replaces the last execution result.
    ///
    /// Overlapping calls are not correlated; the last response to arrive wins.
    pub async fn execute(&self, code: impl Into<String>) -> RequestOutcome {
        let code = code.into();
        let Some(pending) = self.begin(RequestKind::Execute) else {
            return RequestOutcome::Suppressed;
        };

        let mut request = ExecuteRequest::new(code);
        if let Some(timeout_sec) = self.options.execute_timeout_sec {
            request = request.with_timeout(timeout_sec);
        }
        let result = self.backend.execute(request).await;
        let elapsed_ms = pending.elapsed_ms();

        match result {
            Ok(response) => {
                info!(
                    request_id = pending.id,
                    elapsed_ms,
                    status = response.status.as_str(),
                    "execute completed"
                );
                self.store.set_execution_result(response.into());
                RequestOutcome::Applied
            }
            Err(error) => {
                warn!(request_id = pending.id, elapsed_ms, %error, "execute failed");
                self.store
                    .set_execution_result(ExecutionResult::failed(EXECUTION_FAILED));
                RequestOutcome::Failed
            }
        }
    }

    /// Asks the backend to explain `code` and appends exactly one suggestion.
    pub async fn explain(&self, code: impl Into<String>, detail_level: DetailLevel) -> RequestOutcome {
        let code = code.into();
        let Some(pending) = self.begin(RequestKind::Explain) else {
            return RequestOutcome::Suppressed;
        };

        let result = self
            .backend
            .explain(ExplainRequest::new(code, detail_level))
            .await;
        let elapsed_ms = pending.elapsed_ms();

        match result {
            Ok(response) => {
                info!(
                    request_id = pending.id,
                    elapsed_ms,
                    detail_level = detail_level.as_str(),
                    "explain completed"
                );
                self.store
                    .append_suggestion(Suggestion::explanation(response.explanation));
                RequestOutcome::Applied
            }
            Err(error) => {
                warn!(request_id = pending.id, elapsed_ms, %error, "explain failed");
                self.store
                    .append_suggestion(Suggestion::error(EXPLANATION_FAILED));
                RequestOutcome::Failed
            }
        }
    }

    /// Requests currently in flight, oldest first.
    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        lock_unpoisoned(&self.pending).clone()
    }

    fn begin(&self, kind: RequestKind) -> Option<PendingGuard<'_>> {
        let mut pending = lock_unpoisoned(&self.pending);
        if self.options.single_flight && pending.iter().any(|request| request.kind == kind) {
            debug!(kind = kind.as_str(), "request suppressed; same kind already pending");
            return None;
        }

        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let started_at = Instant::now();
        pending.push(PendingRequest {
            id,
            kind,
            started_at,
        });
        debug!(request_id = id, kind = kind.as_str(), "request started");

        Some(PendingGuard {
            pending: &self.pending,
            id,
            started_at,
        })
    }
}

/// Removes its request from the pending list on completion or cancellation.
struct PendingGuard<'a> {
    pending: &'a Mutex<Vec<PendingRequest>>,
    id: RequestId,
    started_at: Instant,
}

impl PendingGuard<'_> {
    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock_unpoisoned(self.pending).retain(|request| request.id != self.id);
    }
}
