use serde::{Deserialize, Serialize};

/// Outcome reported by the execute endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
}

impl ExecutionStatus {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "success" => Self::Success,
            "error" => Self::Error,
            "timeout" => Self::Timeout,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

/// Requested depth of a natural-language explanation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Basic,
    #[default]
    Medium,
    Detailed,
}

impl DetailLevel {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Self::Basic,
            "medium" => Self::Medium,
            "detailed" => Self::Detailed,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Medium => "medium",
            Self::Detailed => "detailed",
        }
    }
}

/// Body of `POST /execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecuteRequest {
    pub code: String,
    /// Server-side execution timeout in seconds; the backend default applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl ExecuteRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout_sec: u64) -> Self {
        self.timeout = Some(timeout_sec);
        self
    }
}

/// Response of `POST /execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub status: ExecutionStatus,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub execution_time: Option<f64>,
}

/// Body of `POST /explain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainRequest {
    pub code: String,
    pub detail_level: DetailLevel,
}

impl ExplainRequest {
    pub fn new(code: impl Into<String>, detail_level: DetailLevel) -> Self {
        Self {
            code: code.into(),
            detail_level,
        }
    }
}

/// Response of `POST /explain`. Extra fields sent by the backend are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
}
