use serde::{Deserialize, Serialize};

/// Wire discriminator of outbound code-sync frames.
pub const CODE_UPDATE_TYPE: &str = "code_update";

/// Frame sent by the client on the streaming channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    CodeUpdate { content: String },
}

impl OutboundMessage {
    pub fn code_update(content: impl Into<String>) -> Self {
        Self::CodeUpdate {
            content: content.into(),
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::CodeUpdate { .. } => CODE_UPDATE_TYPE,
        }
    }
}

/// Inbound frame after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// `{"type":"suggestions","content":[...]}`; a bare string is one item.
    Suggestions { items: Vec<String> },
    Explanation { content: String },
    Error { content: String },
    /// Well-formed frame with a type this client does not consume.
    Unknown { event_type: String },
}

impl StreamEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::Suggestions { .. } => "suggestions",
            Self::Explanation { .. } => "explanation",
            Self::Error { .. } => "error",
            Self::Unknown { event_type } => event_type,
        }
    }
}
