use assist_api::ApiError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::state::ConnectionState;

/// Why an outbound frame was not handed to the channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("stream is not connected (status: {0})")]
    NotConnected(ConnectionState),
    #[error("failed to encode outbound frame: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session must be created inside a Tokio runtime")]
    NoRuntime,
    #[error("invalid backend configuration: {0}")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
