//! Transport-only primitives for the coding-assistant backend.
//!
//! This crate owns request/response building and parsing for the execute and
//! explain endpoints, plus the JSON frame codec used on the streaming
//! suggestion channel. It intentionally contains no connection lifecycle, no
//! retry behavior and no session state; those belong to `assist_session`.
//!
//! Inbound frame parsing is strict about shape: frames that are not JSON
//! objects with a string `type` surface as [`ProtocolError`] so callers can log
//! and drop them, while unknown-but-well-formed types are passed through as
//! [`StreamEvent::Unknown`].

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod frames;
pub mod headers;
pub mod payload;
pub mod url;

pub use client::AssistApiClient;
pub use config::ApiConfig;
pub use error::{ApiError, ProtocolError};
pub use events::{OutboundMessage, StreamEvent};
pub use frames::parse_frame;
pub use payload::{
    DetailLevel, ExecuteRequest, ExecuteResponse, ExecutionStatus, ExplainRequest,
    ExplainResponse,
};
pub use url::{endpoint_url, normalize_base_url, stream_url, DEFAULT_BASE_URL};
