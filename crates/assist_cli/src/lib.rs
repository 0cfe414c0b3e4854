//! Line-oriented terminal front end for an assist session.
//!
//! ## Configuration
//!
//! Everything is read from the environment through
//! [`assist_session::EnvConfig`]:
//!
//! - `ASSIST_BACKEND_URL` base URL of the backend (default `http://localhost:8000`)
//! - `ASSIST_STREAM_URL` overrides the derived `ws://.../ws/code-suggestions`
//! - `ASSIST_ACCESS_TOKEN` sent as a bearer token on both transports
//! - `ASSIST_DEBOUNCE_MS`, `ASSIST_DETAIL_LEVEL`, `ASSIST_SINGLE_FLIGHT`
//! - `ASSIST_RECONNECT_*` reconnect policy knobs
//! - `ASSIST_LOG` / `ASSIST_LOG_FILE` tracing filter and destination
//!
//! ## Input
//!
//! Plain lines are appended to the code buffer. Lines starting with `/` are
//! commands; see [`commands::HELP`].

pub mod commands;
pub mod render;
