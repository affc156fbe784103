//! Error hierarchy for the overlay.
//!
//! - [`FrameError`]: an inbound frame could not be decoded
//! - [`OverlayError`]: top-level taxonomy (parse, unknown command, transport,
//!   settings fetch) used for logging and classification
//!
//! None of these are fatal: parse errors drop the frame, transport errors
//! feed the reconnect cycle, settings errors leave the sweeps disabled.

use thiserror::Error;

/// Failure decoding an inbound frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Body is not valid JSON or does not fit the expected shape.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    /// A required field is absent.
    #[error("frame is missing `{0}`")]
    MissingField(&'static str),
}

/// Top-level error taxonomy.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Malformed frame or settings body.
    #[error("parse error: {0}")]
    Parse(#[from] FrameError),
    /// Command name outside the known vocabulary.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// Connection failed or closed.
    #[error("transport error: {0}")]
    Transport(String),
    /// Window settings could not be retrieved.
    #[error("settings fetch failed: {0}")]
    ConfigFetch(String),
}

impl OverlayError {
    /// Short classification string for log fields.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::UnknownCommand(_) => "unknown_command",
            Self::Transport(_) => "transport_error",
            Self::ConfigFetch(_) => "config_fetch_error",
        }
    }
}
