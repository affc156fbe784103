//! Client-side error types.

use overlay_core::OverlayError;
use serde_json::Value;

/// Failure of a JSON HTTP request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-2xx status.
    #[error("HTTP status {status}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, when it was JSON.
        body: Option<Value>,
    },

    /// Successful response whose body is not JSON.
    #[error("invalid JSON body: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Failure deriving endpoints from the overlay page URL.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Not a valid absolute URL.
    #[error("invalid page URL `{url}`: {reason}")]
    InvalidUrl {
        /// Offending input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// URL has no host component.
    #[error("page URL `{0}` has no host")]
    MissingHost(String),
}

/// Failure building an [`Overlay`](crate::Overlay).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Page URL could not be turned into endpoints.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<RequestError> for OverlayError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Decode(json) => Self::Parse(json.into()),
            other => Self::ConfigFetch(other.to_string()),
        }
    }
}
