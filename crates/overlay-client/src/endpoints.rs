//! Server endpoints derived from the overlay page URL.
//!
//! The page path is cut after its last `/` to get the base path; the socket
//! lives at `ws://<host><base>ws` (always plain `ws`) and the settings at
//! `<scheme>://<host><base>api/get_window_settings`.

use reqwest::Url;

use crate::errors::EndpointError;

/// Path of the settings endpoint relative to the base path.
pub const SETTINGS_PATH: &str = "api/get_window_settings";

/// Path of the chat socket relative to the base path.
pub const SOCKET_PATH: &str = "ws";

/// Resolved endpoint URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    /// WebSocket URL.
    pub ws_url: String,
    /// Window settings URL.
    pub settings_url: String,
}

impl Endpoints {
    /// Derive endpoints from the page URL the overlay is served from.
    pub fn from_page_url(page_url: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(page_url).map_err(|err| EndpointError::InvalidUrl {
            url: page_url.to_owned(),
            reason: err.to_string(),
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| EndpointError::MissingHost(page_url.to_owned()))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        let base = base_path(url.path());

        Ok(Self {
            ws_url: format!("ws://{authority}{base}{SOCKET_PATH}"),
            settings_url: format!("{}://{authority}{base}{SETTINGS_PATH}", url.scheme()),
        })
    }
}

/// Everything up to and including the last `/`.
fn base_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    }
}
