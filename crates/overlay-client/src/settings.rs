//! Window settings fetch.

use overlay_core::{OverlayError, WindowSettings};
use reqwest::Client;
use tracing::{debug, warn};

use crate::request;

/// Fetch and decode the window settings.
///
/// Failures are logged here and returned as [`OverlayError::ConfigFetch`]
/// (transport or status) or [`OverlayError::Parse`] (bad body).
pub async fn fetch_window_settings(
    client: &Client,
    url: &str,
) -> Result<WindowSettings, OverlayError> {
    let result = match request::get(client, url).await {
        Ok(body) => serde_json::from_value::<WindowSettings>(body)
            .map_err(|err| OverlayError::Parse(err.into())),
        Err(err) => Err(err.into()),
    };
    match &result {
        Ok(settings) => debug!(
            url,
            clear_timer = ?settings.clear_timer,
            decay_timer = ?settings.decay_timer,
            message_limit = ?settings.message_limit,
            "window settings fetched"
        ),
        Err(err) => warn!(url, error = %err, kind = err.error_kind(), "window settings fetch failed"),
    }
    result
}
