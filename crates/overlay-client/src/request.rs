//! JSON-over-HTTP helper.
//!
//! Every call has exactly one outcome: a parsed JSON body or a
//! [`RequestError`]. Non-2xx responses carry their JSON body (if any)
//! inside the error.

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::errors::RequestError;

/// Send `method url` with an optional JSON body and decode the JSON reply.
///
/// An empty success body decodes as [`Value::Null`].
pub async fn request(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<&Value>,
) -> Result<Value, RequestError> {
    let mut builder = client
        .request(method.clone(), url)
        .header(reqwest::header::ACCEPT, "application/json");
    if let Some(body) = body {
        builder = builder.json(body);
    }

    let response = builder.send().await?;
    let status = response.status();
    let bytes = response.bytes().await?;
    debug!(%method, url, status = status.as_u16(), len = bytes.len(), "request completed");

    if !status.is_success() {
        return Err(RequestError::Status {
            status: status.as_u16(),
            body: serde_json::from_slice(&bytes).ok(),
        });
    }
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(RequestError::Decode)
}

/// `GET url`.
pub async fn get(client: &Client, url: &str) -> Result<Value, RequestError> {
    request(client, Method::GET, url, None).await
}

/// `POST url` with a JSON body.
pub async fn post(client: &Client, url: &str, body: &Value) -> Result<Value, RequestError> {
    request(client, Method::POST, url, Some(body)).await
}

/// `DELETE url`.
pub async fn delete(client: &Client, url: &str) -> Result<Value, RequestError> {
    request(client, Method::DELETE, url, None).await
}
