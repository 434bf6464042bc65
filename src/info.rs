//! Server metadata fetch.
//!
//! LibreSpeed's `getIP.php` reports the client address as seen by the
//! server, usually as `{"processedString": "...", "rawIspInfo": ...}`. The
//! body is kept verbatim.

use serde_json::Value;
use tracing::debug;

use crate::client::Client;
use crate::error::Result;
use crate::params;

/// Fetch the server's metadata document.
///
/// A body that is not JSON is kept as a JSON string.
pub async fn fetch(client: &Client) -> Result<Value> {
    let response = client
        .get(params::INFO_PATH)?
        .send()
        .await?
        .error_for_status()?;
    let body = response.text().await?;
    debug!(bytes = body.len(), "server info received");
    Ok(parse_body(body))
}

fn parse_body(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

/// Human-readable client address line, when the server provides one.
pub fn processed_string(info: &Value) -> Option<&str> {
    match info {
        Value::Object(map) => map.get("processedString").and_then(Value::as_str),
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}
