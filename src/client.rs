//! HTTP client for one LibreSpeed server.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::RequestBuilder;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use url::Url;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::params;

/// HTTP client bound to one LibreSpeed server.
///
/// Every request carries the fixed user agent and, when configured, the
/// server's Basic-Auth header.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base: Url,
}

impl Client {
    /// Build a client for `server`. Performs no network I/O.
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let base = base_url(&server.url)?;

        let mut headers = HeaderMap::new();
        if let Some((user, pass)) = server.credentials() {
            let token = STANDARD.encode(format!("{user}:{pass}"));
            let mut value = HeaderValue::from_str(&format!("Basic {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(user_agent())
            .default_headers(headers)
            .timeout(params::REQUEST_TIMEOUT)
            .build()?;

        Ok(Client { http, base })
    }

    /// Base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve an endpoint path against the server base.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// GET request for an endpoint relative to the base.
    pub fn get(&self, path: &str) -> Result<RequestBuilder> {
        Ok(self.http.get(self.endpoint(path)?))
    }

    /// POST request for an endpoint relative to the base.
    pub fn post(&self, path: &str) -> Result<RequestBuilder> {
        Ok(self.http.post(self.endpoint(path)?))
    }
}

/// Parse the base URL so that relative joins append to its path.
fn base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn user_agent() -> String {
    format!(
        "{} {}/{}",
        params::USER_AGENT_PRODUCT,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}
