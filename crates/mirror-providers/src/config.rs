//! Shared configuration and HTTP plumbing for the API clients.
//!
//! Every client config can be built from an arbitrary variable lookup so
//! tests never touch the process environment; `from_env` variants pass
//! [`env_lookup`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Per-request timeout of every API call.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Page size used by the paginated listings.
pub const PER_PAGE: usize = 100;

const USER_AGENT: &str = concat!("mirror-git/", env!("CARGO_PKG_VERSION"));

/// Access token that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Read a variable from the process environment.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// A variable that must be set to a non-empty value.
pub(crate) fn required(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::MissingVar(key.to_string()))
}

/// A variable that falls back to `default` when unset or empty.
pub(crate) fn or_default(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> String {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Shared HTTP client settings.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .build()?)
}

/// `https://<user>:<token>@<host>/<path>.git`
pub(crate) fn credential_url(host: &str, username: &str, token: &Secret, path: &str) -> String {
    format!(
        "https://{}:{}@{}/{}.git",
        username,
        token.expose(),
        host,
        path
    )
}

/// Strip a trailing `/` so endpoints can be appended with `format!`.
pub(crate) fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}

/// Turn a non-`expected` response into [`ApiError::Status`] carrying the body.
pub(crate) async fn expect_status(
    resp: reqwest::Response,
    expected: reqwest::StatusCode,
) -> Result<reqwest::Response> {
    if resp.status() == expected {
        return Ok(resp);
    }
    Err(status_error(resp).await)
}

pub(crate) async fn status_error(resp: reqwest::Response) -> ApiError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ApiError::Status { status, body }
}

/// `true` when a page shorter than the page size ends the listing.
pub(crate) fn is_last_page(len: usize) -> bool {
    len < PER_PAGE
}

#[cfg(test)]
pub(crate) fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: std::collections::HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}
