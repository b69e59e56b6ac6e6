use std::env;
use std::time::Duration;

use tracing::debug;

use crate::error::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.sift.dev/v1";
pub const API_KEY_ENV: &str = "SIFT_API_KEY";
pub const BASE_URL_ENV: &str = "SIFT_BASE_URL";
pub const TIMEOUT_ENV: &str = "SIFT_TIMEOUT_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Answer streams stay open while the model writes; allow much longer than a JSON call.
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

#[derive(Clone)]
pub(crate) struct ApiKey(String);

impl ApiKey {
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Connection settings for [`Client`](crate::Client).
///
/// Environment variables read by [`ClientConfig::from_env`]:
/// - `SIFT_API_KEY`: API key (required)
/// - `SIFT_BASE_URL`: override the API endpoint (optional)
/// - `SIFT_TIMEOUT_SECS`: per-request timeout in seconds (optional)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) api_key: ApiKey,
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) stream_timeout: Duration,
    pub(crate) max_retries: u32,
    pub(crate) initial_backoff: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: ApiKey(api_key.into().trim().to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }

    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let api_key = lookup(API_KEY_ENV)
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::ApiKeyNotSet)?;
        let mut config = Self::new(api_key);

        if let Some(base_url) = lookup(BASE_URL_ENV)
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
        {
            debug!(base_url = %base_url, "using base URL from environment");
            config = config.with_base_url(base_url);
        }

        if let Some(secs) = lookup(TIMEOUT_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|&s| s > 0)
        {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Total attempts per request, including the first. `0` is treated as `1`.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.api_key.expose().is_empty() {
            return Err(Error::ApiKeyNotSet);
        }
        validate_base_url(&self.base_url)
    }
}

/// The API key is sent on every request, so plain HTTP is only allowed
/// towards loopback hosts (local gateways, test servers).
fn validate_base_url(raw: &str) -> Result<(), Error> {
    let insecure = || Error::InsecureBaseUrl(raw.to_string());
    let parsed = url::Url::parse(raw).map_err(|_| insecure())?;
    match parsed.scheme() {
        "https" if parsed.host().is_some() => Ok(()),
        "http" if is_loopback(&parsed) => Ok(()),
        _ => Err(insecure()),
    }
}

fn is_loopback(parsed: &url::Url) -> bool {
    match parsed.host() {
        Some(url::Host::Ipv4(v4)) => v4.is_loopback(),
        Some(url::Host::Ipv6(v6)) => v6.is_loopback(),
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}
