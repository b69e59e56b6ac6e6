//! HTTP plumbing shared by every endpoint: auth headers, status
//! classification, envelope checks, and retry with jittered backoff.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::Error;

const MAX_REDIRECTS: usize = 5;
const ERROR_SNIPPET_CHARS: usize = 200;

/// Whether a request may be replayed after a server-side (5xx) failure.
/// Rate-limited requests (429) were rejected before processing and are
/// always retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replay {
    Safe,
    RateLimitOnly,
}

#[derive(Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    config: ClientConfig,
}

impl Transport {
    pub(crate) fn new(config: ClientConfig) -> Result<Self, Error> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { http, config })
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.config.base_url);
        self.http
            .request(method, url)
            .header("x-api-key", self.config.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.execute(path, Replay::Safe, || {
            self.request(Method::GET, path)
                .header("Accept", "application/json")
                .timeout(self.config.timeout)
        })
        .await
    }

    pub(crate) async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.execute(path, Replay::Safe, || {
            self.request(Method::DELETE, path)
                .header("Accept", "application/json")
                .timeout(self.config.timeout)
        })
        .await
    }

    pub(crate) async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        replay: Replay,
    ) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(path, replay, || {
            self.request(Method::POST, path)
                .header("Accept", "application/json")
                .json(body)
                .timeout(self.config.timeout)
        })
        .await
    }

    /// POST expecting a `text/event-stream` body. Returns the raw response
    /// once the status line is known to be successful; the body is consumed
    /// by the caller. Only the initial request is retried.
    pub(crate) async fn post_stream<B>(&self, path: &str, body: &B) -> Result<Response, Error>
    where
        B: Serialize + ?Sized,
    {
        self.with_retry(path, Replay::Safe, || async move {
            let response = self
                .request(Method::POST, path)
                .header("Accept", "text/event-stream")
                .json(body)
                .timeout(self.config.stream_timeout)
                .send()
                .await?;
            check_status(response).await
        })
        .await
    }

    async fn execute<T, F>(&self, path: &str, replay: Replay, build: F) -> Result<T, Error>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let build = &build;
        self.with_retry(path, replay, || async move {
            let response = check_status(build().send().await?).await?;
            decode_envelope(response).await
        })
        .await
    }

    async fn with_retry<T, F, Fut>(
        &self,
        path: &str,
        replay: Replay,
        attempt_fn: F,
    ) -> Result<T, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 0;
        loop {
            match attempt_fn().await {
                Ok(value) => {
                    debug!(path, attempt = attempt + 1, "request complete");
                    return Ok(value);
                }
                Err(e) if attempt + 1 < max_attempts && should_retry(&e, replay) => {
                    let delay = jittered_backoff(self.config.initial_backoff, attempt);
                    debug!(
                        path,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(path, error = %e, "request failed");
                    return Err(e);
                }
            }
        }
    }
}

fn should_retry(e: &Error, replay: Replay) -> bool {
    match replay {
        Replay::Safe => e.is_retriable(),
        Replay::RateLimitOnly => matches!(e, Error::RateLimited),
    }
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(initial: Duration, attempt: u32) -> Duration {
    let base = (initial.as_millis() as u64).saturating_mul(2u64.saturating_pow(attempt));
    let half = base / 2;
    Duration::from_millis(half + fastrand::u64(..half.max(1)))
}

pub(crate) async fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Sift API rate limited");
        return Err(Error::RateLimited);
    }
    let text = response.text().await.unwrap_or_default();
    let classified = classify_status(status, &text);
    warn!(status = %status, error = %classified, "Sift API error");
    Err(classified)
}

fn classify_status(status: StatusCode, body: &str) -> Error {
    let message = extract_error_message(body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", snippet(body))
        }
    });
    match status.as_u16() {
        code @ (401 | 403) => Error::Unauthorized { code, message },
        402 => Error::InsufficientCredits(message),
        404 => Error::NotFound(message),
        429 => Error::RateLimited,
        code => Error::Api { code, message },
    }
}

/// Pull a human-readable message out of the API's error bodies:
/// `{"error": "..."}`, `{"error": {"message": "..."}}`, `{"message": "..."}`,
/// or `{"detail": "..."}`.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let candidate = match value.get("error") {
        Some(serde_json::Value::String(s)) => Some(s.as_str()),
        Some(obj @ serde_json::Value::Object(_)) => obj.get("message").and_then(|m| m.as_str()),
        _ => None,
    };
    candidate
        .or_else(|| value.get("message").and_then(|m| m.as_str()))
        .or_else(|| value.get("detail").and_then(|m| m.as_str()))
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

/// Decode a successful JSON body, turning `{"success": false, ...}`
/// envelopes into errors.
async fn decode_envelope<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    parse_envelope(status, &text)
}

pub(crate) fn parse_envelope<T: DeserializeOwned>(status: u16, text: &str) -> Result<T, Error> {
    let value: serde_json::Value = if text.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(text)
            .map_err(|e| Error::Decode(format!("{e} (body: {})", snippet(text))))?
    };

    if value.get("success").and_then(|s| s.as_bool()) == Some(false) {
        let message = extract_error_message(text).unwrap_or_else(|| "request unsuccessful".into());
        warn!(status, error = %message, "Sift API error in success response");
        return Err(Error::Api { code: status, message });
    }

    Ok(serde_json::from_value(value)?)
}

fn snippet(text: &str) -> &str {
    if text.len() > ERROR_SNIPPET_CHARS {
        &text[..text.floor_char_boundary(ERROR_SNIPPET_CHARS)]
    } else {
        text
    }
}
