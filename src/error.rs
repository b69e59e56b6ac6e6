use std::time::Duration;

use crate::validate::ValidationError;

/// Errors returned by every client operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("SIFT_API_KEY not set")]
    ApiKeyNotSet,

    #[error("insecure base URL '{0}': only HTTPS (or loopback HTTP) is allowed")]
    InsecureBaseUrl(String),

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("API rate limit exceeded. Please retry later.")]
    RateLimited,

    /// 401 (bad or missing key) or 403 (key lacks access).
    #[error("authentication failed ({code}): {message}")]
    Unauthorized { code: u16, message: String },

    #[error("insufficient credits: {0}")]
    InsufficientCredits(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("research task {id} failed: {message}")]
    TaskFailed { id: String, message: String },

    #[error("research task {0} was cancelled")]
    TaskCancelled(String),

    #[error("research task {id} did not finish within {}s", .waited.as_secs())]
    WaitTimeout { id: String, waited: Duration },
}

impl Error {
    /// Transient failures worth retrying: rate limiting and server-side errors.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::RateLimited
                | Error::Api {
                    code: 500..=599,
                    ..
                }
        )
    }

    /// HTTP status carried by the error, if it came from an API response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RateLimited => Some(429),
            Error::Unauthorized { code, .. } => Some(*code),
            Error::InsufficientCredits(_) => Some(402),
            Error::NotFound(_) => Some(404),
            Error::Api { code, .. } => Some(*code),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
