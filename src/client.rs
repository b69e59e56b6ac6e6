use crate::config::ClientConfig;
use crate::error::Error;
use crate::transport::Transport;

/// Entry point for every API operation.
///
/// Cheap to clone: clones share one connection pool.
///
/// ```no_run
/// # async fn run() -> Result<(), sift::Error> {
/// let client = sift::Client::from_env()?;
/// let response = client
///     .search(&sift::SearchRequest::new("rust async runtimes").max_results(5))
///     .await?;
/// for result in &response.results {
///     println!("{} - {}", result.title, result.url);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) transport: Transport,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        Ok(Self {
            transport: Transport::new(config)?,
        })
    }

    /// Build a client from `SIFT_API_KEY` and friends. See [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        self.transport.config()
    }

    /// Client against a mock server with retries disabled.
    #[cfg(test)]
    pub(crate) fn with_base_url(base_url: &str) -> Self {
        let config = ClientConfig::new("test-key")
            .with_base_url(base_url)
            .with_max_retries(1);
        Self::new(config).expect("loopback test config is valid")
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.config().base_url())
            .finish_non_exhaustive()
    }
}
