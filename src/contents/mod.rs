mod types;

pub use types::{ContentsRequest, ContentsResponse, ContentsResult, ExtractEffort, Summary};

use tracing::{debug, warn};

use crate::client::Client;
use crate::error::Error;
use crate::transport::Replay;

impl Client {
    /// Extract page content (and optionally a summary) for up to ten URLs.
    pub async fn contents(&self, request: &ContentsRequest) -> Result<ContentsResponse, Error> {
        let payload = request.to_payload()?;
        let response: ContentsResponse = self
            .transport
            .post_json("/contents", &payload, Replay::Safe)
            .await?;
        let response = response.normalize(&payload.urls);

        if !response.failed_urls.is_empty() {
            warn!(failed = response.failed_urls.len(), "some URLs could not be extracted");
        }
        debug!(
            requested = payload.urls.len(),
            processed = response.results.len(),
            "contents complete"
        );
        Ok(response)
    }
}
