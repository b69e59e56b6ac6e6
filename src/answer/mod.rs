mod stream;
mod types;

pub use stream::{AnswerEvent, AnswerStream};
pub use types::{
    AiUsage, AnswerCost, AnswerMetadata, AnswerRequest, AnswerResponse, SearchMetadata,
};

use tracing::{debug, info};

use crate::client::Client;
use crate::error::Error;
use crate::transport::{Replay, parse_envelope};
use crate::types::normalize_results;

impl Client {
    /// Ask a question and wait for the complete grounded answer.
    pub async fn answer(&self, request: &AnswerRequest) -> Result<AnswerResponse, Error> {
        let payload = request.to_payload(false)?;
        let mut response: AnswerResponse = self
            .transport
            .post_json("/answer", &payload, Replay::Safe)
            .await?;
        response.search_results = normalize_results(response.search_results);
        debug!(
            query = %payload.query,
            sources = response.search_results.len(),
            "answer complete"
        );
        Ok(response)
    }

    /// Ask a question and receive the answer incrementally.
    ///
    /// ```no_run
    /// use futures::StreamExt;
    /// use sift::{AnswerEvent, AnswerRequest};
    ///
    /// # async fn run(client: sift::Client) -> Result<(), sift::Error> {
    /// let mut stream = client.answer_stream(&AnswerRequest::new("What is RCU?")).await?;
    /// while let Some(event) = stream.next().await {
    ///     if let AnswerEvent::Content(delta) = event? {
    ///         print!("{delta}");
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn answer_stream(&self, request: &AnswerRequest) -> Result<AnswerStream, Error> {
        let payload = request.to_payload(true)?;
        let response = self.transport.post_stream("/answer", &payload).await?;
        let structured = request.wants_structured();

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        if is_json {
            info!("server answered a streaming request with JSON; replaying as events");
            let status = response.status().as_u16();
            let text = response.text().await?;
            let body: AnswerResponse = parse_envelope(status, &text)?;
            return Ok(AnswerStream::from_response(body, structured));
        }

        debug!(query = %payload.query, "answer stream opened");
        Ok(AnswerStream::from_sse(
            Box::pin(response.bytes_stream()),
            structured,
        ))
    }
}
