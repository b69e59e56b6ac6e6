mod types;

pub use types::{SearchRequest, SearchResponse};

use tracing::debug;

use crate::client::Client;
use crate::error::Error;
use crate::transport::Replay;
use crate::types::normalize_results;

impl Client {
    /// Run a search. Results without a URL are dropped and duplicate URLs
    /// collapsed.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, Error> {
        let payload = request.to_payload()?;
        let mut response: SearchResponse = self
            .transport
            .post_json("/search", &payload, Replay::Safe)
            .await?;

        let returned = response.results.len();
        response.results = normalize_results(response.results);
        debug!(
            query = %payload.query,
            returned,
            kept = response.result_count(),
            "search complete"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::types::SearchFilters;
    use crate::validate::ValidationError;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_success_returns_normalized_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_json(serde_json::json!({
                "query": "rust async",
                "max_num_results": 3,
                "included_sources": ["docs.rs", "sift/arxiv"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "tx_id": "tx_123",
                "query": "rust async",
                "results": [
                    {"title": "Tokio", "url": "https://docs.rs/tokio", "content": "runtime", "relevance_score": 0.9},
                    {"title": "No URL", "url": ""},
                    {"title": "Tokio dup", "url": "https://docs.rs/tokio"}
                ],
                "total_cost_dollars": 0.003
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::with_base_url(&server.uri());
        let request = SearchRequest::new("rust async")
            .max_results(3)
            .filters(SearchFilters::new().include_sources(["docs.rs", "sift/arxiv"]));
        let response = client.search(&request).await.unwrap();

        assert_eq!(response.tx_id.as_deref(), Some("tx_123"));
        assert_eq!(response.result_count(), 1);
        assert_eq!(response.results[0].title, "Tokio");
        assert_eq!(response.results[0].content.as_text(), Some("runtime"));
        assert_eq!(response.total_cost_dollars, Some(0.003));
    }

    #[tokio::test]
    async fn invalid_request_never_hits_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = Client::with_base_url(&server.uri());
        let request =
            SearchRequest::new("q").filters(SearchFilters::new().include_sources(["ftp://x.org"]));
        let err = client.search(&request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidSource(_))
        ));
    }

    #[tokio::test]
    async fn search_envelope_failure_returns_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "Insufficient relevance for query"
            })))
            .mount(&server)
            .await;

        let client = Client::with_base_url(&server.uri());
        match client.search(&SearchRequest::new("q")).await {
            Err(Error::Api { code: 200, message }) => {
                assert_eq!(message, "Insufficient relevance for query");
            }
            other => panic!("expected envelope error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_402_returns_insufficient_credits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(402)
                    .set_body_json(serde_json::json!({"error": "Top up your balance"})),
            )
            .mount(&server)
            .await;

        let client = Client::with_base_url(&server.uri());
        let err = client.search(&SearchRequest::new("q")).await.unwrap_err();
        match err {
            Error::InsufficientCredits(msg) => assert!(msg.contains("Top up")),
            other => panic!("expected InsufficientCredits, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_401_returns_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = Client::with_base_url(&server.uri());
        let err = client.search(&SearchRequest::new("q")).await.unwrap_err();
        match err {
            Error::Unauthorized { code, message } => {
                assert_eq!(code, 401);
                assert!(message.contains("invalid api key"), "got: {message}");
            }
            other => panic!("expected Unauthorized, got: {other:?}"),
        }
    }
}
