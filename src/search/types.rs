use serde::{Deserialize, Serialize};

use crate::types::{FilterPayload, ResponseLength, SearchFilters, SearchResult, null_as_default};
use crate::validate::{self, ValidationError};

/// Request for `POST /search`.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    query: String,
    max_num_results: Option<u32>,
    max_price: Option<f64>,
    relevance_threshold: Option<f64>,
    category: Option<String>,
    response_length: Option<ResponseLength>,
    fast_mode: bool,
    filters: SearchFilters,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_num_results: None,
            max_price: None,
            relevance_threshold: None,
            category: None,
            response_length: None,
            fast_mode: false,
            filters: SearchFilters::default(),
        }
    }

    /// Number of results, 1 to 20 (server default: 10).
    pub fn max_results(mut self, n: u32) -> Self {
        self.max_num_results = Some(n);
        self
    }

    /// Cap on spend for this query, in dollars per thousand retrievals.
    pub fn max_price(mut self, dollars: f64) -> Self {
        self.max_price = Some(dollars);
        self
    }

    /// Minimum relevance score, 0.0 to 1.0.
    pub fn relevance_threshold(mut self, threshold: f64) -> Self {
        self.relevance_threshold = Some(threshold);
        self
    }

    /// Free-text hint steering results towards a topic area.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn response_length(mut self, length: ResponseLength) -> Self {
        self.response_length = Some(length);
        self
    }

    /// Trade recall for latency.
    pub fn fast_mode(mut self, enabled: bool) -> Self {
        self.fast_mode = enabled;
        self
    }

    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub(crate) fn to_payload(&self) -> Result<SearchPayload<'_>, ValidationError> {
        let category = match self.category.as_deref().map(str::trim) {
            Some("") => return Err(ValidationError::Empty { field: "category" }),
            other => other,
        };
        Ok(SearchPayload {
            query: validate::query(&self.query)?,
            max_num_results: self.max_num_results.map(validate::max_results).transpose()?,
            max_price: self
                .max_price
                .map(|p| validate::price("max_price", p))
                .transpose()?,
            relevance_threshold: self
                .relevance_threshold
                .map(validate::relevance_threshold)
                .transpose()?,
            category,
            response_length: self.response_length.map(ResponseLength::validate).transpose()?,
            fast_mode: self.fast_mode,
            filters: self.filters.to_payload()?,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchPayload<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_num_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_length: Option<ResponseLength>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fast_mode: bool,
    #[serde(flatten)]
    pub filters: FilterPayload,
}

/// Response from `POST /search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub tx_id: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<SearchResult>,
    #[serde(default, alias = "total_deduction_dollars")]
    pub total_cost_dollars: Option<f64>,
    #[serde(default)]
    pub total_characters: Option<u64>,
}

impl SearchResponse {
    /// Number of results kept after normalization.
    pub fn result_count(&self) -> usize {
        self.results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchType;

    #[test]
    fn minimal_payload_has_only_query() {
        let req = SearchRequest::new("  rust borrow checker  ");
        let json = serde_json::to_value(req.to_payload().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"query": "rust borrow checker"}));
    }

    #[test]
    fn full_payload_shape() {
        let req = SearchRequest::new("transformer scaling laws")
            .max_results(5)
            .relevance_threshold(0.6)
            .response_length(ResponseLength::Short)
            .fast_mode(true)
            .filters(
                SearchFilters::new()
                    .search_type(SearchType::Web)
                    .exclude_sources(["reddit.com"])
                    .end_date("2024-12-31"),
            );
        let json = serde_json::to_value(req.to_payload().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "query": "transformer scaling laws",
                "max_num_results": 5,
                "relevance_threshold": 0.6,
                "response_length": "short",
                "fast_mode": true,
                "search_type": "web",
                "excluded_sources": ["reddit.com"],
                "end_date": "2024-12-31"
            })
        );
    }

    #[test]
    fn rejects_invalid_requests() {
        assert_eq!(
            SearchRequest::new("   ").to_payload().unwrap_err(),
            ValidationError::EmptyQuery
        );
        assert!(matches!(
            SearchRequest::new("q").max_results(50).to_payload(),
            Err(ValidationError::OutOfRange {
                field: "max_num_results",
                ..
            })
        ));
        assert!(matches!(
            SearchRequest::new("q").category(" ").to_payload(),
            Err(ValidationError::Empty { field: "category" })
        ));
        assert!(matches!(
            SearchRequest::new("q")
                .filters(SearchFilters::new().start_date("2025-01-01").end_date("2024-01-01"))
                .to_payload(),
            Err(ValidationError::DateRange { .. })
        ));
    }

    #[test]
    fn response_accepts_null_results_and_cost_alias() {
        let resp: SearchResponse = serde_json::from_value(serde_json::json!({
            "tx_id": "tx_1",
            "results": null,
            "total_deduction_dollars": 0.0015
        }))
        .unwrap();
        assert!(resp.results.is_empty());
        assert_eq!(resp.total_cost_dollars, Some(0.0015));
    }
}
