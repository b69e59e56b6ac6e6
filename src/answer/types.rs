use serde::{Deserialize, Serialize};

use crate::types::{Content, FilterPayload, SearchFilters, SearchResult, null_as_default};
use crate::validate::{self, MAX_SYSTEM_INSTRUCTIONS_CHARS, ValidationError};

/// Request for `POST /answer`.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    query: String,
    system_instructions: Option<String>,
    structured_output: Option<serde_json::Value>,
    data_max_price: Option<f64>,
    fast_mode: bool,
    filters: SearchFilters,
}

impl AnswerRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            system_instructions: None,
            structured_output: None,
            data_max_price: None,
            fast_mode: false,
            filters: SearchFilters::default(),
        }
    }

    /// Extra guidance for the answering model (at most 2000 characters).
    pub fn system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = Some(instructions.into());
        self
    }

    /// JSON schema the answer must conform to. The answer `contents` is then JSON.
    pub fn structured_output(mut self, schema: serde_json::Value) -> Self {
        self.structured_output = Some(schema);
        self
    }

    /// Spend cap in dollars for the retrieval step.
    pub fn data_max_price(mut self, dollars: f64) -> Self {
        self.data_max_price = Some(dollars);
        self
    }

    pub fn fast_mode(mut self, enabled: bool) -> Self {
        self.fast_mode = enabled;
        self
    }

    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub(crate) fn wants_structured(&self) -> bool {
        self.structured_output.is_some()
    }

    pub(crate) fn to_payload(&self, streaming: bool) -> Result<AnswerPayload<'_>, ValidationError> {
        if let Some(instructions) = &self.system_instructions {
            validate::max_chars(
                "system_instructions",
                instructions,
                MAX_SYSTEM_INSTRUCTIONS_CHARS,
            )?;
        }
        if let Some(schema) = &self.structured_output {
            validate::json_schema("structured_output", schema)?;
        }
        Ok(AnswerPayload {
            query: validate::query(&self.query)?,
            system_instructions: self
                .system_instructions
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty()),
            structured_output: self.structured_output.as_ref(),
            data_max_price: self
                .data_max_price
                .map(|p| validate::price("data_max_price", p))
                .transpose()?,
            fast_mode: self.fast_mode,
            streaming,
            filters: self.filters.to_payload()?,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerPayload<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_max_price: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fast_mode: bool,
    pub streaming: bool,
    #[serde(flatten)]
    pub filters: FilterPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tx_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub number_of_results: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_characters: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AiUsage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnswerCost {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_deduction_dollars: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub search_deduction_dollars: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ai_deduction_dollars: f64,
}

/// Trailing bookkeeping sent after the answer text.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnswerMetadata {
    #[serde(default)]
    pub tx_id: Option<String>,
    #[serde(default)]
    pub original_query: Option<String>,
    #[serde(default)]
    pub search_metadata: Option<SearchMetadata>,
    #[serde(default)]
    pub ai_usage: Option<AiUsage>,
    #[serde(default)]
    pub cost: Option<AnswerCost>,
}

/// Response from `POST /answer`, or the reassembly of a streamed answer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnswerResponse {
    #[serde(default)]
    pub tx_id: Option<String>,
    #[serde(default)]
    pub original_query: Option<String>,
    #[serde(default)]
    pub contents: Content,
    #[serde(default, deserialize_with = "null_as_default")]
    pub search_results: Vec<SearchResult>,
    #[serde(default)]
    pub search_metadata: Option<SearchMetadata>,
    #[serde(default)]
    pub ai_usage: Option<AiUsage>,
    #[serde(default)]
    pub cost: Option<AnswerCost>,
}

impl AnswerResponse {
    pub(crate) fn apply_metadata(&mut self, meta: AnswerMetadata) {
        if meta.tx_id.is_some() {
            self.tx_id = meta.tx_id;
        }
        if meta.original_query.is_some() {
            self.original_query = meta.original_query;
        }
        if meta.search_metadata.is_some() {
            self.search_metadata = meta.search_metadata;
        }
        if meta.ai_usage.is_some() {
            self.ai_usage = meta.ai_usage;
        }
        if meta.cost.is_some() {
            self.cost = meta.cost;
        }
    }

    pub(crate) fn metadata(&self) -> AnswerMetadata {
        AnswerMetadata {
            tx_id: self.tx_id.clone(),
            original_query: self.original_query.clone(),
            search_metadata: self.search_metadata.clone(),
            ai_usage: self.ai_usage.clone(),
            cost: self.cost.clone(),
        }
    }
}
