use serde::{Deserialize, Serialize, Serializer};

use crate::types::{Content, ResponseLength, null_as_default};
use crate::validate::{self, MAX_URLS, ValidationError};

/// Whether and how to summarize extracted pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Summary {
    #[default]
    Off,
    /// Server-chosen summary.
    Auto,
    /// Summarize following these instructions.
    Instructions(String),
    /// Extract fields matching this JSON schema.
    Schema(serde_json::Value),
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Summary::Off => serializer.serialize_bool(false),
            Summary::Auto => serializer.serialize_bool(true),
            Summary::Instructions(text) => serializer.serialize_str(text),
            Summary::Schema(schema) => schema.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractEffort {
    Normal,
    High,
    Auto,
}

/// Request for `POST /contents`.
#[derive(Debug, Clone)]
pub struct ContentsRequest {
    urls: Vec<String>,
    summary: Summary,
    extract_effort: Option<ExtractEffort>,
    response_length: Option<ResponseLength>,
    max_price: Option<f64>,
}

impl ContentsRequest {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            summary: Summary::Off,
            extract_effort: None,
            response_length: None,
            max_price: None,
        }
    }

    pub fn summary(mut self, summary: Summary) -> Self {
        self.summary = summary;
        self
    }

    pub fn extract_effort(mut self, effort: ExtractEffort) -> Self {
        self.extract_effort = Some(effort);
        self
    }

    pub fn response_length(mut self, length: ResponseLength) -> Self {
        self.response_length = Some(length);
        self
    }

    /// Spend cap in dollars for the whole batch.
    pub fn max_price(mut self, dollars: f64) -> Self {
        self.max_price = Some(dollars);
        self
    }

    pub(crate) fn to_payload(&self) -> Result<ContentsPayload<'_>, ValidationError> {
        let urls = validate::url_list(&self.urls, MAX_URLS)?;
        match &self.summary {
            Summary::Instructions(text) if text.trim().is_empty() => {
                return Err(ValidationError::Empty { field: "summary" });
            }
            Summary::Schema(schema) => validate::json_schema("summary", schema)?,
            _ => {}
        }
        Ok(ContentsPayload {
            urls,
            summary: &self.summary,
            extract_effort: self.extract_effort,
            response_length: self.response_length.map(ResponseLength::validate).transpose()?,
            max_price_dollars: self
                .max_price
                .map(|p| validate::price("max_price", p))
                .transpose()?,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ContentsPayload<'a> {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "is_off")]
    pub summary: &'a Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_effort: Option<ExtractEffort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_length: Option<ResponseLength>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price_dollars: Option<f64>,
}

fn is_off(summary: &&Summary) -> bool {
    matches!(summary, Summary::Off)
}

/// One extracted page.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentsResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub content: Content,
    /// Present when a summary was requested; JSON when a schema was given.
    #[serde(default)]
    pub summary: Option<Content>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Response from `POST /contents`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentsResponse {
    #[serde(default)]
    pub tx_id: Option<String>,
    #[serde(default)]
    pub urls_requested: Option<u32>,
    #[serde(default)]
    pub urls_processed: Option<u32>,
    #[serde(default)]
    pub urls_failed: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<ContentsResult>,
    /// URLs that produced no result. Filled from the request when the
    /// server does not list them.
    #[serde(default, deserialize_with = "null_as_default")]
    pub failed_urls: Vec<String>,
    #[serde(default, alias = "total_deduction_dollars")]
    pub total_cost_dollars: Option<f64>,
    #[serde(default)]
    pub total_characters: Option<u64>,
}

impl ContentsResponse {
    pub(crate) fn normalize(mut self, requested: &[String]) -> Self {
        self.results.retain(|r| !r.url.trim().is_empty());
        if self.failed_urls.is_empty() {
            let returned: Vec<PageKey> =
                self.results.iter().map(|r| PageKey::new(&r.url)).collect();
            self.failed_urls = requested
                .iter()
                .filter(|url| !returned.contains(&PageKey::new(url)))
                .cloned()
                .collect();
        }
        let requested_count = requested.len() as u32;
        self.urls_requested.get_or_insert(requested_count);
        self.urls_processed.get_or_insert(self.results.len() as u32);
        self.urls_failed.get_or_insert(self.failed_urls.len() as u32);
        self
    }

    pub fn total_failed(&self) -> usize {
        self.failed_urls.len()
    }
}

/// Comparison key for a page URL that survives server-side canonicalization:
/// case-folded host, default port dropped, trailing slash ignored.
#[derive(PartialEq)]
enum PageKey {
    Parsed {
        scheme: String,
        host: Option<String>,
        port: Option<u16>,
        path: String,
        query: Option<String>,
    },
    Raw(String),
}

impl PageKey {
    fn new(raw: &str) -> Self {
        let raw = raw.trim();
        match url::Url::parse(raw) {
            Ok(url) => PageKey::Parsed {
                scheme: url.scheme().to_string(),
                host: url.host_str().map(str::to_string),
                port: url.port_or_known_default(),
                path: url.path().trim_end_matches('/').to_string(),
                query: url.query().map(str::to_string),
            },
            Err(_) => PageKey::Raw(raw.to_string()),
        }
    }
}
