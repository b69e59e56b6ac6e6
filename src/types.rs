//! Types shared across endpoints: search results, content bodies, search
//! filters, and response-normalization helpers.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::validate::{self, SourceId, ValidationError};

/// Document body returned by the API: plain text, or JSON when the caller
/// asked for structured output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Structured(serde_json::Value),
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Null => Content::default(),
            serde_json::Value::String(s) => Content::Text(s),
            other => Content::Structured(other),
        })
    }
}

impl Content {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Structured(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Content::Text(_) => None,
            Content::Structured(v) => Some(v),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(s) => s.is_empty(),
            Content::Structured(v) => v.is_null(),
        }
    }

    /// Text as-is; structured content rendered as compact JSON.
    pub fn to_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Structured(v) => v.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default, alias = "relevance")]
    pub relevance_score: Option<f64>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub length: Option<u64>,
}

/// Drop results without a URL, trim titles, and collapse duplicate URLs
/// keeping the first occurrence.
pub(crate) fn normalize_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter_map(|mut r| {
            let url = r.url.trim();
            if url.is_empty() || !seen.insert(url.to_string()) {
                return None;
            }
            r.url = url.to_string();
            r.title = r.title.trim().to_string();
            Some(r)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    All,
    Web,
    Proprietary,
    News,
}

/// How much text to return per result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLength {
    Short,
    Medium,
    Large,
    Max,
    /// Explicit character budget.
    Chars(u32),
}

impl Serialize for ResponseLength {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResponseLength::Short => serializer.serialize_str("short"),
            ResponseLength::Medium => serializer.serialize_str("medium"),
            ResponseLength::Large => serializer.serialize_str("large"),
            ResponseLength::Max => serializer.serialize_str("max"),
            ResponseLength::Chars(n) => serializer.serialize_u32(*n),
        }
    }
}

impl ResponseLength {
    pub(crate) fn validate(self) -> Result<Self, ValidationError> {
        if let ResponseLength::Chars(0) = self {
            return Err(ValidationError::OutOfRange {
                field: "response_length",
                value: "0".into(),
                min: "1".into(),
                max: u32::MAX.to_string(),
            });
        }
        Ok(self)
    }
}

/// Filters shared by search, answer, and research requests.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    search_type: Option<SearchType>,
    included_sources: Vec<String>,
    excluded_sources: Vec<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    country_code: Option<String>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = Some(search_type);
        self
    }

    /// Restrict results to these sources: domains, domain paths, URLs, or
    /// `provider/dataset` identifiers.
    pub fn include_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included_sources.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn exclude_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_sources.extend(sources.into_iter().map(Into::into));
        self
    }

    /// Inclusive `YYYY-MM-DD` bounds on publication date.
    pub fn start_date(mut self, date: impl Into<String>) -> Self {
        self.start_date = Some(date.into());
        self
    }

    pub fn end_date(mut self, date: impl Into<String>) -> Self {
        self.end_date = Some(date.into());
        self
    }

    /// ISO 3166-1 alpha-2 country to bias results towards.
    pub fn country_code(mut self, code: impl Into<String>) -> Self {
        self.country_code = Some(code.into());
        self
    }

    pub(crate) fn to_payload(&self) -> Result<FilterPayload, ValidationError> {
        let (included_sources, excluded_sources) =
            validate::parse_source_lists(&self.included_sources, &self.excluded_sources)?;
        let (start_date, end_date) =
            validate::parse_date_range(self.start_date.as_deref(), self.end_date.as_deref())?;
        let country_code = self
            .country_code
            .as_deref()
            .map(validate::country_code)
            .transpose()?;
        Ok(FilterPayload {
            search_type: self.search_type,
            included_sources,
            excluded_sources,
            start_date: start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            end_date: end_date.map(|d| d.format("%Y-%m-%d").to_string()),
            country_code,
        })
    }
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct FilterPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_type: Option<SearchType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub included_sources: Vec<SourceId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_sources: Vec<SourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl FilterPayload {
    pub(crate) fn is_empty(&self) -> bool {
        self.search_type.is_none()
            && self.included_sources.is_empty()
            && self.excluded_sources.is_empty()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.country_code.is_none()
    }
}

/// Treat an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept an error as a bare string or as `{"message": "..."}`.
pub(crate) fn error_message<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Object(map)) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        _ => None,
    })
}

/// Timestamps arrive as RFC 3339 strings or Unix seconds depending on the
/// endpoint; both normalize to `DateTime<Utc>`.
pub(crate) mod timestamp {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(i64),
        Fractional(f64),
    }

    pub(crate) fn optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Raw>::deserialize(deserializer)?;
        Ok(raw.and_then(|raw| match raw {
            Raw::Text(s) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Raw::Seconds(secs) => Utc.timestamp_opt(secs, 0).single(),
            Raw::Fractional(secs) => {
                Utc.timestamp_millis_opt((secs * 1000.0) as i64).single()
            }
        }))
    }
}
