//! Client-side request validation: composite source identifiers, dates,
//! country codes, URL lists, and task identifiers.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Serialize, Serializer};

pub const MAX_RESULTS: u32 = 20;
pub const MAX_URLS: usize = 10;
pub const MAX_SYSTEM_INSTRUCTIONS_CHARS: usize = 2_000;
pub const MAX_STRATEGY_CHARS: usize = 15_000;

/// Characters to percent-encode in a single URL path segment.
/// Unlike a file path, `/` is encoded too so an id can never add segments.
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'@')
    .add(b'[')
    .add(b']')
    .add(b';')
    .add(b'=')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error(
        "invalid source '{0}': expected a domain (example.com), a domain path (example.com/blog), a URL (https://example.com/page), or a dataset (provider/dataset)"
    )]
    InvalidSource(String),

    #[error("source '{0}' is both included and excluded")]
    ConflictingSource(String),

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("start date {start} is after end date {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid country code '{0}': expected two ASCII letters (e.g. US)")]
    InvalidCountryCode(String),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },

    #[error("{field} must be a positive number, got {value}")]
    InvalidPrice { field: &'static str, value: f64 },

    #[error("invalid URL '{0}': must be an absolute HTTP(S) URL")]
    InvalidUrl(String),

    #[error("at least one URL is required")]
    NoUrls,

    #[error("too many URLs: {count} given, at most {max} allowed")]
    TooManyUrls { count: usize, max: usize },

    #[error("invalid task id '{0}'")]
    InvalidTaskId(String),

    #[error("webhook URL must use HTTPS: {0}")]
    InsecureWebhook(String),

    #[error("{field} is too long: {len} characters, at most {max} allowed")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{field} must be a JSON object schema")]
    InvalidSchema { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("a JSON schema output format cannot be combined with other formats")]
    ConflictingOutputFormats,
}

/// A composite source identifier used to scope searches.
///
/// Parsed from user strings with [`FromStr`]; serializes back to the
/// normalized string form the API expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    /// Absolute HTTP(S) URL, e.g. `https://arxiv.org/abs`.
    Url(String),
    /// Bare host name, e.g. `arxiv.org`.
    Domain(String),
    /// Host name plus path prefix, e.g. `example.com/blog/rust`.
    DomainPath(String),
    /// Provider-scoped dataset, e.g. `sift/arxiv`.
    Dataset { provider: String, name: String },
}

impl SourceId {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceId::Url(_) => "url",
            SourceId::Domain(_) => "domain",
            SourceId::DomainPath(_) => "domain_path",
            SourceId::Dataset { .. } => "dataset",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Url(s) | SourceId::Domain(s) | SourceId::DomainPath(s) => f.write_str(s),
            SourceId::Dataset { provider, name } => write!(f, "{provider}/{name}"),
        }
    }
}

impl Serialize for SourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for SourceId {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_source(raw)
    }
}

pub fn parse_source(raw: &str) -> Result<SourceId, ValidationError> {
    let s = raw.trim();
    let err = || ValidationError::InvalidSource(raw.to_string());

    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(err());
    }

    if let Some((_, after_scheme)) = s.split_once("://") {
        // The parser resolves dot segments, so check the text as written.
        if has_traversal(raw_url_path(after_scheme)) {
            return Err(err());
        }
        let parsed = url::Url::parse(s).map_err(|_| err())?;
        if !matches!(parsed.scheme(), "http" | "https")
            || parsed.host().is_none()
            || !parsed.username().is_empty()
            || parsed.password().is_some()
        {
            return Err(err());
        }
        return Ok(SourceId::Url(s.to_string()));
    }

    let (head, rest) = match s.split_once('/') {
        Some((head, rest)) => (head, Some(rest)),
        None => (s, None),
    };

    if head.contains('.') {
        let host = head.to_ascii_lowercase();
        if !is_valid_domain(&host) {
            return Err(err());
        }
        return match rest {
            None => Ok(SourceId::Domain(host)),
            Some("") => Ok(SourceId::Domain(host)),
            Some(path) if is_valid_path(path) => {
                Ok(SourceId::DomainPath(format!("{host}/{path}")))
            }
            Some(_) => Err(err()),
        };
    }

    match rest {
        Some(name) if is_dataset_segment(head, false) && is_dataset_segment(name, true) => {
            Ok(SourceId::Dataset {
                provider: head.to_ascii_lowercase(),
                name: name.to_ascii_lowercase(),
            })
        }
        _ => Err(err()),
    }
}

fn is_valid_domain(host: &str) -> bool {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 || host.len() > 253 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    // A TLD of pure digits means this is an IP literal, not a domain.
    let tld_ok = labels
        .last()
        .is_some_and(|tld| tld.chars().any(|c| c.is_ascii_alphabetic()));
    labels_ok && tld_ok
}

fn is_valid_path(path: &str) -> bool {
    !path.contains(['?', '#']) && !has_traversal(path)
}

/// Path part of `host[:port]/path?query#fragment`, before any query.
fn raw_url_path(after_scheme: &str) -> &str {
    let end = after_scheme.find(['?', '#']).unwrap_or(after_scheme.len());
    let before_query = &after_scheme[..end];
    before_query
        .find(['/', '\\'])
        .map_or("", |start| &before_query[start..])
}

/// True if any segment is `..`, including percent-encoded forms like `%2e%2e`.
fn has_traversal(path: &str) -> bool {
    path.split(['/', '\\']).any(|seg| {
        seg == ".." || percent_decode_str(seg).decode_utf8_lossy().trim() == ".."
    })
}

fn is_dataset_segment(seg: &str, allow_dot: bool) -> bool {
    !seg.is_empty()
        && seg != "."
        && seg != ".."
        && seg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_') || (allow_dot && c == '.'))
}

/// Parse include/exclude lists, rejecting any source named in both.
pub fn parse_source_lists(
    included: &[String],
    excluded: &[String],
) -> Result<(Vec<SourceId>, Vec<SourceId>), ValidationError> {
    let included = included
        .iter()
        .map(|s| parse_source(s))
        .collect::<Result<Vec<_>, _>>()?;
    let excluded = excluded
        .iter()
        .map(|s| parse_source(s))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(dup) = included.iter().find(|s| excluded.contains(s)) {
        return Err(ValidationError::ConflictingSource(dup.to_string()));
    }
    Ok((included, excluded))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let s = raw.trim();
    // chrono accepts unpadded fields; the API only takes the fixed-width form.
    if s.len() != 10 {
        return Err(ValidationError::InvalidDate(raw.to_string()));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

pub fn parse_date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), ValidationError> {
    let start = start.map(parse_date).transpose()?;
    let end = end.map(parse_date).transpose()?;
    if let (Some(start), Some(end)) = (start, end)
        && start > end
    {
        return Err(ValidationError::DateRange { start, end });
    }
    Ok((start, end))
}

pub fn country_code(raw: &str) -> Result<String, ValidationError> {
    let s = raw.trim();
    if s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(s.to_ascii_uppercase())
    } else {
        Err(ValidationError::InvalidCountryCode(raw.to_string()))
    }
}

pub fn query(raw: &str) -> Result<&str, ValidationError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    Ok(s)
}

pub fn max_chars(field: &'static str, text: &str, max: usize) -> Result<(), ValidationError> {
    let len = text.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, len, max });
    }
    Ok(())
}

pub fn max_results(n: u32) -> Result<u32, ValidationError> {
    if !(1..=MAX_RESULTS).contains(&n) {
        return Err(ValidationError::OutOfRange {
            field: "max_num_results",
            value: n.to_string(),
            min: "1".into(),
            max: MAX_RESULTS.to_string(),
        });
    }
    Ok(n)
}

pub fn relevance_threshold(t: f64) -> Result<f64, ValidationError> {
    if !(0.0..=1.0).contains(&t) {
        return Err(ValidationError::OutOfRange {
            field: "relevance_threshold",
            value: t.to_string(),
            min: "0".into(),
            max: "1".into(),
        });
    }
    Ok(t)
}

pub fn price(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidPrice { field, value });
    }
    Ok(value)
}

pub fn http_url(raw: &str) -> Result<url::Url, ValidationError> {
    let err = || ValidationError::InvalidUrl(raw.to_string());
    let parsed = url::Url::parse(raw.trim()).map_err(|_| err())?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(parsed),
        _ => Err(err()),
    }
}

/// Validate a URL list of 1..=`max` entries. Returns the trimmed URLs.
pub fn url_list(urls: &[String], max: usize) -> Result<Vec<String>, ValidationError> {
    if urls.is_empty() {
        return Err(ValidationError::NoUrls);
    }
    optional_url_list(urls, max)
}

/// Like [`url_list`] but an empty list is allowed.
pub fn optional_url_list(urls: &[String], max: usize) -> Result<Vec<String>, ValidationError> {
    if urls.len() > max {
        return Err(ValidationError::TooManyUrls {
            count: urls.len(),
            max,
        });
    }
    urls.iter()
        .map(|u| http_url(u).map(|_| u.trim().to_string()))
        .collect()
}

pub fn webhook_url(raw: &str) -> Result<String, ValidationError> {
    let parsed = http_url(raw)?;
    if parsed.scheme() != "https" {
        return Err(ValidationError::InsecureWebhook(raw.to_string()));
    }
    Ok(raw.trim().to_string())
}

pub fn json_schema(
    field: &'static str,
    schema: &serde_json::Value,
) -> Result<(), ValidationError> {
    match schema.as_object() {
        Some(map) if !map.is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidSchema { field }),
    }
}

/// Validate a task id and encode it as a single URL path segment.
pub fn task_id_segment(id: &str) -> Result<String, ValidationError> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ValidationError::InvalidTaskId(id.to_string()));
    }
    Ok(utf8_percent_encode(id, SEGMENT_ENCODE_SET).to_string())
}
