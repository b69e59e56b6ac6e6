//! Typed client for the Sift search, answer, and deep research API.
//!
//! - [`Client::search`]: ranked results across the web and proprietary datasets
//! - [`Client::contents`]: extract clean content from up to ten URLs
//! - [`Client::answer`] / [`Client::answer_stream`]: grounded answers, whole or
//!   streamed over server-sent events
//! - [`Client::research`]: long-running research tasks with polling helpers
//!
//! Requests are validated client-side before anything is sent; see
//! [`validate`] for the accepted source identifier forms.

mod answer;
mod client;
mod config;
mod contents;
mod error;
mod research;
mod search;
pub mod sse;
mod transport;
mod types;
pub mod validate;

pub use answer::{
    AiUsage, AnswerCost, AnswerEvent, AnswerMetadata, AnswerRequest, AnswerResponse,
    AnswerStream, SearchMetadata,
};
pub use client::Client;
pub use config::{API_KEY_ENV, BASE_URL_ENV, ClientConfig, DEFAULT_BASE_URL, TIMEOUT_ENV};
pub use contents::{ContentsRequest, ContentsResponse, ContentsResult, ExtractEffort, Summary};
pub use error::Error;
pub use research::{
    OutputFormat, Progress, Research, ResearchMode, ResearchRequest, ResearchTask, TaskStatus,
    WaitOptions,
};
pub use search::{SearchRequest, SearchResponse};
pub use types::{Content, ResponseLength, SearchFilters, SearchResult, SearchType};
pub use validate::{SourceId, ValidationError};

pub const USER_AGENT: &str = concat!("sift/", env!("CARGO_PKG_VERSION"), " (Rust client)");
