//! Streaming answers: SSE frames from `POST /answer` turned into typed
//! [`AnswerEvent`]s, plus reassembly into a complete [`AnswerResponse`].

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, warn};

use super::types::{AnswerMetadata, AnswerResponse};
use crate::error::Error;
use crate::sse::{SseEvent, SseParser};
use crate::transport::extract_error_message;
use crate::types::{Content, SearchResult, normalize_results};

const DONE_MARKER: &str = "[DONE]";
const METADATA_KEYS: [&str; 5] = [
    "tx_id",
    "original_query",
    "search_metadata",
    "ai_usage",
    "cost",
];

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    /// Sources the answer is grounded on; usually sent before any text.
    SearchResults(Vec<SearchResult>),
    /// Incremental answer text.
    Content(String),
    /// Usage, cost, and transaction ids; usually sent after the text.
    Metadata(AnswerMetadata),
    /// The server signalled the end of the answer.
    Done,
}

/// A streamed answer. Yields events until [`AnswerEvent::Done`], an error,
/// or the connection closes.
pub struct AnswerStream {
    inner: Pin<Box<dyn Stream<Item = Result<AnswerEvent, Error>> + Send>>,
    structured: bool,
}

impl std::fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerStream")
            .field("structured", &self.structured)
            .finish_non_exhaustive()
    }
}

impl Stream for AnswerStream {
    type Item = Result<AnswerEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl AnswerStream {
    /// Parse an SSE byte stream.
    pub(crate) fn from_sse<S, B, E>(body: S, structured: bool) -> Self
    where
        S: Stream<Item = Result<B, E>> + Unpin + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Into<Error> + Send + 'static,
    {
        let state = SseState {
            body,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            finished: false,
        };
        let inner = stream::unfold(state, |mut st| async move {
            loop {
                if let Some(item) = st.pending.pop_front() {
                    return Some((item, st));
                }
                if st.finished {
                    return None;
                }
                match st.body.next().await {
                    Some(Ok(chunk)) => {
                        let frames = st.parser.feed(chunk.as_ref());
                        st.absorb(frames);
                    }
                    Some(Err(e)) => {
                        st.finished = true;
                        st.pending.push_back(Err(e.into()));
                    }
                    None => {
                        let frames = st.parser.finish();
                        st.absorb(frames);
                        if !st.finished {
                            warn!("answer stream closed without a completion marker");
                        }
                        st.finished = true;
                    }
                }
            }
        });
        Self {
            inner: Box::pin(inner),
            structured,
        }
    }

    /// Replay a complete JSON answer as events, for servers that ignore the
    /// streaming flag.
    pub(crate) fn from_response(response: AnswerResponse, structured: bool) -> Self {
        let mut events = Vec::with_capacity(4);
        if !response.search_results.is_empty() {
            events.push(AnswerEvent::SearchResults(normalize_results(
                response.search_results.clone(),
            )));
        }
        if !response.contents.is_empty() {
            events.push(AnswerEvent::Content(response.contents.to_text()));
        }
        events.push(AnswerEvent::Metadata(response.metadata()));
        events.push(AnswerEvent::Done);
        Self {
            inner: Box::pin(stream::iter(events.into_iter().map(Ok))),
            structured,
        }
    }

    /// Drain the stream and reassemble the deltas into a full answer.
    ///
    /// When structured output was requested and the text parses as JSON, the
    /// contents come back as [`Content::Structured`].
    pub async fn collect_answer(mut self) -> Result<AnswerResponse, Error> {
        let mut answer = AnswerResponse::default();
        let mut text = String::new();

        while let Some(event) = self.next().await {
            match event? {
                AnswerEvent::SearchResults(results) => answer.search_results.extend(results),
                AnswerEvent::Content(delta) => text.push_str(&delta),
                AnswerEvent::Metadata(meta) => answer.apply_metadata(meta),
                AnswerEvent::Done => break,
            }
        }

        answer.search_results = normalize_results(answer.search_results);
        answer.contents = if self.structured {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => Content::Structured(value),
                Err(e) => {
                    warn!(error = %e, "structured answer is not valid JSON, keeping text");
                    Content::Text(text)
                }
            }
        } else {
            Content::Text(text)
        };
        debug!(
            sources = answer.search_results.len(),
            "streamed answer collected"
        );
        Ok(answer)
    }
}

struct SseState<S> {
    body: S,
    parser: SseParser,
    pending: VecDeque<Result<AnswerEvent, Error>>,
    finished: bool,
}

impl<S> SseState<S> {
    /// Queue events from parsed frames. Nothing after `[DONE]` or an error
    /// is delivered.
    fn absorb(&mut self, frames: Vec<SseEvent>) {
        for frame in frames {
            if self.finished {
                return;
            }
            match classify_frame(&frame) {
                Ok(events) => {
                    for event in events {
                        let done = matches!(event, AnswerEvent::Done);
                        self.pending.push_back(Ok(event));
                        if done {
                            self.finished = true;
                            break;
                        }
                    }
                }
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                }
            }
        }
    }
}

/// Map one SSE frame to zero or more answer events.
pub(crate) fn classify_frame(frame: &SseEvent) -> Result<Vec<AnswerEvent>, Error> {
    let data = frame.data.trim();

    if frame.event_type() == "error" {
        let message = extract_error_message(data).unwrap_or_else(|| data.to_string());
        return Err(Error::Stream(message));
    }
    if data == DONE_MARKER {
        return Ok(vec![AnswerEvent::Done]);
    }
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| Error::Decode(format!("malformed stream frame: {e}")))?;
    let Some(obj) = value.as_object() else {
        debug!(frame = %data, "ignoring non-object stream frame");
        return Ok(Vec::new());
    };

    let failed = obj.get("success").and_then(|s| s.as_bool()) == Some(false)
        || obj.get("error").is_some_and(is_error_set);
    if failed {
        let message =
            extract_error_message(data).unwrap_or_else(|| "answer generation failed".into());
        return Err(Error::Stream(message));
    }

    let mut events = Vec::new();

    if let Some(results) = obj.get("search_results").filter(|r| !r.is_null()) {
        let results: Vec<SearchResult> = serde_json::from_value(results.clone())?;
        events.push(AnswerEvent::SearchResults(normalize_results(results)));
    }

    let delta = content_delta(obj);
    if !delta.is_empty() {
        events.push(AnswerEvent::Content(delta));
    }

    if METADATA_KEYS.iter().any(|k| obj.contains_key(*k)) {
        let meta: AnswerMetadata = serde_json::from_value(value.clone())?;
        events.push(AnswerEvent::Metadata(meta));
    }

    Ok(events)
}

/// An `error` key only counts when it carries something: empty strings,
/// empty objects, `null` and `false` are ignored.
fn is_error_set(error: &serde_json::Value) -> bool {
    match error {
        serde_json::Value::Null | serde_json::Value::Bool(false) => false,
        serde_json::Value::String(s) => !s.trim().is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Text carried by a frame: OpenAI-style `choices[].delta.content`, or a
/// bare `content` string.
fn content_delta(obj: &serde_json::Map<String, serde_json::Value>) -> String {
    if let Some(choices) = obj.get("choices").and_then(|c| c.as_array()) {
        return choices
            .iter()
            .filter_map(|choice| choice.pointer("/delta/content").and_then(|c| c.as_str()))
            .collect();
    }
    obj.get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string()
}
