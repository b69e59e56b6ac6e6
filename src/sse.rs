//! Incremental Server-Sent Events parser.
//!
//! Bytes arrive in arbitrary chunks from the network. The parser keeps a
//! streaming UTF-8 decoder so multi-byte characters split across chunks
//! survive, buffers partial lines, and emits an [`SseEvent`] every time a
//! blank line terminates a frame that carried data.
//!
//! Recognized fields: `event`, `data` (repeated lines joined with `\n`), `id`,
//! `retry`. Lines starting with `:` are comments. Unknown fields are ignored.

use encoding_rs::{Decoder, UTF_8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field; `None` means the default `message` type.
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
    /// Reconnection delay in milliseconds, if the frame carried `retry:`.
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

pub struct SseParser {
    decoder: Decoder,
    buffer: String,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
    retry: Option<u64>,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self {
            // new_decoder() strips a leading UTF-8 BOM.
            decoder: UTF_8.new_decoder(),
            buffer: String::new(),
            event: None,
            data: String::new(),
            has_data: false,
            last_id: None,
            retry: None,
        }
    }

    /// Feed a chunk of raw bytes; returns the events completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.decode(chunk, false);
        self.drain_lines(false)
    }

    /// Signal end of input. Flushes the decoder and any final unterminated
    /// line, then dispatches a pending event even without a trailing blank line.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        self.decode(&[], true);
        let mut events = self.drain_lines(true);
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn decode(&mut self, chunk: &[u8], last: bool) {
        if let Some(needed) = self.decoder.max_utf8_buffer_length(chunk.len()) {
            self.buffer.reserve(needed);
        }
        let _ = self.decoder.decode_to_string(chunk, &mut self.buffer, last);
    }

    fn drain_lines(&mut self, last: bool) -> Vec<SseEvent> {
        let mut events = Vec::new();
        let mut consumed = 0;

        while let Some(rel) = self.buffer[consumed..].find(['\r', '\n']) {
            let end = consumed + rel;
            let bytes = self.buffer.as_bytes();
            let next = if bytes[end] == b'\r' {
                match bytes.get(end + 1) {
                    Some(b'\n') => end + 2,
                    Some(_) => end + 1,
                    // A lone trailing CR may be the first half of CRLF.
                    None if !last => break,
                    None => end + 1,
                }
            } else {
                end + 1
            };

            let line = self.buffer[consumed..end].to_string();
            consumed = next;
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        self.buffer.drain(..consumed);
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let retry = self.retry.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseEvent {
            event: event.filter(|e| !e.is_empty()),
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
            retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(chunks: &[&[u8]]) -> Vec<SseEvent> {
        let mut parser = SseParser::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(parser.feed(chunk));
        }
        events.extend(parser.finish());
        events
    }

    #[test]
    fn parses_simple_events() {
        let events = parse_all(&[b"data: one\n\ndata: two\n\n"]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "one");
        assert_eq!(events[0].event_type(), "message");
        assert_eq!(events[1].data, "two");
    }

    #[test]
    fn joins_multiline_data() {
        let events = parse_all(&[b"data: line1\ndata: line2\ndata\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "line1\nline2\n");
    }

    #[test]
    fn event_id_and_retry_fields() {
        let events = parse_all(&[b"event: error\nid: 7\nretry: 1500\ndata: {\"e\":1}\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("error"));
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].retry, Some(1500));
    }

    #[test]
    fn last_event_id_persists_across_events() {
        let events = parse_all(&[b"id: 1\ndata: a\n\ndata: b\n\n"]);
        assert_eq!(events[1].id.as_deref(), Some("1"));
    }

    #[test]
    fn ignores_comments_and_unknown_fields() {
        let events = parse_all(&[b": keep-alive\nfoo: bar\ndata: x\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn blank_line_without_data_dispatches_nothing() {
        let events = parse_all(&[b"event: ping\n\ndata: real\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, None, "event type resets after a blank line");
    }

    #[test]
    fn only_one_leading_space_stripped() {
        let events = parse_all(&[b"data:  indented\n\ndata:tight\n\n"]);
        assert_eq!(events[0].data, " indented");
        assert_eq!(events[1].data, "tight");
    }

    #[test]
    fn handles_crlf_and_lone_cr() {
        let events = parse_all(&[b"data: a\r\n\r\ndata: b\r\rdata: c\n\n"]);
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b", "c"]);
    }

    #[test]
    fn crlf_split_across_chunks_is_one_terminator() {
        let events = parse_all(&[b"data: a\r", b"\n\r", b"\ndata: b\n\n"]);
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b"]);
    }

    #[test]
    fn reassembles_lines_split_mid_field() {
        let events = parse_all(&[b"da", b"ta: hel", b"lo\n", b"\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn utf8_split_across_chunks() {
        let text = "data: こんにちは\n\n".as_bytes();
        // Split inside the first multi-byte character.
        let (a, b) = text.split_at(8);
        let events = parse_all(&[a, b]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "こんにちは");
    }

    #[test]
    fn byte_at_a_time_feed() {
        let text = "event: delta\ndata: {\"t\":\"é\"}\n\n".as_bytes();
        let chunks: Vec<&[u8]> = text.chunks(1).collect();
        let events = parse_all(&chunks);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "delta");
        assert_eq!(events[0].data, "{\"t\":\"é\"}");
    }

    #[test]
    fn strips_leading_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"data: x\n\n");
        let events = parse_all(&[&bytes]);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn finish_dispatches_unterminated_event() {
        let events = parse_all(&[b"data: [DONE]"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "[DONE]");
    }

    #[test]
    fn invalid_utf8_replaced_not_dropped() {
        let events = parse_all(&[b"data: a\xFFb\n\n"]);
        assert_eq!(events[0].data, "a\u{FFFD}b");
    }
}
