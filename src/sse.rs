//! Server-Sent Events (SSE) decoding for streaming completions.
//!
//! SSE format:
//! ```text
//! data: {"choices": [{"delta": {"content": "Hi"}, "index": 0}]}
//!
//! data: [DONE]
//! ```
//!
//! Lines are split on raw bytes, so a multi-byte character cut across two
//! chunks is reassembled before it is decoded.

use std::collections::{HashSet, VecDeque};
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};

use crate::error::{ApiError, ClientError, Result};
use crate::http::{BodyStream, FetchResponse};
use crate::model::StreamEvent;

/// Lazy, single-pass sequence of stream events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Incremental decoder from body bytes to [`StreamEvent`]s.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
    finished: HashSet<u32>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[DONE]` was seen or the input was finished.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk and return the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }

        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.process_line(&line, &mut events);
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        events
    }

    /// Process whatever is left once the body has ended.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.done {
            let rest = std::mem::take(&mut self.buffer);
            self.process_line(&rest, &mut events);
        }
        self.done = true;
        events
    }

    fn process_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let Ok(text) = std::str::from_utf8(raw) else {
            tracing::trace!("skipping SSE line with invalid UTF-8");
            return;
        };
        let line = text.trim();
        if line.is_empty() {
            return;
        }

        let Some(data) = parse_sse_line(line) else {
            return;
        };
        if is_done_marker(data) {
            self.done = true;
            return;
        }

        match serde_json::from_str::<StreamEvent>(data) {
            Ok(event) => events.extend(self.drop_finished(event)),
            Err(e) => tracing::trace!("skipping malformed SSE data: {}", e),
        }
    }

    /// Remove choices whose index already reported a finish reason.
    fn drop_finished(&mut self, mut event: StreamEvent) -> Option<StreamEvent> {
        if event.choices.is_empty() {
            return Some(event);
        }

        event.choices.retain(|c| !self.finished.contains(&c.index));
        for choice in &event.choices {
            if choice.finish_reason.is_some() {
                self.finished.insert(choice.index);
            }
        }

        (!event.choices.is_empty()).then_some(event)
    }
}

struct DecodeState {
    body: Option<BodyStream>,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
}

/// Decode a streaming response into events.
///
/// Fails immediately if the response has no body. Dropping the returned
/// stream releases the body.
pub fn event_stream(response: FetchResponse) -> Result<EventStream> {
    let Some(body) = response.body else {
        return Err(ClientError::Stream("No response body for streaming".to_string()));
    };

    let state = DecodeState {
        body: Some(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
    };

    let events = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.decoder.is_done() {
                return None;
            }
            let body = state.body.as_mut()?;

            match body.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.pending.extend(events);
                    if state.decoder.is_done() {
                        state.body = None;
                    }
                }
                Some(Err(e)) => {
                    state.body = None;
                    return Some((Err(ClientError::from(ApiError::from(e))), state));
                }
                None => {
                    state.body = None;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    });

    Ok(Box::pin(events))
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`
///
/// # Example
/// ```
/// use svector::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data: ").map(|s| s.trim())
}

/// Check if an SSE data line indicates the stream is done.
///
/// # Example
/// ```
/// use svector::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}
