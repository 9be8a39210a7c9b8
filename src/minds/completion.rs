//! Completion protocol: what a Mind is sent and how its answer comes back.
//!
//! A completion request is the JSON object `{"message": ..., "stream": bool}` posted to
//! the Mind's `completions` endpoint.
//!
//! * Buffered (`stream: false`): one JSON object holding the whole answer.
//! * Streamed (`stream: true`): Server-Sent-Events, one `data: <json>` frame per partial
//!   text, ending with `data: [DONE]`.
//!
//! [`CompletionStream`] is the pull-based view of the streamed variant. Each poll reads
//! just enough bytes to produce the next chunk; dropping the stream drops the response
//! body and with it the connection.
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use minds_sdk::Client;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("MY_API_KEY")?;
//! let mind = client.minds.get("mind_name").await?;
//!
//! let mut stream = mind.completion_stream("What is the capital of France?").await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::minds::error::{MindsError, Result};
use crate::minds::transport::ByteStream;

/// End-of-stream marker sent as the payload of the last frame.
pub const DONE_MARKER: &str = "[DONE]";

/// Body of a completion request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest<'a> {
    pub message: &'a str,
    pub stream: bool,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(message: &'a str, stream: bool) -> Result<Self> {
        if message.trim().is_empty() {
            return Err(MindsError::validation("completion message must not be empty"));
        }
        Ok(CompletionRequest { message, stream })
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// What [`Mind::completion_with`](crate::Mind::completion_with) hands back.
pub enum CompletionOutput {
    /// The complete answer of a buffered completion.
    Text(String),
    /// The chunks of a streamed completion.
    Stream(CompletionStream),
}

impl CompletionOutput {
    /// Wait for the whole answer regardless of the mode.
    pub async fn into_text(self) -> Result<String> {
        match self {
            CompletionOutput::Text(text) => Ok(text),
            CompletionOutput::Stream(stream) => stream.collect_text().await,
        }
    }
}

/// Extract the answer text from a buffered completion response.
pub(crate) fn extract_answer(body: &Value) -> Result<String> {
    if let Some(text) = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        return Ok(text.to_string());
    }
    if let Some(text) = body.get("content").and_then(Value::as_str) {
        return Ok(text.to_string());
    }
    if let Some(text) = body.get("message").and_then(Value::as_str) {
        return Ok(text.to_string());
    }
    match body {
        Value::String(text) => return Ok(text.clone()),
        Value::Number(n) => return Ok(n.to_string()),
        Value::Bool(b) => return Ok(b.to_string()),
        _ => {}
    }
    Err(MindsError::Decode(format!(
        "completion response carries no answer text: {}",
        body
    )))
}

/// Text carried by one decoded stream frame, if any. Error frames become errors.
pub(crate) fn frame_text(frame: &Value) -> Result<Option<String>> {
    if let Some(error) = frame.get("error").filter(|e| !e.is_null()) {
        let status = error
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        let message = match error {
            Value::String(s) => s.clone(),
            other => other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        };
        return Err(MindsError::RemoteService { status, message });
    }

    let text = frame
        .pointer("/choices/0/delta/content")
        .or_else(|| frame.pointer("/choices/0/message/content"))
        .or_else(|| frame.get("content"))
        .and_then(Value::as_str);
    Ok(text.map(str::to_string))
}

/// One event out of the SSE byte stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SseEvent {
    Data(String),
    Done,
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line is available, so frames (and multi-byte UTF-8
/// characters) may be split arbitrarily across transport chunks. The `data:` lines of
/// one event are joined with `\n` and dispatched at the blank line ending the event.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.process_line(&String::from_utf8_lossy(&line), &mut events);
        }
        events
    }

    /// Flush a trailing line that was not newline terminated and any event still open.
    pub(crate) fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = if self.buffer.is_empty() {
            Vec::new()
        } else {
            self.feed(b"\n")
        };
        self.dispatch(&mut events);
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            if data.trim() == DONE_MARKER {
                self.dispatch(events);
                events.push(SseEvent::Done);
                return;
            }
            // servers that separate JSON frames with a single newline
            if data.starts_with('{') && self.holds_complete_object() {
                self.dispatch(events);
            }
            self.data.push(data.to_string());
        } else if line.starts_with('{') {
            // newline-delimited JSON without the SSE framing
            self.dispatch(events);
            events.push(SseEvent::Data(line.to_string()));
        }
        // event:, id:, retry: and unknown fields are ignored
    }

    fn holds_complete_object(&self) -> bool {
        !self.data.is_empty()
            && serde_json::from_str::<Value>(&self.data.join("\n"))
                .map(|v| v.is_object())
                .unwrap_or(false)
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        if !self.data.is_empty() {
            events.push(SseEvent::Data(self.data.join("\n")));
            self.data.clear();
        }
    }
}

/// Lazy, finite, forward-only sequence of answer chunks.
///
/// Yields `Ok(text)` per chunk in arrival order. A failure is yielded once, at the point
/// it happens, after which the stream ends; chunks already consumed stay valid. The
/// stream is not restartable: asking again means a new completion request.
pub struct CompletionStream {
    body: Option<ByteStream>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String>>,
    delivered: usize,
    finished: bool,
}

impl CompletionStream {
    pub fn new(body: ByteStream) -> Self {
        CompletionStream {
            body: Some(body),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            delivered: 0,
            finished: false,
        }
    }

    /// Number of chunks handed to the consumer so far.
    pub fn chunks_delivered(&self) -> usize {
        self.delivered
    }

    /// Drain the stream and concatenate its chunks.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut answer = String::new();
        while let Some(chunk) = self.next().await {
            answer.push_str(&chunk?);
        }
        Ok(answer)
    }

    fn handle_events(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if self.finished {
                return;
            }
            match event {
                SseEvent::Done => self.finish(),
                SseEvent::Data(payload) => match serde_json::from_str::<Value>(&payload) {
                    Ok(frame) => match frame_text(&frame) {
                        Ok(Some(text)) => self.push_text(text),
                        // bare JSON scalars are answer text too; objects without text are not
                        Ok(None) => match frame {
                            Value::String(text) => self.push_text(text),
                            Value::Number(_) | Value::Bool(_) => {
                                self.push_text(payload.trim().to_string())
                            }
                            _ => {}
                        },
                        Err(e) => {
                            log::error!("CompletionStream: error frame: {}", e);
                            self.pending.push_back(Err(e));
                            self.finish();
                        }
                    },
                    Err(_) => self.push_text(payload),
                },
            }
        }
    }

    fn push_text(&mut self, text: String) {
        if !text.is_empty() {
            self.pending.push_back(Ok(text));
        }
    }

    // Drops the body so the connection is released as soon as the outcome is known.
    fn finish(&mut self) {
        self.finished = true;
        self.body = None;
    }

    // Chunks still queued ahead of the error count as delivered.
    fn interrupted(&self, reason: impl Into<String>) -> MindsError {
        let queued = self.pending.iter().filter(|item| item.is_ok()).count();
        MindsError::StreamInterrupted {
            chunks_delivered: self.delivered + queued,
            reason: reason.into(),
        }
    }
}

impl Stream for CompletionStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(item) = this.pending.pop_front() {
                if item.is_ok() {
                    this.delivered += 1;
                }
                return Poll::Ready(Some(item));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            let Some(body) = this.body.as_mut() else {
                this.finished = true;
                return Poll::Ready(None);
            };

            match body.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(bytes))) => {
                    let events = this.decoder.feed(&bytes);
                    this.handle_events(events);
                }
                Poll::Ready(Some(Err(e))) => {
                    let err = this.interrupted(e.to_string());
                    log::error!("CompletionStream: {}", err);
                    this.finish();
                    this.pending.push_back(Err(err));
                }
                Poll::Ready(None) => {
                    let events = this.decoder.finish();
                    this.handle_events(events);
                    if !this.finished {
                        let err = this.interrupted("connection closed before end-of-stream marker");
                        log::warn!("CompletionStream: {}", err);
                        this.finish();
                        this.pending.push_back(Err(err));
                    }
                }
            }
        }
    }
}
