//! Build progress feed decoding
//!
//! The engine answers a build with newline-delimited JSON objects. Each
//! object is classified as a free-text log line or a structured event.
//! Broken framing (anything that is not a JSON object) stops decoding for
//! good; a well-formed object with an unexpected shape only degrades to an
//! [`BuildEventRecord::Unrecognized`] record.

use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Local, SubsecRound};
use csvc_core::{BuildEventRecord, EngineEvent};
use futures::Stream;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::error::{DockerError, Result};

/// Key of the free-text field in the engine's feed
pub const STREAM_FIELD: &str = "stream";

/// A record that is valid JSON but not a valid structured event
#[derive(Error, Debug)]
#[error("cannot interpret build event: {0}")]
pub struct InterpretationError(#[from] serde_json::Error);

/// Re-interpret a decoded record as a structured engine event
pub fn interpret_event(raw: &Map<String, Value>) -> std::result::Result<EngineEvent, InterpretationError> {
    let event = serde_json::from_value(Value::Object(raw.clone()))?;
    Ok(event)
}

/// Classify one decoded record
pub fn classify_record(raw: Map<String, Value>, timestamp: DateTime<Local>) -> BuildEventRecord {
    if let Some(Value::String(text)) = raw.get(STREAM_FIELD) {
        return BuildEventRecord::LogLine { timestamp, text: text.clone() };
    }

    match interpret_event(&raw) {
        Ok(event) => BuildEventRecord::Structured { event, raw },
        Err(e) => {
            let record = serde_json::to_string(&raw).unwrap_or_default();
            warn!("{}, using raw record: {}", e, record);
            BuildEventRecord::Unrecognized { raw, reason: e.to_string() }
        }
    }
}

/// Stream adapter turning raw body chunks into classified records
pub struct EventStreamDecoder<S> {
    inner: S,
    buffer: Vec<u8>,
    records: usize,
    last_timestamp: Option<DateTime<Local>>,
    done: bool,
}

impl<S> EventStreamDecoder<S> {
    /// Create a new decoder over a body stream
    pub fn new(stream: S) -> Self {
        Self { inner: stream, buffer: Vec::new(), records: 0, last_timestamp: None, done: false }
    }

    /// Number of records decoded so far
    pub fn records_processed(&self) -> usize {
        self.records
    }

    /// Wall-clock time at millisecond precision, never earlier than the
    /// previous record's
    fn next_timestamp(&mut self) -> DateTime<Local> {
        let now = Local::now().trunc_subsecs(3);
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }

    /// Take the next complete line out of the buffer
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let newline_pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        line.pop();
        Some(line)
    }

    fn fail(&mut self, reason: impl Into<String>) -> DockerError {
        self.done = true;
        self.buffer.clear();
        DockerError::Decode { records_processed: self.records, reason: reason.into() }
    }

    /// Decode one framed line; `None` for blank lines
    fn decode_line(&mut self, line: &[u8]) -> Option<Result<BuildEventRecord>> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        match serde_json::from_slice::<Map<String, Value>>(line) {
            Ok(raw) => {
                self.records += 1;
                let timestamp = self.next_timestamp();
                Some(Ok(classify_record(raw, timestamp)))
            }
            Err(e) => Some(Err(self.fail(format!("error decoding event: {e}")))),
        }
    }
}

impl<S> Stream for EventStreamDecoder<S>
where
    S: Stream<Item = Result<Vec<u8>>> + Unpin,
{
    type Item = Result<BuildEventRecord>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            // Process complete lines
            while let Some(line) = self.take_line() {
                if let Some(item) = self.decode_line(&line) {
                    return Poll::Ready(Some(item));
                }
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(e))) => {
                    let err = self.fail(e.to_string());
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    // Process any remaining buffer
                    self.done = true;
                    let rest = std::mem::take(&mut self.buffer);
                    return Poll::Ready(self.decode_line(&rest));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
