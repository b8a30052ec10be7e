//! Build event rendering
//!
//! Every classified record becomes one newline-terminated line. The line is
//! appended to the aggregate build log and written to each live sink in
//! record order. Live sinks are best-effort: a failing sink is skipped and
//! never affects the aggregate log.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use csvc_core::{BuildEventRecord, EngineEvent};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Destination for rendered build lines
pub trait EventSink: Send {
    /// Write one rendered line (newline included)
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Called once after the last line
    fn finish(&mut self) {}
}

/// Writes lines to standard output
#[derive(Debug, Default)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(line.as_bytes())?;
        stdout.flush()
    }
}

/// Emits lines as `info` tracing events
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        info!(target: "csvc::build_output", "{}", line.trim_end());
        Ok(())
    }
}

/// Shared in-memory sink, readable while the build is running
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<String>>,
}

impl SharedBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents
    pub fn contents(&self) -> String {
        self.inner.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl EventSink for SharedBuffer {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut buf = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("shared buffer lock poisoned"))?;
        buf.push_str(line);
        Ok(())
    }
}

/// Terminal spinner showing the latest build line
pub struct SpinnerSink {
    bar: ProgressBar,
}

impl SpinnerSink {
    /// Create a spinner with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner:.green} [{elapsed_precise}] {wide_msg}")
        {
            bar.set_style(style);
        }
        bar.set_prefix(prefix.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl EventSink for SpinnerSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.bar.set_message(line.trim_end().to_string());
        Ok(())
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Render a record as one line, or `None` for records that are skipped
pub fn render_record(record: &BuildEventRecord) -> Option<String> {
    if record.is_empty() {
        return None;
    }

    let mut line = match record {
        BuildEventRecord::LogLine { text, .. } => {
            format!("[{}] {}", record.timestamp_str().unwrap_or_default(), text)
        }
        BuildEventRecord::Structured { event, raw } => render_event(event, raw),
        BuildEventRecord::Unrecognized { raw, reason } => {
            format!("unrecognized event ({reason}): {}", compact(raw))
        }
    };

    if !line.ends_with('\n') {
        line.push('\n');
    }
    Some(line)
}

fn render_event(event: &EngineEvent, raw: &Map<String, Value>) -> String {
    if let Some(message) = event.error_message() {
        return match event.error_detail.as_ref().and_then(|d| d.code) {
            Some(code) => format!("error: {message} (code {code})"),
            None => format!("error: {message}"),
        };
    }

    let mut parts = Vec::new();
    if let Some(status) = &event.status {
        parts.push(status.clone());
    }
    if let Some(progress) = &event.progress {
        parts.push(progress.clone());
    } else if let Some(detail) = &event.progress_detail {
        if let (Some(current), Some(total)) = (detail.current, detail.total) {
            parts.push(format!("{current}/{total}"));
        }
    }
    let body = parts.join(" ");

    match (&event.id, body.is_empty()) {
        (Some(id), false) => format!("{id}: {body}"),
        (Some(id), true) => id.clone(),
        (None, false) => body,
        (None, true) => match &event.aux {
            Some(aux) => format!("aux: {aux}"),
            None => compact(raw),
        },
    }
}

/// Single-line JSON dump of a raw record
fn compact(raw: &Map<String, Value>) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| format!("{raw:?}"))
}

/// Fans rendered lines out to live sinks and keeps the aggregate log
#[derive(Default)]
pub struct EventRenderer {
    sinks: Vec<Box<dyn EventSink>>,
    log: String,
    lines: usize,
}

impl EventRenderer {
    /// Create a renderer with no live sinks
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a live sink
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Builder-style variant of [`Self::add_sink`]
    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.add_sink(sink);
        self
    }

    /// Render one record to the log and every sink
    pub fn render(&mut self, record: &BuildEventRecord) {
        let Some(line) = render_record(record) else {
            return;
        };

        self.log.push_str(&line);
        self.lines += 1;

        for sink in &mut self.sinks {
            if let Err(e) = sink.write_line(&line) {
                debug!("Live sink write failed: {}", e);
            }
        }
    }

    /// Number of lines rendered so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Finish all sinks and hand back the aggregate log
    pub fn into_log(mut self) -> String {
        for sink in &mut self.sinks {
            sink.finish();
        }
        std::mem::take(&mut self.log)
    }
}
