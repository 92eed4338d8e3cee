// src/output.rs

//! User-facing output.
//!
//! Progress lines and streamed build logs go to the `out` sink; operator
//! errors and the interactive spinner go to the `err` sink. Diagnostics
//! are emitted through `tracing` instead and never mix with either.

use std::fmt::Display;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

/// Cloneable, thread-safe append-only text writer.
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink").finish_non_exhaustive()
    }
}

impl OutputSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// Write `text` followed by a newline.
    pub fn line(&self, text: impl Display) {
        self.write_str(&format!("{text}\n"));
    }

    /// Write `text` verbatim and flush.
    pub fn write_str(&self, text: &str) {
        let mut writer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.write_all(text.as_bytes()).and_then(|_| writer.flush()) {
            warn!(error = %e, "failed to write output");
        }
    }
}

/// The pair of sinks a command writes to.
#[derive(Debug, Clone)]
pub struct Console {
    pub out: OutputSink,
    pub err: OutputSink,
}

impl Console {
    pub fn new(out: OutputSink, err: OutputSink) -> Self {
        Self { out, err }
    }

    pub fn stdio() -> Self {
        Self::new(OutputSink::stdout(), OutputSink::stderr())
    }
}

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_INTERVAL: Duration = Duration::from_millis(100);

/// Interactive activity indicator drawn on the error sink.
///
/// Stops (and clears its line) on [`Spinner::stop`] or drop.
#[derive(Debug)]
pub struct Spinner {
    handle: Option<JoinHandle<()>>,
    sink: OutputSink,
}

impl Spinner {
    /// Start a spinner with `message`, or a no-op spinner in CI mode.
    pub fn start(sink: OutputSink, message: impl Into<String>, ci_mode: bool) -> Self {
        if ci_mode {
            return Self { handle: None, sink };
        }

        let message = message.into();
        let tick_sink = sink.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SPINNER_INTERVAL);
            for frame in SPINNER_FRAMES.iter().cycle() {
                ticker.tick().await;
                tick_sink.write_str(&format!("\r{frame} {message}"));
            }
        });

        Self {
            handle: Some(handle),
            sink,
        }
    }

    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            self.sink.write_str("\r\x1b[2K");
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn line_appends_newline() {
        let buffer = Buffer::default();
        let sink = OutputSink::new(buffer.clone());
        sink.line("waiting for build task to complete...");
        sink.write_str("raw");
        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "waiting for build task to complete...\nraw");
    }

    #[tokio::test]
    async fn ci_spinner_writes_nothing() {
        let buffer = Buffer::default();
        let spinner = Spinner::start(OutputSink::new(buffer.clone()), "monitoring", true);
        tokio::time::sleep(Duration::from_millis(250)).await;
        spinner.stop();
        assert!(buffer.0.lock().unwrap().is_empty());
    }
}
