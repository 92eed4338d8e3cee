// src/monitor/log_streamer.rs

//! Streams every line of one log stream to the output sink.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::errors::Result;
use crate::output::OutputSink;
use crate::source::LogSource;
use crate::types::LogReference;

/// Matches infrastructure-internal log lines hidden outside verbose mode.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    pattern: Regex,
}

impl NoiseFilter {
    pub fn new(pattern: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn is_noise(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

/// What a streaming attempt wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub pages: usize,
    pub lines_written: usize,
    pub lines_filtered: usize,
}

#[derive(Clone)]
pub struct LogStreamer {
    source: Arc<dyn LogSource>,
    filter: NoiseFilter,
    verbose: bool,
    out: OutputSink,
}

impl LogStreamer {
    pub fn new(
        source: Arc<dyn LogSource>,
        filter: NoiseFilter,
        verbose: bool,
        out: OutputSink,
    ) -> Self {
        Self {
            source,
            filter,
            verbose,
            out,
        }
    }

    /// Fetch from the head of the stream and keep following the forward
    /// token until it stops advancing.
    ///
    /// The page whose token equals the previous one marks the end of the
    /// stream and is not written. Fetch errors are returned as-is.
    pub async fn stream(&self, reference: &LogReference) -> Result<StreamStats> {
        debug!(log_group = %reference.log_group, log_stream = %reference.log_stream, "streaming logs");

        let mut stats = StreamStats::default();
        let mut page = self.source.fetch_logs(reference, None).await?;
        stats.pages += 1;

        loop {
            for line in &page.lines {
                self.emit(line, &mut stats);
            }

            let current = page.next_token.clone();
            page = self.source.fetch_logs(reference, current.as_deref()).await?;
            stats.pages += 1;

            if page.next_token == current {
                break;
            }
        }

        debug!(
            log_group = %reference.log_group,
            log_stream = %reference.log_stream,
            pages = stats.pages,
            written = stats.lines_written,
            filtered = stats.lines_filtered,
            "log stream drained"
        );
        Ok(stats)
    }

    fn emit(&self, line: &str, stats: &mut StreamStats) {
        if !self.verbose && self.filter.is_noise(line) {
            stats.lines_filtered += 1;
            return;
        }
        if line.ends_with('\n') {
            self.out.write_str(line);
        } else {
            self.out.line(line);
        }
        stats.lines_written += 1;
    }
}
