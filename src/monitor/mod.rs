// src/monitor/mod.rs

//! Execution monitor.
//!
//! This module ties together:
//! - the history [`poller`], which is the single producer on the event bus
//! - the [`task_subscriber`], which renders task progress and pulls logs
//! - the [`log_streamer`], which pages through one log stream
//! - the [`orchestrator`], which owns the [`deadline`] and derives the
//!   final [`ExecutionVerdict`]
//!
//! The poller owns the [`EventHistory`] while it runs and hands it back to
//! the orchestrator when it stops; nothing else ever writes to it.

use std::time::Duration;

use crate::config::ConfigFile;
use crate::errors::{MonitorError, Result};
use crate::types::EventType;

pub mod deadline;
pub mod history;
pub mod log_streamer;
pub mod orchestrator;
pub mod poller;
pub mod task_subscriber;

pub use deadline::{CancelCause, Deadline};
pub use history::EventHistory;
pub use log_streamer::{LogStreamer, NoiseFilter, StreamStats};
pub use orchestrator::Monitor;
pub use poller::{PollOutcome, Poller, ingest_page};
pub use task_subscriber::TaskEventSubscriber;

/// Knobs for one monitor run.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub refresh_rate: Duration,
    pub execution_timeout: Duration,
    pub ci_mode: bool,
    pub verbose: bool,
    pub noise_filter: NoiseFilter,
}

impl MonitorOptions {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            refresh_rate: cfg.monitor.refresh_rate,
            execution_timeout: cfg.monitor.execution_timeout,
            ci_mode: cfg.monitor.ci_mode,
            verbose: cfg.monitor.verbose,
            noise_filter: cfg.noise_filter.clone(),
        }
    }
}

/// Final classification of a monitored execution.
#[derive(Debug)]
pub struct ExecutionVerdict {
    /// Type of the last observed terminal event, if any arrived.
    pub terminal: Option<EventType>,
    /// `None` only for a successful execution.
    pub error: Option<MonitorError>,
}

impl ExecutionVerdict {
    /// Derive the verdict from the last event in `history`, falling back to
    /// the poller's outcome when no terminal event was observed.
    pub fn from_history(history: &EventHistory, outcome: PollOutcome, timeout: Duration) -> Self {
        if let Some(event) = history.terminal_event() {
            let terminal = event.event_type.clone();
            let error = (!terminal.is_success())
                .then(|| MonitorError::ExecutionEnded(terminal.clone()));
            return Self {
                terminal: Some(terminal),
                error,
            };
        }

        let error = match outcome {
            PollOutcome::Error(err) => err,
            PollOutcome::TimedOut => MonitorError::DeadlineExceeded(timeout),
            PollOutcome::Completed => MonitorError::NoTerminalEvent,
        };
        Self {
            terminal: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<()> {
        match self.error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}
