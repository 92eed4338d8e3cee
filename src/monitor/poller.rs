// src/monitor/poller.rs

//! Execution history poller.
//!
//! Polls one execution's history page by page, publishes every event it has
//! not seen before on the bus (topic = event type), and stops once a
//! terminal event arrives, a fetch fails, or the deadline fires.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::errors::MonitorError;
use crate::output::OutputSink;
use crate::source::{HistoryPage, HistorySource};

use super::deadline::{CancelCause, Deadline};
use super::history::EventHistory;

/// How a polling run ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// A terminal execution event was observed and published.
    Completed,
    /// The deadline fired before a terminal event arrived.
    TimedOut,
    /// Fetching history failed.
    Error(MonitorError),
}

impl PollOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PollOutcome::Completed)
    }
}

pub struct Poller {
    source: Arc<dyn HistorySource>,
    execution_arn: String,
    refresh_rate: Duration,
    out: OutputSink,
}

impl Poller {
    pub fn new(
        source: Arc<dyn HistorySource>,
        execution_arn: impl Into<String>,
        refresh_rate: Duration,
        out: OutputSink,
    ) -> Self {
        Self {
            source,
            execution_arn: execution_arn.into(),
            refresh_rate,
            out,
        }
    }

    /// Poll until completion, error or deadline. Returns the full history
    /// together with the outcome.
    pub async fn run(self, bus: Arc<EventBus>, deadline: Deadline) -> (EventHistory, PollOutcome) {
        let mut history = EventHistory::new();
        let outcome = self.poll_loop(&bus, &deadline, &mut history).await;

        match &outcome {
            PollOutcome::Completed => {
                self.out.line("execution of state machine completed");
            }
            PollOutcome::TimedOut => {
                self.out.line("cli execution timed out");
            }
            PollOutcome::Error(err) => {
                error!(execution = %self.execution_arn, error = %err, "history polling stopped");
                deadline.cancel(CancelCause::PollerStopped);
            }
        }

        (history, outcome)
    }

    async fn poll_loop(
        &self,
        bus: &EventBus,
        deadline: &Deadline,
        history: &mut EventHistory,
    ) -> PollOutcome {
        self.out
            .line(format!("monitoring execution of {}", self.execution_arn));
        info!(execution = %self.execution_arn, refresh = ?self.refresh_rate, "polling started");

        let mut next_token: Option<String> = None;

        loop {
            let fetch = self
                .source
                .fetch_history(&self.execution_arn, next_token.as_deref());

            let page = tokio::select! {
                biased;
                _ = deadline.cancelled() => return self.stopped_by(deadline),
                res = fetch => match res {
                    Ok(page) => page,
                    Err(err) => return PollOutcome::Error(err),
                },
            };

            next_token = page.next_token.clone();
            if ingest_page(page, bus, history) {
                info!(execution = %self.execution_arn, events = history.len(), "terminal event observed");
                return PollOutcome::Completed;
            }

            if deadline.is_cancelled() {
                return self.stopped_by(deadline);
            }

            tokio::select! {
                biased;
                _ = deadline.cancelled() => return self.stopped_by(deadline),
                _ = tokio::time::sleep(self.refresh_rate) => {}
            }
        }
    }

    fn stopped_by(&self, deadline: &Deadline) -> PollOutcome {
        if !deadline.expired() {
            warn!(cause = ?deadline.cause(), "polling cancelled before a terminal event");
        }
        PollOutcome::TimedOut
    }
}

/// Publish and record every unseen event of `page`, in page order.
///
/// Returns true if the page contained a terminal event. The terminal flag is
/// only acted on after the whole page is processed.
pub fn ingest_page(page: HistoryPage, bus: &EventBus, history: &mut EventHistory) -> bool {
    let mut completed = false;

    for event in page.events {
        if history.contains(event.id) {
            continue;
        }

        let topic = event.event_type.clone();
        let delivered = bus.publish(&topic, &event);
        debug!(event_id = event.id, %topic, delivered, "published event");

        if topic.is_terminal() {
            completed = true;
        }
        history.insert(event);
    }

    completed
}
