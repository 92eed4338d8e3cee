// src/monitor/orchestrator.rs

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::errors::MonitorError;
use crate::output::{Console, Spinner};
use crate::source::{HistorySource, LogSource};
use crate::types::{EventType, ExecutionEvent, TERMINAL_EVENT_TYPES};

use super::deadline::{CancelCause, Deadline};
use super::log_streamer::LogStreamer;
use super::poller::{PollOutcome, Poller};
use super::task_subscriber::TaskEventSubscriber;
use super::{ExecutionVerdict, MonitorOptions};

/// Wires the poller, the task subscriber and the terminal-event waiter
/// around one event bus and one deadline.
pub struct Monitor {
    history: Arc<dyn HistorySource>,
    logs: Arc<dyn LogSource>,
    console: Console,
    options: MonitorOptions,
}

impl Monitor {
    pub fn new(
        history: Arc<dyn HistorySource>,
        logs: Arc<dyn LogSource>,
        console: Console,
        options: MonitorOptions,
    ) -> Self {
        Self {
            history,
            logs,
            console,
            options,
        }
    }

    /// Monitor `execution_arn` until it ends or the deadline fires.
    pub async fn watch(&self, execution_arn: &str) -> ExecutionVerdict {
        let bus = Arc::new(EventBus::new());
        let deadline = Deadline::start(self.options.execution_timeout);

        // Subscribers register before the poller publishes anything.
        let streamer = LogStreamer::new(
            Arc::clone(&self.logs),
            self.options.noise_filter.clone(),
            self.options.verbose,
            self.console.out.clone(),
        );
        let subscriber = TaskEventSubscriber::subscribe(&bus, streamer, self.console.clone());
        let subscriber_handle = tokio::spawn(subscriber.run());

        let terminal_rx = bus.subscribe_all(&TERMINAL_EVENT_TYPES);
        let waiter_handle = tokio::spawn(wait_for_terminal(terminal_rx, deadline.clone()));

        let spinner = Spinner::start(
            self.console.err.clone(),
            format!("waiting for {execution_arn}"),
            self.options.ci_mode,
        );

        let poller = Poller::new(
            Arc::clone(&self.history),
            execution_arn,
            self.options.refresh_rate,
            self.console.out.clone(),
        );
        let poller_handle = tokio::spawn(poller.run(Arc::clone(&bus), deadline.clone()));

        let (history, outcome) = match poller_handle.await {
            Ok(result) => result,
            Err(join_err) => {
                deadline.cancel(CancelCause::PollerStopped);
                let err = anyhow::anyhow!("history poller task failed: {join_err}");
                (Default::default(), PollOutcome::Error(MonitorError::Other(err)))
            }
        };
        spinner.stop();

        match waiter_handle.await {
            Ok(Some(ty)) => debug!(topic = %ty, "terminal waiter observed event"),
            Ok(None) => debug!(cause = ?deadline.cause(), "terminal waiter released"),
            Err(e) => warn!(error = %e, "terminal waiter task failed"),
        }

        let closed = bus.close();
        debug!(channels = closed, "bus closed after poller exit");

        // The subscriber may still be streaming logs after a terminal event;
        // it gets until the wall-clock deadline and no longer.
        let mut subscriber_handle = subscriber_handle;
        let drained = tokio::select! {
            res = &mut subscriber_handle => Some(res),
            _ = tokio::time::sleep_until(deadline.expires_at()) => None,
        };
        match drained {
            Some(Ok(tasks)) => debug!(tasks, "task subscriber finished"),
            Some(Err(e)) => warn!(error = %e, "task subscriber task failed"),
            None => {
                subscriber_handle.abort();
                if !matches!(outcome, PollOutcome::TimedOut) {
                    self.console
                        .err
                        .line("log streaming stopped at the execution deadline");
                }
                warn!(timeout = ?deadline.timeout(), "task subscriber aborted at deadline");
            }
        }

        deadline.cancel(CancelCause::Finished);

        let verdict = ExecutionVerdict::from_history(&history, outcome, deadline.timeout());
        info!(
            execution = %execution_arn,
            events = history.len(),
            terminal = ?verdict.terminal,
            success = verdict.is_success(),
            "monitoring finished"
        );
        verdict
    }
}

/// Block until a terminal event arrives, then cancel the shared context.
///
/// Returns early with `None` if the context is cancelled first.
async fn wait_for_terminal(
    mut rx: UnboundedReceiver<ExecutionEvent>,
    deadline: Deadline,
) -> Option<EventType> {
    tokio::select! {
        event = rx.recv() => {
            let event = event?;
            deadline.cancel(CancelCause::TerminalEvent);
            Some(event.event_type)
        }
        _ = deadline.cancelled() => None,
    }
}
