// src/monitor/task_subscriber.rs

//! Renders task progress from task-lifecycle events and streams each
//! finished task's build logs.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::bus::{EventBus, EventReceiver};
use crate::errors::{MonitorError, Result};
use crate::output::Console;
use crate::types::{EventDetails, EventType, ExecutionEvent, LogReference, TASK_LIFECYCLE_EVENT_TYPES};

use super::log_streamer::LogStreamer;

/// Persistent task-lifecycle consumer.
///
/// Keeps handling events until the bus closes its channel, so a pipeline of
/// several sequential tasks is reported in full.
pub struct TaskEventSubscriber {
    rx: EventReceiver,
    streamer: LogStreamer,
    console: Console,
    current_task: Option<String>,
    streamed: HashSet<LogReference>,
    tasks_finished: usize,
}

impl TaskEventSubscriber {
    /// Subscribe one channel to every task-lifecycle topic on `bus`.
    pub fn subscribe(bus: &EventBus, streamer: LogStreamer, console: Console) -> Self {
        let rx = bus.subscribe_all(&TASK_LIFECYCLE_EVENT_TYPES);
        Self {
            rx,
            streamer,
            console,
            current_task: None,
            streamed: HashSet::new(),
            tasks_finished: 0,
        }
    }

    /// Run until the channel closes. Returns how many tasks finished.
    pub async fn run(mut self) -> usize {
        while let Some(event) = self.rx.recv().await {
            self.handle(event).await;
        }
        debug!(tasks = self.tasks_finished, "task subscriber channel closed");
        self.tasks_finished
    }

    async fn handle(&mut self, event: ExecutionEvent) {
        match (&event.event_type, &event.details) {
            (EventType::TaskStateEntered, EventDetails::StateEntered { name, .. }) => {
                self.console
                    .out
                    .line(format!("waiting for {name} task to complete..."));
                self.current_task = Some(name.clone());
            }
            (EventType::TaskStateExited, EventDetails::StateExited { name, output }) => {
                let name = name.clone();
                self.stream_task_logs(event.id, output.as_deref()).await;
                self.console.out.line(format!("task {name} completed"));
                self.finish_task();
            }
            (EventType::TaskFailed, EventDetails::TaskFailed { error, cause, .. }) => {
                let name = self
                    .current_task
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                let error = error.clone().unwrap_or_else(|| "unknown error".to_string());
                self.stream_task_logs(event.id, cause.as_deref()).await;
                self.console.out.line(format!("task {name} failed: {error}"));
                self.finish_task();
            }
            (ty, _) => {
                debug!(event_id = event.id, topic = %ty, "task event ignored");
            }
        }
    }

    fn finish_task(&mut self) {
        self.tasks_finished += 1;
    }

    /// Stream the logs referenced by `document`. Every failure is reported
    /// and swallowed.
    async fn stream_task_logs(&mut self, event_id: i64, document: Option<&str>) {
        let reference = match parse_reference(document) {
            Ok(reference) => reference,
            Err(err) => {
                warn!(event_id, error = %err, "no log reference for task");
                self.console
                    .err
                    .line(format!("failed to get task log details: {err}"));
                return;
            }
        };

        if !self.streamed.insert(reference.clone()) {
            debug!(event_id, log = %reference, "logs already streamed for this task");
            return;
        }

        if let Err(err) = self.streamer.stream(&reference).await {
            warn!(
                event_id,
                log_group = %reference.log_group,
                log_stream = %reference.log_stream,
                error = %err,
                "log streaming failed"
            );
            self.console
                .err
                .line(format!("failed to stream logs for {reference}"));
        }
    }
}

fn parse_reference(document: Option<&str>) -> Result<LogReference> {
    match document {
        Some(doc) => LogReference::from_document(doc),
        None => Err(MonitorError::MalformedPayload(
            "event carries no output document".to_string(),
        )),
    }
}
