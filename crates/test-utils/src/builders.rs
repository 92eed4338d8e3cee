use std::time::Duration;

use chrono::Utc;
use stepwatch::monitor::{MonitorOptions, NoiseFilter};
use stepwatch::source::{HistoryPage, LogPage};
use stepwatch::types::{EventDetails, EventType, ExecutionEvent, LogReference};

/// Task output document pointing at `group`/`stream`.
pub fn log_output_document(group: &str, stream: &str) -> String {
    format!(
        r#"{{"Build":{{"Arn":"arn:build:{stream}","Logs":{{"GroupName":"{group}","StreamName":"{stream}","DeepLink":"https://console/{stream}"}}}}}}"#
    )
}

/// Event with no payload.
pub fn event(id: i64, event_type: EventType) -> ExecutionEvent {
    ExecutionEvent {
        id,
        event_type,
        timestamp: Utc::now(),
        previous_event_id: (id > 1).then_some(id - 1),
        details: EventDetails::None,
    }
}

pub fn execution_started(id: i64) -> ExecutionEvent {
    event(id, EventType::ExecutionStarted)
}

pub fn terminal(id: i64, event_type: EventType) -> ExecutionEvent {
    assert!(event_type.is_terminal(), "{event_type} is not terminal");
    event(id, event_type)
}

pub fn task_entered(id: i64, name: &str) -> ExecutionEvent {
    ExecutionEvent {
        details: EventDetails::StateEntered {
            name: name.to_string(),
            input: Some("{}".to_string()),
        },
        ..event(id, EventType::TaskStateEntered)
    }
}

pub fn task_exited(id: i64, name: &str, log: Option<&LogReference>) -> ExecutionEvent {
    let output = log.map(|r| log_output_document(&r.log_group, &r.log_stream));
    task_exited_with_output(id, name, output)
}

pub fn task_exited_with_output(id: i64, name: &str, output: Option<String>) -> ExecutionEvent {
    ExecutionEvent {
        details: EventDetails::StateExited {
            name: name.to_string(),
            output,
        },
        ..event(id, EventType::TaskStateExited)
    }
}

pub fn task_failed(id: i64, error: &str, log: Option<&LogReference>) -> ExecutionEvent {
    ExecutionEvent {
        details: EventDetails::TaskFailed {
            resource: Some("startBuild.sync".to_string()),
            resource_type: Some("codebuild".to_string()),
            error: Some(error.to_string()),
            cause: log.map(|r| log_output_document(&r.log_group, &r.log_stream)),
        },
        ..event(id, EventType::TaskFailed)
    }
}

pub fn history_page(events: Vec<ExecutionEvent>, next_token: Option<&str>) -> HistoryPage {
    HistoryPage {
        events,
        next_token: next_token.map(str::to_string),
    }
}

pub fn log_page(lines: &[&str], next_token: &str) -> LogPage {
    LogPage {
        lines: lines.iter().map(|l| l.to_string()).collect(),
        next_token: Some(next_token.to_string()),
    }
}

/// Builder for `MonitorOptions` with test-friendly millisecond timings.
pub struct MonitorOptionsBuilder {
    options: MonitorOptions,
}

impl MonitorOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: MonitorOptions {
                refresh_rate: Duration::from_millis(10),
                execution_timeout: Duration::from_secs(3),
                ci_mode: true,
                verbose: false,
                noise_filter: NoiseFilter::new(r"^\[Container\]")
                    .expect("default noise pattern compiles"),
            },
        }
    }

    pub fn refresh_rate(mut self, refresh_rate: Duration) -> Self {
        self.options.refresh_rate = refresh_rate;
        self
    }

    pub fn execution_timeout(mut self, timeout: Duration) -> Self {
        self.options.execution_timeout = timeout;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.options.verbose = verbose;
        self
    }

    pub fn build(self) -> MonitorOptions {
        self.options
    }
}

impl Default for MonitorOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
