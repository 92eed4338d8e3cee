// src/types.rs

//! Core data model shared by the bus, the poller and the subscribers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::{MonitorError, Result};

/// Event type label reported by the execution engine.
///
/// The label doubles as the routing key on the event bus. Labels the engine
/// may add in the future still route by name through [`EventType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    ExecutionStarted,
    ExecutionSucceeded,
    ExecutionFailed,
    ExecutionTimedOut,
    ExecutionAborted,
    TaskStateEntered,
    TaskSubmitted,
    TaskSubmitFailed,
    TaskScheduled,
    TaskStarted,
    TaskStartFailed,
    TaskFailed,
    TaskSucceeded,
    TaskTimedOut,
    TaskStateAborted,
    TaskStateExited,
    ParallelStateStarted,
    ChoiceStateEntered,
    FailStateEntered,
    MapStateEntered,
    PassStateEntered,
    SucceedStateEntered,
    WaitStateEntered,
    Other(String),
}

/// The four execution-ending event types. Observing any of them ends polling.
pub const TERMINAL_EVENT_TYPES: [EventType; 4] = [
    EventType::ExecutionSucceeded,
    EventType::ExecutionTimedOut,
    EventType::ExecutionFailed,
    EventType::ExecutionAborted,
];

/// Every task-lifecycle topic the task subscriber listens on.
pub const TASK_LIFECYCLE_EVENT_TYPES: [EventType; 11] = [
    EventType::TaskStateEntered,
    EventType::TaskSubmitted,
    EventType::TaskSubmitFailed,
    EventType::TaskScheduled,
    EventType::TaskStarted,
    EventType::TaskStartFailed,
    EventType::TaskFailed,
    EventType::TaskSucceeded,
    EventType::TaskTimedOut,
    EventType::TaskStateAborted,
    EventType::TaskStateExited,
];

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::ExecutionStarted => "ExecutionStarted",
            EventType::ExecutionSucceeded => "ExecutionSucceeded",
            EventType::ExecutionFailed => "ExecutionFailed",
            EventType::ExecutionTimedOut => "ExecutionTimedOut",
            EventType::ExecutionAborted => "ExecutionAborted",
            EventType::TaskStateEntered => "TaskStateEntered",
            EventType::TaskSubmitted => "TaskSubmitted",
            EventType::TaskSubmitFailed => "TaskSubmitFailed",
            EventType::TaskScheduled => "TaskScheduled",
            EventType::TaskStarted => "TaskStarted",
            EventType::TaskStartFailed => "TaskStartFailed",
            EventType::TaskFailed => "TaskFailed",
            EventType::TaskSucceeded => "TaskSucceeded",
            EventType::TaskTimedOut => "TaskTimedOut",
            EventType::TaskStateAborted => "TaskStateAborted",
            EventType::TaskStateExited => "TaskStateExited",
            EventType::ParallelStateStarted => "ParallelStateStarted",
            EventType::ChoiceStateEntered => "ChoiceStateEntered",
            EventType::FailStateEntered => "FailStateEntered",
            EventType::MapStateEntered => "MapStateEntered",
            EventType::PassStateEntered => "PassStateEntered",
            EventType::SucceedStateEntered => "SucceedStateEntered",
            EventType::WaitStateEntered => "WaitStateEntered",
            EventType::Other(label) => label.as_str(),
        }
    }

    /// True for the four execution-ending types.
    pub fn is_terminal(&self) -> bool {
        TERMINAL_EVENT_TYPES.contains(self)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EventType::ExecutionSucceeded)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let ty = match s.trim() {
            "ExecutionStarted" => EventType::ExecutionStarted,
            "ExecutionSucceeded" => EventType::ExecutionSucceeded,
            "ExecutionFailed" => EventType::ExecutionFailed,
            "ExecutionTimedOut" => EventType::ExecutionTimedOut,
            "ExecutionAborted" => EventType::ExecutionAborted,
            "TaskStateEntered" => EventType::TaskStateEntered,
            "TaskSubmitted" => EventType::TaskSubmitted,
            "TaskSubmitFailed" => EventType::TaskSubmitFailed,
            "TaskScheduled" => EventType::TaskScheduled,
            "TaskStarted" => EventType::TaskStarted,
            "TaskStartFailed" => EventType::TaskStartFailed,
            "TaskFailed" => EventType::TaskFailed,
            "TaskSucceeded" => EventType::TaskSucceeded,
            "TaskTimedOut" => EventType::TaskTimedOut,
            "TaskStateAborted" => EventType::TaskStateAborted,
            "TaskStateExited" => EventType::TaskStateExited,
            "ParallelStateStarted" => EventType::ParallelStateStarted,
            "ChoiceStateEntered" => EventType::ChoiceStateEntered,
            "FailStateEntered" => EventType::FailStateEntered,
            "MapStateEntered" => EventType::MapStateEntered,
            "PassStateEntered" => EventType::PassStateEntered,
            "SucceedStateEntered" => EventType::SucceedStateEntered,
            "WaitStateEntered" => EventType::WaitStateEntered,
            other => EventType::Other(other.to_string()),
        };
        Ok(ty)
    }
}

/// Type-specific payload of an [`ExecutionEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventDetails {
    StateEntered {
        name: String,
        input: Option<String>,
    },
    /// `output` is the embedded JSON document produced by the state.
    StateExited {
        name: String,
        output: Option<String>,
    },
    /// `cause` is an embedded JSON document for service integrations.
    TaskFailed {
        resource: Option<String>,
        resource_type: Option<String>,
        error: Option<String>,
        cause: Option<String>,
    },
    ExecutionFailed {
        error: Option<String>,
        cause: Option<String>,
    },
    #[default]
    None,
}

/// One history event, immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEvent {
    pub id: i64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub previous_event_id: Option<i64>,
    pub details: EventDetails,
}

/// Log group/stream pair that holds a task's build output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogReference {
    pub log_group: String,
    pub log_stream: String,
}

impl LogReference {
    pub fn new(log_group: impl Into<String>, log_stream: impl Into<String>) -> Self {
        Self {
            log_group: log_group.into(),
            log_stream: log_stream.into(),
        }
    }

    /// Extract the reference from a task output or failure-cause document:
    ///
    /// ```json
    /// {"Build": {"Logs": {"GroupName": "g1", "StreamName": "s1"}}}
    /// ```
    pub fn from_document(document: &str) -> Result<Self> {
        let parsed: TaskOutputDocument = serde_json::from_str(document)?;
        let logs = parsed.build.logs;
        match (logs.group_name, logs.stream_name) {
            (Some(group), Some(stream)) if !group.is_empty() && !stream.is_empty() => {
                Ok(Self::new(group, stream))
            }
            _ => Err(MonitorError::MalformedPayload(
                "document has no Build.Logs group/stream reference".to_string(),
            )),
        }
    }
}

impl fmt::Display for LogReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.log_group, self.log_stream)
    }
}

#[derive(Debug, Deserialize)]
struct TaskOutputDocument {
    #[serde(rename = "Build")]
    build: TaskOutputBuild,
}

#[derive(Debug, Deserialize)]
struct TaskOutputBuild {
    #[serde(rename = "Logs")]
    logs: TaskOutputLogs,
}

#[derive(Debug, Deserialize)]
struct TaskOutputLogs {
    #[serde(rename = "GroupName", default)]
    group_name: Option<String>,
    #[serde(rename = "StreamName", default)]
    stream_name: Option<String>,
}

/// Coarse execution status as reported by the description source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Aborted,
    Other(String),
}

impl FromStr for ExecutionStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_uppercase().as_str() {
            "RUNNING" => ExecutionStatus::Running,
            "SUCCEEDED" => ExecutionStatus::Succeeded,
            "FAILED" => ExecutionStatus::Failed,
            "TIMED_OUT" => ExecutionStatus::TimedOut,
            "ABORTED" => ExecutionStatus::Aborted,
            other => ExecutionStatus::Other(other.to_string()),
        })
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Running => f.write_str("RUNNING"),
            ExecutionStatus::Succeeded => f.write_str("SUCCEEDED"),
            ExecutionStatus::Failed => f.write_str("FAILED"),
            ExecutionStatus::TimedOut => f.write_str("TIMED_OUT"),
            ExecutionStatus::Aborted => f.write_str("ABORTED"),
            ExecutionStatus::Other(s) => f.write_str(s),
        }
    }
}

/// Snapshot of one execution from the description source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionDescription {
    pub execution_arn: String,
    pub status: ExecutionStatus,
    pub output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for ty in TERMINAL_EVENT_TYPES.iter().chain(TASK_LIFECYCLE_EVENT_TYPES.iter()) {
            let parsed: EventType = ty.as_str().parse().unwrap();
            assert_eq!(&parsed, ty);
        }
    }

    #[test]
    fn unknown_label_routes_by_name() {
        let parsed: EventType = "MapIterationStarted".parse().unwrap();
        assert_eq!(parsed, EventType::Other("MapIterationStarted".to_string()));
        assert_eq!(parsed.to_string(), "MapIterationStarted");
        assert!(!parsed.is_terminal());
    }

    #[test]
    fn only_execution_end_types_are_terminal() {
        assert!(EventType::ExecutionAborted.is_terminal());
        assert!(EventType::ExecutionTimedOut.is_terminal());
        assert!(!EventType::TaskTimedOut.is_terminal());
        assert!(!EventType::ExecutionStarted.is_terminal());
        assert!(EventType::ExecutionSucceeded.is_success());
        assert!(!EventType::ExecutionFailed.is_success());
    }

    #[test]
    fn log_reference_from_build_output() {
        let doc = r#"{"Build":{"Arn":"arn:build","Logs":{"GroupName":"g1","StreamName":"s1","DeepLink":"x"}}}"#;
        let reference = LogReference::from_document(doc).unwrap();
        assert_eq!(reference, LogReference::new("g1", "s1"));
        assert_eq!(reference.to_string(), "g1:s1");
    }

    #[test]
    fn log_reference_rejects_missing_stream() {
        let doc = r#"{"Build":{"Logs":{"GroupName":"g1"}}}"#;
        assert!(matches!(
            LogReference::from_document(doc),
            Err(MonitorError::MalformedPayload(_))
        ));
        assert!(matches!(
            LogReference::from_document("not json"),
            Err(MonitorError::Json(_))
        ));
    }

    #[test]
    fn execution_status_parses_service_values() {
        assert_eq!("TIMED_OUT".parse::<ExecutionStatus>().unwrap(), ExecutionStatus::TimedOut);
        assert_eq!("running".parse::<ExecutionStatus>().unwrap(), ExecutionStatus::Running);
        assert_eq!(ExecutionStatus::Succeeded.to_string(), "SUCCEEDED");
    }
}
