// src/source/http.rs

//! HTTP backend for the execution and log services.
//!
//! Both services speak a JSON-over-POST protocol where the operation is
//! selected by the `X-Amz-Target` header. Requests are sent unsigned; point
//! the endpoints at a local emulator or a signing proxy.

use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::SourceConfig;
use crate::errors::{MonitorError, Result};
use crate::types::{
    EventDetails, EventType, ExecutionDescription, ExecutionEvent, ExecutionStatus, LogReference,
};

use super::{
    DescribeSource, ExecutionStarter, HistoryPage, HistorySource, LogPage, LogSource,
    SourceFuture, StartRequest,
};

const EXECUTION_CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const LOGS_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Production backend implementing every source trait over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    execution_endpoint: String,
    logs_endpoint: String,
}

impl HttpBackend {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            execution_endpoint: config.execution_endpoint.trim_end_matches('/').to_string(),
            logs_endpoint: config.logs_endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn call<B, R>(&self, target: Target, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let (endpoint, content_type) = match target.service {
            Service::Execution => (&self.execution_endpoint, EXECUTION_CONTENT_TYPE),
            Service::Logs => (&self.logs_endpoint, LOGS_CONTENT_TYPE),
        };

        trace!(operation = target.operation, %endpoint, "sending request");
        let response = self
            .client
            .post(endpoint.as_str())
            .header("X-Amz-Target", target.header)
            .header(CONTENT_TYPE, content_type)
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<RawServiceError>(&text)
                .map(|e| e.describe())
                .unwrap_or(text);
            debug!(operation = target.operation, status = status.as_u16(), %message, "request rejected");
            return Err(MonitorError::Api {
                operation: target.operation,
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<R>().await?)
    }
}

#[derive(Debug, Clone, Copy)]
enum Service {
    Execution,
    Logs,
}

#[derive(Debug, Clone, Copy)]
struct Target {
    service: Service,
    operation: &'static str,
    header: &'static str,
}

const GET_EXECUTION_HISTORY: Target = Target {
    service: Service::Execution,
    operation: "GetExecutionHistory",
    header: "AWSStepFunctions.GetExecutionHistory",
};

const DESCRIBE_EXECUTION: Target = Target {
    service: Service::Execution,
    operation: "DescribeExecution",
    header: "AWSStepFunctions.DescribeExecution",
};

const START_EXECUTION: Target = Target {
    service: Service::Execution,
    operation: "StartExecution",
    header: "AWSStepFunctions.StartExecution",
};

const GET_LOG_EVENTS: Target = Target {
    service: Service::Logs,
    operation: "GetLogEvents",
    header: "Logs_20140328.GetLogEvents",
};

impl HistorySource for HttpBackend {
    fn fetch_history<'a>(
        &'a self,
        execution_arn: &'a str,
        next_token: Option<&'a str>,
    ) -> SourceFuture<'a, HistoryPage> {
        Box::pin(async move {
            let request = HistoryRequest {
                execution_arn,
                next_token,
            };
            let raw: RawHistoryResponse = self.call(GET_EXECUTION_HISTORY, &request).await?;
            Ok(HistoryPage::from(raw))
        })
    }
}

impl DescribeSource for HttpBackend {
    fn describe_execution<'a>(
        &'a self,
        execution_arn: &'a str,
    ) -> SourceFuture<'a, ExecutionDescription> {
        Box::pin(async move {
            let request = DescribeRequest { execution_arn };
            let raw: RawDescribeResponse = self.call(DESCRIBE_EXECUTION, &request).await?;
            Ok(ExecutionDescription::from(raw))
        })
    }
}

impl LogSource for HttpBackend {
    fn fetch_logs<'a>(
        &'a self,
        reference: &'a LogReference,
        next_token: Option<&'a str>,
    ) -> SourceFuture<'a, LogPage> {
        Box::pin(async move {
            let request = LogEventsRequest {
                log_group_name: &reference.log_group,
                log_stream_name: &reference.log_stream,
                start_from_head: true,
                next_token,
            };
            let raw: RawLogEventsResponse = self.call(GET_LOG_EVENTS, &request).await?;
            Ok(LogPage::from(raw))
        })
    }
}

impl ExecutionStarter for HttpBackend {
    fn start_execution<'a>(&'a self, request: &'a StartRequest) -> SourceFuture<'a, String> {
        Box::pin(async move {
            let body = StartExecutionRequest {
                state_machine_arn: &request.state_machine_arn,
                name: &request.name,
                input: &request.input,
            };
            let raw: RawStartResponse = self.call(START_EXECUTION, &body).await?;
            Ok(raw.execution_arn)
        })
    }
}

// ---- wire format ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRequest<'a> {
    execution_arn: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeRequest<'a> {
    execution_arn: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionRequest<'a> {
    state_machine_arn: &'a str,
    name: &'a str,
    input: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    start_from_head: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHistoryResponse {
    #[serde(default)]
    events: Vec<RawHistoryEvent>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHistoryEvent {
    id: i64,
    #[serde(rename = "type")]
    event_type: String,
    /// Seconds since the epoch, with fractional milliseconds.
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    previous_event_id: Option<i64>,
    #[serde(default)]
    state_entered_event_details: Option<RawStateEntered>,
    #[serde(default)]
    state_exited_event_details: Option<RawStateExited>,
    #[serde(default)]
    task_failed_event_details: Option<RawTaskFailed>,
    #[serde(default)]
    execution_failed_event_details: Option<RawExecutionFailed>,
}

#[derive(Debug, Deserialize)]
struct RawStateEntered {
    name: String,
    #[serde(default)]
    input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStateExited {
    name: String,
    #[serde(default)]
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTaskFailed {
    #[serde(default)]
    resource: Option<String>,
    #[serde(default)]
    resource_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    cause: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawExecutionFailed {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    cause: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescribeResponse {
    execution_arn: String,
    status: String,
    #[serde(default)]
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStartResponse {
    execution_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLogEventsResponse {
    #[serde(default)]
    events: Vec<RawLogEvent>,
    #[serde(default)]
    next_forward_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLogEvent {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawServiceError {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

impl RawServiceError {
    fn describe(self) -> String {
        match (self.kind, self.message) {
            (Some(kind), Some(message)) => format!("{kind}: {message}"),
            (Some(kind), None) => kind,
            (None, Some(message)) => message,
            (None, None) => "unknown service error".to_string(),
        }
    }
}

impl From<RawHistoryEvent> for ExecutionEvent {
    fn from(raw: RawHistoryEvent) -> Self {
        let timestamp = raw
            .timestamp
            .and_then(|secs| DateTime::<Utc>::from_timestamp_millis((secs * 1000.0).round() as i64))
            .unwrap_or_default();

        let details = if let Some(d) = raw.state_entered_event_details {
            EventDetails::StateEntered {
                name: d.name,
                input: d.input,
            }
        } else if let Some(d) = raw.state_exited_event_details {
            EventDetails::StateExited {
                name: d.name,
                output: d.output,
            }
        } else if let Some(d) = raw.task_failed_event_details {
            EventDetails::TaskFailed {
                resource: d.resource,
                resource_type: d.resource_type,
                error: d.error,
                cause: d.cause,
            }
        } else if let Some(d) = raw.execution_failed_event_details {
            EventDetails::ExecutionFailed {
                error: d.error,
                cause: d.cause,
            }
        } else {
            EventDetails::None
        };

        let event_type = match raw.event_type.parse::<EventType>() {
            Ok(ty) => ty,
            Err(never) => match never {},
        };

        ExecutionEvent {
            id: raw.id,
            event_type,
            timestamp,
            previous_event_id: raw.previous_event_id.filter(|id| *id > 0),
            details,
        }
    }
}

impl From<RawHistoryResponse> for HistoryPage {
    fn from(raw: RawHistoryResponse) -> Self {
        HistoryPage {
            events: raw.events.into_iter().map(ExecutionEvent::from).collect(),
            next_token: raw.next_token.filter(|t| !t.is_empty()),
        }
    }
}

impl From<RawLogEventsResponse> for LogPage {
    fn from(raw: RawLogEventsResponse) -> Self {
        LogPage {
            lines: raw.events.into_iter().map(|e| e.message).collect(),
            next_token: raw.next_forward_token,
        }
    }
}

impl From<RawDescribeResponse> for ExecutionDescription {
    fn from(raw: RawDescribeResponse) -> Self {
        let status = match raw.status.parse::<ExecutionStatus>() {
            Ok(status) => status,
            Err(never) => match never {},
        };
        ExecutionDescription {
            execution_arn: raw.execution_arn,
            status,
            output: raw.output,
        }
    }
}
