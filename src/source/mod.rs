// src/source/mod.rs

//! Pluggable access to the remote execution and log services.
//!
//! The monitor talks to these traits instead of a concrete client, so tests
//! can script history pages and log pages without any network.
//!
//! - [`HistorySource`]: paged execution event history.
//! - [`DescribeSource`]: one-shot execution status + output document.
//! - [`LogSource`]: paged log lines for one log stream.
//! - [`ExecutionStarter`]: starts a new execution of a state machine.
//!
//! [`http::HttpBackend`] implements all four against the services' JSON
//! protocol.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::{ExecutionDescription, ExecutionEvent, LogReference};

pub mod http;

pub use http::HttpBackend;

/// Boxed future returned by every source operation.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// One page of execution history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryPage {
    pub events: Vec<ExecutionEvent>,
    /// `None` means no further page; passing `None` back restarts from the
    /// first page.
    pub next_token: Option<String>,
}

/// One page of log lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPage {
    pub lines: Vec<String>,
    /// Forward token; it stops changing once the stream is drained.
    pub next_token: Option<String>,
}

/// Request to start a new execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub state_machine_arn: String,
    pub name: String,
    pub input: String,
}

pub trait HistorySource: Send + Sync {
    fn fetch_history<'a>(
        &'a self,
        execution_arn: &'a str,
        next_token: Option<&'a str>,
    ) -> SourceFuture<'a, HistoryPage>;
}

pub trait DescribeSource: Send + Sync {
    fn describe_execution<'a>(
        &'a self,
        execution_arn: &'a str,
    ) -> SourceFuture<'a, ExecutionDescription>;
}

pub trait LogSource: Send + Sync {
    fn fetch_logs<'a>(
        &'a self,
        reference: &'a LogReference,
        next_token: Option<&'a str>,
    ) -> SourceFuture<'a, LogPage>;
}

pub trait ExecutionStarter: Send + Sync {
    /// Start the execution and return its identifier.
    fn start_execution<'a>(&'a self, request: &'a StartRequest) -> SourceFuture<'a, String>;
}
