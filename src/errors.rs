// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

use crate::types::EventType;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{operation} failed with HTTP {status}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("execution monitoring timed out after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("execution completed with {0} status")]
    ExecutionEnded(EventType),

    #[error("execution ended without a terminal event")]
    NoTerminalEvent,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MonitorError>;
