// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::monitor::NoiseFilter;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [monitor]
/// refresh_rate_secs = 5
/// execution_timeout_mins = 60
/// ci_mode = false
/// verbose = false
///
/// [logs]
/// noise_pattern = "^\\[Container\\]"
///
/// [source]
/// execution_endpoint = "http://localhost:8083"
/// logs_endpoint = "http://localhost:4566"
///
/// [launch]
/// plan_state_machine_arn = "arn:aws:states:eu-west-1:123456789012:stateMachine:plan"
/// apply_state_machine_arn = "arn:aws:states:eu-west-1:123456789012:stateMachine:apply"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub logs: LogsSection,

    #[serde(default)]
    pub source: SourceSection,

    #[serde(default)]
    pub launch: LaunchSection,
}

/// `[monitor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    /// Seconds to sleep between history polls.
    #[serde(default = "default_refresh_rate_secs")]
    pub refresh_rate_secs: u64,

    /// Wall-clock deadline for the whole monitor run, in minutes.
    #[serde(default = "default_execution_timeout_mins")]
    pub execution_timeout_mins: u64,

    /// Non-interactive mode: no spinner.
    #[serde(default)]
    pub ci_mode: bool,

    /// Stream infrastructure log lines too.
    #[serde(default)]
    pub verbose: bool,
}

fn default_refresh_rate_secs() -> u64 {
    5
}

fn default_execution_timeout_mins() -> u64 {
    60
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            refresh_rate_secs: default_refresh_rate_secs(),
            execution_timeout_mins: default_execution_timeout_mins(),
            ci_mode: false,
            verbose: false,
        }
    }
}

/// `[logs]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsSection {
    /// Lines matching this regex are hidden unless verbose.
    #[serde(default = "default_noise_pattern")]
    pub noise_pattern: String,
}

fn default_noise_pattern() -> String {
    r"^\[Container\]".to_string()
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            noise_pattern: default_noise_pattern(),
        }
    }
}

/// `[source]` section: where the execution and log services live.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    #[serde(default = "default_execution_endpoint")]
    pub execution_endpoint: String,

    #[serde(default = "default_logs_endpoint")]
    pub logs_endpoint: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_execution_endpoint() -> String {
    "http://localhost:8083".to_string()
}

fn default_logs_endpoint() -> String {
    "http://localhost:4566".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            execution_endpoint: default_execution_endpoint(),
            logs_endpoint: default_logs_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// `[launch]` section: which state machine runs each action.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchSection {
    #[serde(default)]
    pub plan_state_machine_arn: Option<String>,

    #[serde(default)]
    pub apply_state_machine_arn: Option<String>,

    #[serde(default = "default_branch")]
    pub default_branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for LaunchSection {
    fn default() -> Self {
        Self {
            plan_state_machine_arn: None,
            apply_state_machine_arn: None,
            default_branch: default_branch(),
        }
    }
}

/// Validated monitor settings.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub refresh_rate: Duration,
    pub execution_timeout: Duration,
    pub ci_mode: bool,
    pub verbose: bool,
}

/// Validated service endpoints.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub execution_endpoint: String,
    pub logs_endpoint: String,
    pub request_timeout: Duration,
}

/// Validated configuration. Only constructible through
/// `TryFrom<RawConfigFile>`, which runs validation.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub monitor: MonitorConfig,
    pub noise_filter: NoiseFilter,
    pub source: SourceConfig,
    pub launch: LaunchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        monitor: MonitorConfig,
        noise_filter: NoiseFilter,
        source: SourceConfig,
        launch: LaunchSection,
    ) -> Self {
        Self {
            monitor,
            noise_filter,
            source,
            launch,
        }
    }
}
