// src/config/validate.rs

use std::time::Duration;

use reqwest::Url;

use crate::config::model::{
    ConfigFile, MonitorConfig, MonitorSection, RawConfigFile, SourceConfig, SourceSection,
};
use crate::errors::{MonitorError, Result};
use crate::monitor::NoiseFilter;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = MonitorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let monitor = validate_monitor(&raw.monitor)?;
        let noise_filter = NoiseFilter::new(&raw.logs.noise_pattern).map_err(|e| {
            MonitorError::ConfigError(format!(
                "[logs].noise_pattern is not a valid regex: {e}"
            ))
        })?;
        let source = validate_source(&raw.source)?;
        validate_launch(&raw)?;
        Ok(ConfigFile::new_unchecked(monitor, noise_filter, source, raw.launch))
    }
}

fn validate_monitor(section: &MonitorSection) -> Result<MonitorConfig> {
    if section.refresh_rate_secs == 0 {
        return Err(MonitorError::ConfigError(
            "[monitor].refresh_rate_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if section.execution_timeout_mins == 0 {
        return Err(MonitorError::ConfigError(
            "[monitor].execution_timeout_mins must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(MonitorConfig {
        refresh_rate: Duration::from_secs(section.refresh_rate_secs),
        execution_timeout: Duration::from_secs(section.execution_timeout_mins * 60),
        ci_mode: section.ci_mode,
        verbose: section.verbose,
    })
}

fn validate_source(section: &SourceSection) -> Result<SourceConfig> {
    ensure_http_url("[source].execution_endpoint", &section.execution_endpoint)?;
    ensure_http_url("[source].logs_endpoint", &section.logs_endpoint)?;

    if section.request_timeout_secs == 0 {
        return Err(MonitorError::ConfigError(
            "[source].request_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(SourceConfig {
        execution_endpoint: section.execution_endpoint.trim().to_string(),
        logs_endpoint: section.logs_endpoint.trim().to_string(),
        request_timeout: Duration::from_secs(section.request_timeout_secs),
    })
}

fn validate_launch(raw: &RawConfigFile) -> Result<()> {
    for (key, arn) in [
        ("plan_state_machine_arn", &raw.launch.plan_state_machine_arn),
        ("apply_state_machine_arn", &raw.launch.apply_state_machine_arn),
    ] {
        if let Some(arn) = arn {
            if arn.trim().is_empty() {
                return Err(MonitorError::ConfigError(format!(
                    "[launch].{key} must not be empty when set"
                )));
            }
        }
    }
    if raw.launch.default_branch.trim().is_empty() {
        return Err(MonitorError::ConfigError(
            "[launch].default_branch must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn ensure_http_url(key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    let url = Url::parse(value).map_err(|e| {
        MonitorError::ConfigError(format!("{key} is not a valid URL ('{value}'): {e}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(MonitorError::ConfigError(format!(
            "{key} must be an http(s) URL (got '{value}')"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg.monitor.refresh_rate, Duration::from_secs(5));
        assert_eq!(cfg.monitor.execution_timeout, Duration::from_secs(3600));
        assert!(cfg.noise_filter.is_noise("[Container] 2024/01/01 Running command"));
        assert_eq!(cfg.launch.default_branch, "main");
    }

    #[test]
    fn zero_refresh_rate_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.monitor.refresh_rate_secs = 0;
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("refresh_rate_secs"));
    }

    #[test]
    fn invalid_noise_pattern_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.logs.noise_pattern = "([unclosed".to_string();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(MonitorError::ConfigError(_))
        ));
    }

    #[test]
    fn endpoint_must_be_http() {
        let mut raw = RawConfigFile::default();
        raw.source.logs_endpoint = "ftp://logs".to_string();
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("logs_endpoint"));
    }

    #[test]
    fn endpoint_with_unparseable_host_is_rejected() {
        for bad in ["http://not a host:port/", "http://", "https://emulator:notaport"] {
            let mut raw = RawConfigFile::default();
            raw.source.execution_endpoint = bad.to_string();
            match ConfigFile::try_from(raw) {
                Err(MonitorError::ConfigError(msg)) => {
                    assert!(msg.contains("execution_endpoint"), "{bad}: {msg}")
                }
                other => panic!("{bad}: expected config error, got {other:?}"),
            }
        }
    }

    #[test]
    fn endpoint_with_port_and_path_is_accepted() {
        let mut raw = RawConfigFile::default();
        raw.source.execution_endpoint = "http://127.0.0.1:8083/".to_string();
        raw.source.logs_endpoint = "https://logs.eu-west-1.amazonaws.com".to_string();
        assert!(ConfigFile::try_from(raw).is_ok());
    }

    #[test]
    fn blank_state_machine_arn_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.launch.apply_state_machine_arn = Some("  ".to_string());
        assert!(ConfigFile::try_from(raw).is_err());
    }
}
