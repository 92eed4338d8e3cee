// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw model.
///
/// This only performs TOML deserialization; it does **not** apply
/// environment overrides or validate. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file, apply `STEPWATCH_*` environment overrides and
/// validate the result.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw = load_from_path(&path)?;
    finish(raw)
}

/// Load `path` if given (it must exist), otherwise the default config path
/// if it exists, otherwise built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(path) => load_and_validate(path),
        None => {
            let default_path = default_config_path();
            if default_path.is_file() {
                load_and_validate(default_path)
            } else {
                debug!(path = %default_path.display(), "no config file found; using defaults");
                finish(RawConfigFile::default())
            }
        }
    }
}

/// `Stepwatch.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Stepwatch.toml")
}

fn finish(mut raw: RawConfigFile) -> Result<ConfigFile> {
    apply_env_overrides(&mut raw, |key| std::env::var(key).ok());
    ConfigFile::try_from(raw)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Recognised variables:
/// - `STEPWATCH_EXECUTION_ENDPOINT`
/// - `STEPWATCH_LOGS_ENDPOINT`
/// - `STEPWATCH_CI_MODE` (`1`, `true`, `yes` enable; `0`, `false`, `no` disable)
pub fn apply_env_overrides<F>(raw: &mut RawConfigFile, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = lookup("STEPWATCH_EXECUTION_ENDPOINT") {
        raw.source.execution_endpoint = endpoint;
    }
    if let Some(endpoint) = lookup("STEPWATCH_LOGS_ENDPOINT") {
        raw.source.logs_endpoint = endpoint;
    }
    if let Some(flag) = lookup("STEPWATCH_CI_MODE").and_then(|v| parse_bool(&v)) {
        raw.monitor.ci_mode = flag;
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
