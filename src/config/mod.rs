// src/config/mod.rs

//! Configuration loading and validation for stepwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and apply environment overrides
//!   (`loader.rs`).
//! - Validate values and build the checked model (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, LaunchSection, LogsSection, MonitorConfig, MonitorSection, RawConfigFile,
    SourceConfig, SourceSection,
};
