// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::launch::Action;

/// Command-line arguments for `stepwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stepwatch",
    version,
    about = "Start remote workflow executions and follow their progress and build logs.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If omitted, `Stepwatch.toml` in the current directory is used when
    /// present, otherwise built-in defaults.
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STEPWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Follow an already running execution until it ends.
    Monitor {
        /// Execution identifier (ARN).
        #[arg(value_name = "EXECUTION")]
        execution_arn: String,

        #[command(flatten)]
        flags: MonitorFlags,
    },

    /// Start a plan/apply execution for a workspace and follow it.
    Run {
        /// Path of the workspace inside the repository.
        #[arg(long, value_name = "PATH")]
        path: String,

        #[arg(long, value_enum, default_value_t = Action::Plan)]
        action: Action,

        /// Git branch to run against; defaults to `[launch].default_branch`.
        #[arg(long, value_name = "BRANCH")]
        branch: Option<String>,

        /// Print the state machine and input document, start nothing.
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        flags: MonitorFlags,
    },

    /// Print the current status of an execution.
    Status {
        #[arg(value_name = "EXECUTION")]
        execution_arn: String,

        /// Also stream the build logs referenced by the execution output.
        #[arg(long)]
        logs: bool,

        /// Include infrastructure log lines.
        #[arg(long)]
        verbose: bool,
    },
}

/// Flags overriding the `[monitor]` config section.
#[derive(Debug, Clone, Default, Args)]
pub struct MonitorFlags {
    /// Seconds between history polls.
    #[arg(long, value_name = "SECS")]
    pub refresh_rate: Option<u64>,

    /// Give up after this many minutes.
    #[arg(long, value_name = "MINS")]
    pub timeout: Option<u64>,

    /// Non-interactive mode (no spinner).
    #[arg(long)]
    pub ci: bool,

    /// Include infrastructure log lines.
    #[arg(long)]
    pub verbose: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_flags_parse() {
        let args = CliArgs::try_parse_from([
            "stepwatch",
            "monitor",
            "arn:exec:1",
            "--refresh-rate",
            "2",
            "--timeout",
            "15",
            "--ci",
        ])
        .unwrap();

        match args.command {
            Command::Monitor { execution_arn, flags } => {
                assert_eq!(execution_arn, "arn:exec:1");
                assert_eq!(flags.refresh_rate, Some(2));
                assert_eq!(flags.timeout, Some(15));
                assert!(flags.ci);
                assert!(!flags.verbose);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_defaults_to_plan() {
        let args = CliArgs::try_parse_from(["stepwatch", "run", "--path", "live/vpc"]).unwrap();
        match args.command {
            Command::Run { action, branch, dry_run, .. } => {
                assert_eq!(action, Action::Plan);
                assert_eq!(branch, None);
                assert!(!dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_rejects_unknown_action() {
        assert!(
            CliArgs::try_parse_from(["stepwatch", "run", "--path", "p", "--action", "destroy"])
                .is_err()
        );
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let args =
            CliArgs::try_parse_from(["stepwatch", "status", "arn:exec:1", "--config", "ci.toml"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("ci.toml")));
    }
}
