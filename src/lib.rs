// src/lib.rs

pub mod bus;
pub mod cli;
pub mod config;
pub mod errors;
pub mod launch;
pub mod logging;
pub mod monitor;
pub mod output;
pub mod source;
pub mod types;

use std::sync::Arc;

use tracing::{debug, info};

use crate::cli::{CliArgs, Command, MonitorFlags};
use crate::config::{ConfigFile, load_or_default};
use crate::errors::Result;
use crate::launch::LaunchInput;
use crate::monitor::{LogStreamer, Monitor, MonitorOptions};
use crate::output::Console;
use crate::source::{DescribeSource, HttpBackend};
use crate::types::LogReference;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file, environment, CLI flags)
/// - the HTTP backend for the execution and log services
/// - the selected command (monitor / run / status)
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref())?;
    let console = Console::stdio();

    match args.command {
        Command::Monitor {
            execution_arn,
            flags,
        } => {
            let backend = Arc::new(HttpBackend::new(&cfg.source)?);
            monitor_execution(backend, &cfg, &flags, &console, &execution_arn).await
        }
        Command::Run {
            path,
            action,
            branch,
            dry_run,
            flags,
        } => {
            let input = LaunchInput {
                action,
                workspace_path: path,
                branch: branch.unwrap_or_else(|| cfg.launch.default_branch.clone()),
            };

            if dry_run {
                print_dry_run(&cfg, &input, &console)?;
                return Ok(());
            }

            let backend = Arc::new(HttpBackend::new(&cfg.source)?);
            let execution_arn = launch::start(backend.as_ref(), &cfg.launch, &input).await?;
            console.out.line(format!("started execution {execution_arn}"));
            monitor_execution(backend, &cfg, &flags, &console, &execution_arn).await
        }
        Command::Status {
            execution_arn,
            logs,
            verbose,
        } => {
            let backend = Arc::new(HttpBackend::new(&cfg.source)?);
            print_status(backend, &cfg, &console, &execution_arn, logs, verbose).await
        }
    }
}

/// Resolve monitor options: config values overridden by CLI flags.
pub fn resolve_options(cfg: &ConfigFile, flags: &MonitorFlags) -> MonitorOptions {
    let mut options = MonitorOptions::from_config(cfg);
    if let Some(secs) = flags.refresh_rate.filter(|s| *s > 0) {
        options.refresh_rate = std::time::Duration::from_secs(secs);
    }
    if let Some(mins) = flags.timeout.filter(|m| *m > 0) {
        options.execution_timeout = std::time::Duration::from_secs(mins * 60);
    }
    options.ci_mode |= flags.ci;
    options.verbose |= flags.verbose;
    options
}

async fn monitor_execution(
    backend: Arc<HttpBackend>,
    cfg: &ConfigFile,
    flags: &MonitorFlags,
    console: &Console,
    execution_arn: &str,
) -> Result<()> {
    let options = resolve_options(cfg, flags);
    debug!(?options, "monitor options resolved");

    let monitor = Monitor::new(backend.clone(), backend, console.clone(), options);
    let verdict = monitor.watch(execution_arn).await;

    if verdict.is_success() {
        console.out.line("execution succeeded");
    } else if let Some(err) = &verdict.error {
        console.err.line(format!("execution failed: {err}"));
    }
    verdict.into_result()
}

async fn print_status(
    backend: Arc<HttpBackend>,
    cfg: &ConfigFile,
    console: &Console,
    execution_arn: &str,
    stream_logs: bool,
    verbose: bool,
) -> Result<()> {
    let description = backend.describe_execution(execution_arn).await?;
    console.out.line(format!(
        "execution {}: {}",
        description.execution_arn, description.status
    ));

    if !stream_logs {
        return Ok(());
    }

    let Some(output) = description.output.as_deref() else {
        console.err.line("execution has no output document yet");
        return Ok(());
    };
    let reference = LogReference::from_document(output)?;
    info!(log = %reference, "streaming execution logs");

    let streamer = LogStreamer::new(
        backend,
        cfg.noise_filter.clone(),
        verbose || cfg.monitor.verbose,
        console.out.clone(),
    );
    streamer.stream(&reference).await?;
    Ok(())
}

/// Dry-run output: target state machine and rendered input document.
fn print_dry_run(cfg: &ConfigFile, input: &LaunchInput, console: &Console) -> Result<()> {
    let request = launch::prepare(&cfg.launch, input)?;
    console.out.line("stepwatch dry-run");
    console.out.line(format!("  action = {}", input.action));
    console.out.line(format!("  state_machine = {}", request.state_machine_arn));
    console.out.line(format!("  execution_name = {}", request.name));
    console.out.line(format!("  input = {}", request.input));
    debug!("dry-run complete (nothing started)");
    Ok(())
}
