// src/launch.rs

//! Starting new executions of the configured plan/apply state machines.

use std::fmt;

use clap::ValueEnum;
use rand::Rng;
use serde_json::json;
use tracing::info;

use crate::config::LaunchSection;
use crate::errors::{MonitorError, Result};
use crate::source::{ExecutionStarter, StartRequest};

/// Remote action to run against a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    Plan,
    Apply,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Plan => "plan",
            Action::Apply => "apply",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to launch.
#[derive(Debug, Clone)]
pub struct LaunchInput {
    pub action: Action,
    pub workspace_path: String,
    pub branch: String,
}

/// Build the start request for `input` without sending it.
pub fn prepare(launch: &LaunchSection, input: &LaunchInput) -> Result<StartRequest> {
    if input.workspace_path.trim().is_empty() {
        return Err(MonitorError::ConfigError("workspace path is required".to_string()));
    }

    let state_machine_arn = match input.action {
        Action::Plan => launch.plan_state_machine_arn.as_ref(),
        Action::Apply => launch.apply_state_machine_arn.as_ref(),
    }
    .ok_or_else(|| {
        MonitorError::ConfigError(format!(
            "[launch].{}_state_machine_arn is not configured",
            input.action
        ))
    })?;

    Ok(StartRequest {
        state_machine_arn: state_machine_arn.clone(),
        name: execution_name(input.action),
        input: render_input(input),
    })
}

/// Start the execution described by `input`; returns its identifier.
pub async fn start(
    starter: &dyn ExecutionStarter,
    launch: &LaunchSection,
    input: &LaunchInput,
) -> Result<String> {
    let request = prepare(launch, input)?;
    let execution_arn = starter.start_execution(&request).await?;
    info!(
        state_machine = %request.state_machine_arn,
        name = %request.name,
        execution = %execution_arn,
        "execution started"
    );
    Ok(execution_arn)
}

/// Execution input document passed to the state machine.
pub fn render_input(input: &LaunchInput) -> String {
    json!({
        "Comment": "Run from CLI",
        "build": {
            "sourceversion": input.branch,
            "action": input.action.as_str(),
            "environment": {
                "terra_ci_resource": input.workspace_path,
            },
        },
    })
    .to_string()
}

const NAME_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `stepwatch-<action>-<8 random letters>`.
pub fn execution_name(action: Action) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| NAME_LETTERS[rng.gen_range(0..NAME_LETTERS.len())] as char)
        .collect();
    format!("stepwatch-{action}-{suffix}")
}
