use crate::process::{run_captured, shell, Limits};
use crate::{ExecutionResult, RuntimeError};
use std::path::Path;
use tracing::debug;

/// Runs a single shell command on this machine and turns a non-zero exit
/// into [`RuntimeError::CommandFailed`].
///
/// There is no timeout and no retry at this layer: one invocation either
/// succeeds or raises.
pub struct CommandRunner;

impl CommandRunner {
    /// Run `command` through `sh -c`.
    ///
    /// `env`, when given, replaces the inherited environment entirely.
    pub fn run(
        command: &str,
        working_dir: Option<&Path>,
        env: Option<&[(String, String)]>,
    ) -> Result<ExecutionResult, RuntimeError> {
        let mut cmd = shell(command);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        if let Some(vars) = env {
            cmd.env_clear();
            cmd.envs(vars.iter().map(|(k, v)| (k, v)));
        }

        debug!("running locally: {command}");
        let result = run_captured(cmd, command, Limits::default())?;
        if result.success() {
            Ok(result)
        } else {
            Err(RuntimeError::CommandFailed {
                command: command.to_owned(),
                result,
            })
        }
    }
}
