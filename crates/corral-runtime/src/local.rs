use crate::connection::{CommandRequest, Connection};
use crate::process::{run_captured, shell, Limits};
use crate::{ExecutionResult, RuntimeError};
use tracing::debug;

/// Runs commands with `sh -c` on this machine.
#[derive(Debug, Clone, Default)]
pub struct LocalConnection {
    env: Vec<(String, String)>,
}

impl LocalConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment variable to every command issued.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl Connection for LocalConnection {
    fn describe(&self) -> String {
        "local".to_owned()
    }

    fn execute(&self, request: &CommandRequest) -> Result<ExecutionResult, RuntimeError> {
        debug!("local: {}", request.command);
        let mut cmd = shell(&request.command);
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        run_captured(
            cmd,
            &request.command,
            Limits {
                timeout: request.timeout,
                prompt: request.prompt.as_deref(),
            },
        )
    }
}
