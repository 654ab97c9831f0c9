use crate::{ExecutionResult, RuntimeError};
use serde::Serialize;
use std::time::Duration;

/// One command to issue over a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRequest {
    pub command: String,
    /// Text that marks the command as complete once it appears in the output.
    pub prompt: Option<String>,
    /// Upper bound on how long the transport waits for the command.
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            prompt: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_optional_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Transport used to reach the machine that hosts the container.
///
/// Implementations are owned by whoever built them; clients only borrow a
/// shared handle and never tear the connection down. A non-zero exit status
/// is returned as data: only transport-level trouble (spawn failure,
/// timeout) is an error.
pub trait Connection: Send + Sync {
    /// Human-readable target, e.g. `root@10.0.0.5:22` or `local`.
    fn describe(&self) -> String;

    fn execute(&self, request: &CommandRequest) -> Result<ExecutionResult, RuntimeError>;

    /// Issue a plain command with no prompt and no timeout.
    fn run(&self, command: &str) -> Result<ExecutionResult, RuntimeError> {
        self.execute(&CommandRequest::new(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_fields() {
        let req = CommandRequest::new("lxc-wait -n c1 -s RUNNING")
            .with_prompt("$ ")
            .with_timeout(Duration::from_secs(30));
        assert_eq!(req.command, "lxc-wait -n c1 -s RUNNING");
        assert_eq!(req.prompt.as_deref(), Some("$ "));
        assert_eq!(req.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn optional_timeout_can_clear() {
        let req = CommandRequest::new("true")
            .with_timeout(Duration::from_secs(1))
            .with_optional_timeout(None);
        assert_eq!(req.timeout, None);
    }
}
