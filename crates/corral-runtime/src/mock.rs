use crate::connection::{CommandRequest, Connection};
use crate::{ExecutionResult, RuntimeError};
use std::sync::{Mutex, MutexGuard};

struct Rule {
    prefix: String,
    exit_status: i32,
    output: String,
}

/// Transport that issues nothing: every request is recorded and answered
/// from a list of scripted responses (status 0 with empty output by
/// default). Used by tests and by `--dry-run`.
#[derive(Default)]
pub struct RecordingConnection {
    requests: Mutex<Vec<CommandRequest>>,
    rules: Mutex<Vec<Rule>>,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, RuntimeError> {
    m.lock()
        .map_err(|e| RuntimeError::Transport(format!("mutex poisoned: {e}")))
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `exit_status`.
    /// Later rules win over earlier ones.
    #[must_use]
    pub fn respond(self, prefix: &str, exit_status: i32, output: &str) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                prefix: prefix.to_owned(),
                exit_status,
                output: output.to_owned(),
            });
        }
        self
    }

    #[must_use]
    pub fn fail_when(self, prefix: &str, exit_status: i32) -> Self {
        self.respond(prefix, exit_status, "")
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.command).collect()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Commands whose text starts with `prefix`.
    pub fn commands_starting_with(&self, prefix: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

impl Connection for RecordingConnection {
    fn describe(&self) -> String {
        "recording".to_owned()
    }

    fn execute(&self, request: &CommandRequest) -> Result<ExecutionResult, RuntimeError> {
        lock(&self.requests)?.push(request.clone());
        let rules = lock(&self.rules)?;
        let result = rules
            .iter()
            .rev()
            .find(|rule| request.command.starts_with(&rule.prefix))
            .map_or_else(
                || ExecutionResult::new(0, Vec::new()),
                |rule| ExecutionResult::new(rule.exit_status, rule.output.as_bytes()),
            );
        Ok(result)
    }
}
