use crate::connection::{CommandRequest, Connection};
use crate::process::{run_captured, Limits};
use crate::{ExecutionResult, RuntimeError};
use std::process::Command;
use tracing::debug;

/// Runs each command in its own `ssh` session against a remote host.
///
/// Key-based auth runs `ssh` in batch mode. When a password is configured,
/// `sshpass -e` supplies it through the `SSHPASS` environment variable so it
/// never shows up in the process list.
#[derive(Debug, Clone)]
pub struct SshConnection {
    host: String,
    port: u16,
    user: Option<String>,
    password: Option<String>,
    options: Vec<String>,
}

impl SshConnection {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: None,
            password: None,
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Extra `-o Key=Value` option passed to `ssh`.
    #[must_use]
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    /// Program and arguments used to run `remote_command` on the host.
    pub fn argv(&self, remote_command: &str) -> Vec<String> {
        let mut argv = Vec::new();
        if self.password.is_some() {
            argv.extend(["sshpass".to_owned(), "-e".to_owned()]);
        }
        argv.push("ssh".to_owned());
        argv.extend(["-T".to_owned(), "-p".to_owned(), self.port.to_string()]);
        if self.password.is_none() {
            argv.extend(["-o".to_owned(), "BatchMode=yes".to_owned()]);
        }
        for opt in &self.options {
            argv.extend(["-o".to_owned(), opt.clone()]);
        }
        argv.push(self.destination());
        argv.push(remote_command.to_owned());
        argv
    }
}

impl Connection for SshConnection {
    fn describe(&self) -> String {
        format!("{}:{}", self.destination(), self.port)
    }

    fn execute(&self, request: &CommandRequest) -> Result<ExecutionResult, RuntimeError> {
        let argv = self.argv(&request.command);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| RuntimeError::Transport("empty ssh command line".to_owned()))?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(password) = &self.password {
            cmd.env("SSHPASS", password);
        }

        debug!("ssh {}: {}", self.describe(), request.command);
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
