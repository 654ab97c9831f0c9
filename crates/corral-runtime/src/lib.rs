//! Command execution and transport layer for corral.
//!
//! This crate implements everything below the container client: the immutable
//! `ExecutionResult`, the raising `CommandRunner` for local one-shot commands,
//! and the `Connection` trait with a local shell, an SSH, and a recording
//! (dry-run/test) implementation. Connections report exit statuses as data;
//! callers decide what a non-zero status means.

pub mod connection;
pub mod local;
pub mod mock;
mod process;
pub mod quote;
pub mod result;
pub mod runner;
pub mod ssh;

pub use connection::{CommandRequest, Connection};
pub use local::LocalConnection;
pub use mock::RecordingConnection;
pub use quote::{shell_quote, shell_quote_path};
pub use result::ExecutionResult;
pub use runner::CommandRunner;
pub use ssh::SshConnection;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("command '{command}' failed with {result}")]
    CommandFailed {
        command: String,
        result: ExecutionResult,
    },
    #[error("command '{command}' timed out after {after:?}")]
    Timeout { command: String, after: Duration },
    #[error("transport error: {0}")]
    Transport(String),
}

impl RuntimeError {
    /// The captured result, for errors raised by a completed command.
    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            Self::CommandFailed { result, .. } => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_display_includes_status() {
        let e = RuntimeError::CommandFailed {
            command: "lxc-stop -n a".to_owned(),
            result: ExecutionResult::new(2, Vec::new()),
        };
        let msg = e.to_string();
        assert!(msg.contains("lxc-stop -n a"));
        assert!(msg.contains("exit status 2"));
        assert_eq!(e.result().map(ExecutionResult::exit_status), Some(2));
    }

    #[test]
    fn timeout_display_includes_duration() {
        let e = RuntimeError::Timeout {
            command: "lxc-wait".to_owned(),
            after: Duration::from_secs(5),
        };
        assert!(e.to_string().contains("5s"));
        assert!(e.result().is_none());
    }

    #[test]
    fn transport_display() {
        let e = RuntimeError::Transport("reason".to_owned());
        assert!(e.to_string().contains("reason"));
    }
}
