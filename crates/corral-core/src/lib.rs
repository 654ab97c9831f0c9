//! Container lifecycle orchestration for corral.
//!
//! This crate holds the lifecycle state machine, the technology-neutral
//! `ContainerClient` contract with its LXC implementation, config and
//! seccomp artifact generation, the `LifecycleScope` that guarantees
//! teardown, and the factory that picks a client for a technology and
//! reference point. It also provides per-container locking and the
//! shutdown flag used by long-running commands.

pub mod client;
pub mod concurrency;
pub mod config;
pub mod factory;
pub mod lxc;
pub mod scope;
pub mod seccomp;
pub mod state;

pub use client::{check_state, is_legal, ContainerClient, ExecOptions, Operation, WaitTarget};
pub use concurrency::{install_signal_handler, shutdown_requested, ContainerLock};
pub use config::{read_config, write_config, ConfigValue, ContainerConfig, CONFIG_FILE_NAME};
pub use factory::{connect, ClientFactory, ContainerTechnology, ReferencePoint};
pub use lxc::{LxcContainerClient, LxcOptions, SkipReason};
pub use scope::{
    run_scoped, teardown, LifecycleScope, ScopeError, ScopeStep, SetupError, StepFailure,
    StepOutcome, TeardownReport,
};
pub use seccomp::{render_seccomp_policy, write_seccomp_policy, SECCOMP_FILE_NAME};
pub use state::{LifecycleState, StateTracker};

use corral_runtime::ExecutionResult;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("settings error: {0}")]
    Settings(#[from] corral_schema::SettingsError),
    #[error("runtime error: {0}")]
    Runtime(#[from] corral_runtime::RuntimeError),
    #[error("cannot {operation} container '{name}' while it is {state}")]
    StateViolation {
        name: String,
        operation: Operation,
        state: LifecycleState,
    },
    #[error("unrecognized lifecycle state: {0}")]
    UnrecognizedState(u8),
    #[error("config value for '{key}' must be a string or a list of strings, found {found}")]
    ConfigValue { key: String, found: String },
    #[error("failed to push {} to the container host: {result}", .path.display())]
    ArtifactPush {
        path: PathBuf,
        result: ExecutionResult,
    },
    #[error("failed to remove scratch directory {}: {source}", .path.display())]
    ScratchCleanup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unknown container technology: {0}")]
    UnknownTechnology(String),
    #[error(
        "unknown reference point: {0} (expected host, local_host, host_to_container or container)"
    )]
    UnknownReferencePoint(String),
    #[error("no {technology} client is registered for reference point {reference_point}")]
    UnknownCombination {
        technology: ContainerTechnology,
        reference_point: ReferencePoint,
    },
    #[error("missing setting: {0}")]
    MissingSetting(&'static str),
    #[error("{step} exited with {result}")]
    StepFailed {
        step: String,
        result: ExecutionResult,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// The captured result, for errors caused by a command that completed.
    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            Self::ArtifactPush { result, .. } | Self::StepFailed { result, .. } => Some(result),
            Self::Runtime(e) => e.result(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_violation_names_operation_and_state() {
        let e = CoreError::StateViolation {
            name: "web".to_owned(),
            operation: Operation::Stop,
            state: LifecycleState::Created,
        };
        assert_eq!(e.to_string(), "cannot stop container 'web' while it is created");
    }

    #[test]
    fn artifact_push_carries_result() {
        let e = CoreError::ArtifactPush {
            path: PathBuf::from("/tmp/web.x.lxc-corral/config"),
            result: ExecutionResult::new(1, "permission denied"),
        };
        assert!(e.to_string().contains("/tmp/web.x.lxc-corral/config"));
        assert_eq!(e.result().map(ExecutionResult::exit_status), Some(1));
    }

    #[test]
    fn unknown_combination_display() {
        let e = CoreError::UnknownCombination {
            technology: ContainerTechnology::Lxc,
            reference_point: ReferencePoint::Container,
        };
        assert_eq!(
            e.to_string(),
            "no lxc client is registered for reference point container"
        );
    }

    #[test]
    fn runtime_result_is_forwarded() {
        let e = CoreError::from(corral_runtime::RuntimeError::CommandFailed {
            command: "false".to_owned(),
            result: ExecutionResult::new(1, Vec::new()),
        });
        assert_eq!(e.result().map(ExecutionResult::exit_status), Some(1));
    }
}
