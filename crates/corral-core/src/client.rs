use crate::state::LifecycleState;
use crate::CoreError;
use corral_runtime::ExecutionResult;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Lifecycle operations a client can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Start,
    Execute,
    Wait,
    Stop,
    Destroy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Start => write!(f, "start"),
            Self::Execute => write!(f, "execute"),
            Self::Wait => write!(f, "wait"),
            Self::Stop => write!(f, "stop"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

/// Whether `operation` may be issued while the container is in `state`.
pub fn is_legal(operation: Operation, state: LifecycleState) -> bool {
    use crate::state::LifecycleState::{Created, Initial, Running, Started, Stopped};
    match operation {
        Operation::Create => matches!(state, Initial),
        Operation::Start | Operation::Execute => matches!(state, Initial | Created | Stopped),
        Operation::Wait => matches!(state, Created | Started | Running | Stopped),
        Operation::Stop => matches!(state, Started | Running),
        Operation::Destroy => matches!(state, Created | Stopped),
    }
}

/// Reject `operation` before any command is issued when `current` does not
/// allow it.
pub fn check_state(
    name: &str,
    operation: Operation,
    current: LifecycleState,
) -> Result<(), CoreError> {
    if is_legal(operation, current) {
        Ok(())
    } else {
        Err(CoreError::StateViolation {
            name: name.to_owned(),
            operation,
            state: current,
        })
    }
}

/// State a `wait` blocks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitTarget {
    Running,
    Stopped,
}

impl WaitTarget {
    pub fn state(self) -> LifecycleState {
        match self {
            Self::Running => LifecycleState::Running,
            Self::Stopped => LifecycleState::Stopped,
        }
    }
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state())
    }
}

/// Per-call options for `execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Treat the command as complete once this text shows up in its output.
    pub prompt: Option<String>,
    pub timeout: Option<Duration>,
}

/// Technology-neutral lifecycle contract.
///
/// Every operation checks the current state first and fails with
/// `CoreError::StateViolation` without issuing anything when the state does
/// not allow it. Non-zero exit statuses are returned as data and leave the
/// state untouched; only transport failures surface as errors.
pub trait ContainerClient {
    fn name(&self) -> &str;
    fn state(&self) -> LifecycleState;
    /// True between a successful create and a successful destroy.
    fn requires_destroy(&self) -> bool;
    /// Set a config option, replacing any previous value for `key`.
    fn set_option(&mut self, key: &str, values: &[&str]);

    fn create(&mut self) -> Result<ExecutionResult, CoreError>;
    fn start(&mut self) -> Result<ExecutionResult, CoreError>;
    fn execute(
        &mut self,
        user_command: &str,
        options: &ExecOptions,
    ) -> Result<ExecutionResult, CoreError>;
    fn wait(&mut self, target: WaitTarget) -> Result<ExecutionResult, CoreError>;
    fn stop(&mut self) -> Result<ExecutionResult, CoreError>;
    /// Destroy the container. Returns a synthetic success without issuing a
    /// command when nothing is left to destroy.
    fn destroy(&mut self) -> Result<ExecutionResult, CoreError>;
    /// Destroy if needed and remove local scratch state, unless self-cleaning
    /// is disabled.
    fn clean(&mut self) -> Result<(), CoreError>;
}

impl<C: ContainerClient + ?Sized> ContainerClient for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn state(&self) -> LifecycleState {
        (**self).state()
    }

    fn requires_destroy(&self) -> bool {
        (**self).requires_destroy()
    }

    fn set_option(&mut self, key: &str, values: &[&str]) {
        (**self).set_option(key, values);
    }

    fn create(&mut self) -> Result<ExecutionResult, CoreError> {
        (**self).create()
    }

    fn start(&mut self) -> Result<ExecutionResult, CoreError> {
        (**self).start()
    }

    fn execute(
        &mut self,
        user_command: &str,
        options: &ExecOptions,
    ) -> Result<ExecutionResult, CoreError> {
        (**self).execute(user_command, options)
    }

    fn wait(&mut self, target: WaitTarget) -> Result<ExecutionResult, CoreError> {
        (**self).wait(target)
    }

    fn stop(&mut self) -> Result<ExecutionResult, CoreError> {
        (**self).stop()
    }

    fn destroy(&mut self) -> Result<ExecutionResult, CoreError> {
        (**self).destroy()
    }

    fn clean(&mut self) -> Result<(), CoreError> {
        (**self).clean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LifecycleState::{Created, Destroyed, Initial, Running, Started, Stopped};

    #[test]
    fn legal_states() {
        assert!(is_legal(Operation::Create, Initial));
        assert!(is_legal(Operation::Start, Initial));
        assert!(is_legal(Operation::Start, Created));
        assert!(is_legal(Operation::Start, Stopped));
        assert!(is_legal(Operation::Execute, Created));
        assert!(is_legal(Operation::Wait, Started));
        assert!(is_legal(Operation::Wait, Created));
        assert!(is_legal(Operation::Stop, Running));
        assert!(is_legal(Operation::Stop, Started));
        assert!(is_legal(Operation::Destroy, Created));
        assert!(is_legal(Operation::Destroy, Stopped));
    }

    #[test]
    fn illegal_states() {
        assert!(!is_legal(Operation::Create, Created));
        assert!(!is_legal(Operation::Create, Destroyed));
        assert!(!is_legal(Operation::Start, Running));
        assert!(!is_legal(Operation::Start, Started));
        assert!(!is_legal(Operation::Execute, Running));
        assert!(!is_legal(Operation::Wait, Initial));
        assert!(!is_legal(Operation::Wait, Destroyed));
        assert!(!is_legal(Operation::Stop, Created));
        assert!(!is_legal(Operation::Stop, Stopped));
        assert!(!is_legal(Operation::Destroy, Running));
        assert!(!is_legal(Operation::Destroy, Destroyed));
    }

    #[test]
    fn destroyed_is_terminal() {
        for op in [
            Operation::Create,
            Operation::Start,
            Operation::Execute,
            Operation::Wait,
            Operation::Stop,
            Operation::Destroy,
        ] {
            assert!(!is_legal(op, Destroyed), "{op} allowed after destroy");
        }
    }

    #[test]
    fn check_state_reports_violation() {
        let err = check_state("web", Operation::Start, Running).unwrap_err();
        assert!(matches!(
            err,
            CoreError::StateViolation {
                operation: Operation::Start,
                state: Running,
                ..
            }
        ));
        assert!(check_state("web", Operation::Start, Stopped).is_ok());
    }

    #[test]
    fn wait_target_maps_to_state() {
        assert_eq!(WaitTarget::Running.state(), Running);
        assert_eq!(WaitTarget::Stopped.to_string(), "stopped");
    }
}
