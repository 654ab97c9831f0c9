use crate::client::{ContainerClient, WaitTarget};
use crate::CoreError;
use corral_runtime::ExecutionResult;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One step of the scoped lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStep {
    Create,
    WaitStopped,
    Start,
    WaitRunning,
    Stop,
    Destroy,
    Clean,
}

impl ScopeStep {
    pub const SETUP: [Self; 4] = [Self::Create, Self::WaitStopped, Self::Start, Self::WaitRunning];
    pub const TEARDOWN: [Self; 4] = [Self::Stop, Self::WaitStopped, Self::Destroy, Self::Clean];

    fn apply<C: ContainerClient + ?Sized>(
        self,
        client: &mut C,
    ) -> Result<Option<ExecutionResult>, CoreError> {
        match self {
            Self::Create => client.create().map(Some),
            Self::WaitStopped => client.wait(WaitTarget::Stopped).map(Some),
            Self::Start => client.start().map(Some),
            Self::WaitRunning => client.wait(WaitTarget::Running).map(Some),
            Self::Stop => client.stop().map(Some),
            Self::Destroy => client.destroy().map(Some),
            Self::Clean => client.clean().map(|()| None),
        }
    }
}

impl fmt::Display for ScopeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::WaitStopped => write!(f, "wait(stopped)"),
            Self::Start => write!(f, "start"),
            Self::WaitRunning => write!(f, "wait(running)"),
            Self::Stop => write!(f, "stop"),
            Self::Destroy => write!(f, "destroy"),
            Self::Clean => write!(f, "clean"),
        }
    }
}

/// What happened to one step, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: ScopeStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
    /// Set when the step did not apply in the container's state.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && !matches!(&self.result, Some(r) if !r.success())
    }
}

#[derive(Debug)]
pub struct StepFailure {
    pub step: ScopeStep,
    pub error: CoreError,
}

/// Outcome of every teardown step. Steps are always all attempted.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub outcomes: Vec<StepOutcome>,
    pub failures: Vec<StepFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// `allocated` is whether the container still needs destroying after
    /// the step ran.
    fn record(
        &mut self,
        step: ScopeStep,
        outcome: Result<Option<ExecutionResult>, CoreError>,
        allocated: bool,
    ) {
        match outcome {
            Ok(result) => {
                if let Some(failed) = result.as_ref().filter(|r| !r.success()) {
                    warn!("teardown step {step} exited with {failed}");
                    self.failures.push(StepFailure {
                        step,
                        error: CoreError::StepFailed {
                            step: step.to_string(),
                            result: failed.clone(),
                        },
                    });
                }
                self.outcomes.push(StepOutcome {
                    step,
                    result,
                    skipped: false,
                    error: None,
                });
            }
            // The container never reached a state this step applies to.
            Err(CoreError::StateViolation { state, .. })
                if !(allocated && matches!(step, ScopeStep::Destroy | ScopeStep::Clean)) =>
            {
                debug!("teardown step {step} does not apply while {state}");
                self.outcomes.push(StepOutcome {
                    step,
                    result: None,
                    skipped: true,
                    error: None,
                });
            }
            Err(error) => {
                warn!("teardown step {step} failed: {error}");
                self.outcomes.push(StepOutcome {
                    step,
                    result: None,
                    skipped: false,
                    error: Some(error.to_string()),
                });
                self.failures.push(StepFailure { step, error });
            }
        }
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "teardown completed");
        }
        write!(f, "teardown failed:")?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { " " } else { "; " };
            write!(f, "{sep}{}: {}", failure.step, failure.error)?;
        }
        Ok(())
    }
}

/// Stop, wait for stopped, destroy and clean, attempting every step no
/// matter how the previous one went.
pub fn teardown<C: ContainerClient + ?Sized>(client: &mut C) -> TeardownReport {
    info!("tearing down container {}", client.name());
    let mut report = TeardownReport::default();
    for step in ScopeStep::TEARDOWN {
        let outcome = step.apply(client);
        report.record(step, outcome, client.requires_destroy());
    }
    report
}

#[derive(Debug, Error)]
#[error("container setup failed at {step}: {error}")]
pub struct SetupError {
    pub step: ScopeStep,
    #[source]
    pub error: CoreError,
    pub outcomes: Vec<StepOutcome>,
    pub teardown: TeardownReport,
}

#[derive(Debug, Error)]
pub enum ScopeError<E> {
    #[error(transparent)]
    Setup(SetupError),
    /// The body failed. Its error is kept as-is; teardown ran regardless.
    #[error("work inside container scope failed: {error}")]
    Body { error: E, teardown: TeardownReport },
    #[error("{0}")]
    Teardown(TeardownReport),
}

/// A container held running for the lifetime of the scope.
///
/// `enter` creates and starts the container; `exit` (or dropping the scope,
/// including during a panic) stops, destroys and cleans it.
pub struct LifecycleScope<'c, C: ContainerClient + ?Sized> {
    client: &'c mut C,
    setup: Vec<StepOutcome>,
    finished: bool,
}

impl<'c, C: ContainerClient + ?Sized> LifecycleScope<'c, C> {
    /// Run create, wait(stopped), start and wait(running). Any failure runs
    /// the full teardown before returning.
    pub fn enter(client: &'c mut C) -> Result<Self, SetupError> {
        let mut setup = Vec::new();
        for step in ScopeStep::SETUP {
            let error = match step.apply(client) {
                Ok(result) => {
                    let failed = result.as_ref().filter(|r| !r.success()).cloned();
                    setup.push(StepOutcome {
                        step,
                        result,
                        skipped: false,
                        error: None,
                    });
                    match failed {
                        None => continue,
                        Some(result) => CoreError::StepFailed {
                            step: step.to_string(),
                            result,
                        },
                    }
                }
                Err(error) => {
                    setup.push(StepOutcome {
                        step,
                        result: None,
                        skipped: false,
                        error: Some(error.to_string()),
                    });
                    error
                }
            };
            warn!("setup of container {} failed at {step}: {error}", client.name());
            let teardown = teardown(client);
            return Err(SetupError {
                step,
                error,
                outcomes: setup,
                teardown,
            });
        }
        info!("container {} is running", client.name());
        Ok(Self {
            client,
            setup,
            finished: false,
        })
    }

    pub fn client(&mut self) -> &mut C {
        &mut *self.client
    }

    pub fn setup_outcomes(&self) -> &[StepOutcome] {
        &self.setup
    }

    pub fn exit(mut self) -> TeardownReport {
        self.finished = true;
        teardown(&mut *self.client)
    }
}

impl<C: ContainerClient + ?Sized> Drop for LifecycleScope<'_, C> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let report = teardown(&mut *self.client);
        if !report.is_clean() {
            warn!(
                "container {} after abnormal scope exit: {report}",
                self.client.name()
            );
        }
    }
}

/// Run `body` against a running container, tearing it down afterwards.
///
/// A body error is returned unchanged inside `ScopeError::Body` even when
/// teardown also fails.
pub fn run_scoped<C, T, E, F>(client: &mut C, body: F) -> Result<T, ScopeError<E>>
where
    C: ContainerClient + ?Sized,
    F: FnOnce(&mut C) -> Result<T, E>,
{
    let mut scope = LifecycleScope::enter(client).map_err(ScopeError::Setup)?;
    let outcome = body(scope.client());
    let teardown = scope.exit();
    match outcome {
        Ok(value) if teardown.is_clean() => Ok(value),
        Ok(_) => Err(ScopeError::Teardown(teardown)),
        Err(error) => Err(ScopeError::Body { error, teardown }),
    }
}
