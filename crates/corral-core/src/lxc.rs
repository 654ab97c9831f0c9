use crate::client::{check_state, ContainerClient, ExecOptions, Operation, WaitTarget};
use crate::config::{write_config, ContainerConfig, CONFIG_FILE_NAME};
use crate::seccomp::write_seccomp_policy;
use crate::state::{LifecycleState, StateTracker};
use crate::CoreError;
use corral_runtime::{shell_quote, shell_quote_path, CommandRequest, Connection, ExecutionResult};
use corral_schema::ContainerName;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a destroy was answered with a synthetic success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NeverCreated,
    AlreadyDestroyed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverCreated => write!(f, "container was never created"),
            Self::AlreadyDestroyed => write!(f, "container was already destroyed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LxcOptions {
    /// Remove the scratch directory (and destroy the container) on `clean`.
    pub clean: bool,
    /// Pause after every lifecycle command.
    pub settle_delay: Duration,
    /// Upper bound for `lxc-wait`.
    pub wait_timeout: Option<Duration>,
    /// Log generated artifacts at info level every time they are pushed.
    pub show_configs: bool,
    /// Syscalls allowed by the seccomp policy. Empty means no policy.
    pub syscall_allowlist: Vec<String>,
    /// Options applied on top of the built-in defaults.
    pub preset: ContainerConfig,
    /// Parent of the scratch directory. Defaults to the system temp dir.
    pub scratch_root: Option<PathBuf>,
}

impl Default for LxcOptions {
    fn default() -> Self {
        Self {
            clean: true,
            settle_delay: Duration::ZERO,
            wait_timeout: None,
            show_configs: false,
            syscall_allowlist: Vec::new(),
            preset: ContainerConfig::new(),
            scratch_root: None,
        }
    }
}

/// `ContainerClient` driving the `lxc-*` command-line tools over a
/// `Connection`.
///
/// Each container gets a private scratch directory holding its generated
/// config (and seccomp policy). Before every command that consumes the config
/// the artifacts are rewritten locally and pushed to the same path on the
/// container host.
pub struct LxcContainerClient {
    name: ContainerName,
    connection: Arc<dyn Connection>,
    state: StateTracker,
    config: ContainerConfig,
    syscall_allowlist: Vec<String>,
    requires_destroy: bool,
    destroyed: bool,
    last_skip: Option<SkipReason>,
    scratch_dir: PathBuf,
    rc_file: Option<PathBuf>,
    clean: bool,
    settle_delay: Duration,
    wait_timeout: Option<Duration>,
    show_configs: bool,
}

impl LxcContainerClient {
    pub const CREATE_CMD: &'static str = "lxc-create";
    pub const START_CMD: &'static str = "lxc-start";
    pub const EXECUTE_CMD: &'static str = "lxc-execute";
    pub const WAIT_CMD: &'static str = "lxc-wait";
    pub const STOP_CMD: &'static str = "lxc-stop";
    pub const DESTROY_CMD: &'static str = "lxc-destroy";

    pub fn new(
        name: ContainerName,
        connection: Arc<dyn Connection>,
        options: LxcOptions,
    ) -> Result<Self, CoreError> {
        let mut config = ContainerConfig::new();
        config.set("lxc.utsname", name.as_str());
        config.set("lxc.network.type", "empty");
        config.merge(&options.preset);

        let root = options.scratch_root.unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&root)?;
        let scratch_dir = tempfile::Builder::new()
            .prefix(&format!("{name}."))
            .suffix(".lxc-corral")
            .tempdir_in(&root)?
            .keep();
        debug!(
            "container {name} uses scratch directory {} via {}",
            scratch_dir.display(),
            connection.describe()
        );

        Ok(Self {
            name,
            connection,
            state: StateTracker::default(),
            config,
            syscall_allowlist: options.syscall_allowlist,
            requires_destroy: false,
            destroyed: false,
            last_skip: None,
            scratch_dir,
            rc_file: None,
            clean: options.clean,
            settle_delay: options.settle_delay,
            wait_timeout: options.wait_timeout,
            show_configs: options.show_configs,
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Path of the most recently generated config file.
    pub fn rc_file(&self) -> Option<&Path> {
        self.rc_file.as_deref()
    }

    pub fn syscall_allowlist(&self) -> &[String] {
        &self.syscall_allowlist
    }

    pub fn allow_syscall(&mut self, syscall: impl Into<String>) {
        let syscall = syscall.into();
        if !self.syscall_allowlist.contains(&syscall) {
            self.syscall_allowlist.push(syscall);
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn set_settle_delay(&mut self, delay: Duration) {
        self.settle_delay = delay;
    }

    /// Why the most recent destroy did not issue a command, if it didn't.
    pub fn last_skip(&self) -> Option<SkipReason> {
        self.last_skip
    }

    /// Override the tracked state. Used when the container is managed
    /// outside this client.
    pub fn set_state(&mut self, raw: u8) -> Result<(), CoreError> {
        self.state.set_state(raw)
    }

    /// Write the config (and seccomp policy when an allowlist is set) into
    /// the scratch directory. Returns the config path and every artifact
    /// written, config last.
    pub fn generate_artifacts(&mut self) -> Result<(PathBuf, Vec<PathBuf>), CoreError> {
        fs::create_dir_all(&self.scratch_dir)?;
        let mut effective = self.config.clone();
        let mut artifacts = Vec::new();
        if !self.syscall_allowlist.is_empty() {
            let policy = write_seccomp_policy(&self.scratch_dir, &self.syscall_allowlist)?;
            effective.set("lxc.seccomp", policy.to_string_lossy().into_owned());
            artifacts.push(policy);
        }
        let rc_file = write_config(&self.scratch_dir, CONFIG_FILE_NAME, &effective)?;
        artifacts.push(rc_file.clone());
        self.rc_file = Some(rc_file.clone());
        Ok((rc_file, artifacts))
    }

    /// Every file in the scratch directory with a header line naming the
    /// container, in file-name order.
    pub fn render_artifacts(&self) -> Result<String, CoreError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.scratch_dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut out = String::new();
        for path in paths {
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push_str(&format!("LXC {} {file}:\n", self.name));
            out.push_str(&fs::read_to_string(&path)?);
        }
        Ok(out)
    }

    fn push_config(&mut self) -> Result<PathBuf, CoreError> {
        let (rc_file, artifacts) = self.generate_artifacts()?;

        let mkdir = format!("mkdir -p {}", shell_quote_path(&self.scratch_dir));
        self.push(&mkdir, &self.scratch_dir)?;
        for path in &artifacts {
            let content = fs::read_to_string(path)?;
            let cmd = format!(
                "printf '%s' {} > {}",
                shell_quote(&content),
                shell_quote_path(path)
            );
            self.push(&cmd, path)?;
        }

        if self.show_configs {
            info!("{}", self.render_artifacts()?);
        }
        Ok(rc_file)
    }

    fn push(&self, command: &str, path: &Path) -> Result<(), CoreError> {
        let result = self.connection.execute(&CommandRequest::new(command))?;
        if result.success() {
            Ok(())
        } else {
            Err(CoreError::ArtifactPush {
                path: path.to_path_buf(),
                result,
            })
        }
    }

    fn run(&self, request: &CommandRequest) -> Result<ExecutionResult, CoreError> {
        debug!("{}: {}", self.connection.describe(), request.command);
        let result = self.connection.execute(request)?;
        if !result.success() {
            debug!("'{}' exited with status {}", request.command, result.exit_status());
        }
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
        Ok(result)
    }

    fn check(&self, operation: Operation) -> Result<(), CoreError> {
        check_state(self.name.as_str(), operation, self.state.value())
    }

    fn wait_state_name(target: WaitTarget) -> &'static str {
        match target {
            WaitTarget::Running => "RUNNING",
            WaitTarget::Stopped => "STOPPED",
        }
    }

    fn remove_scratch(&mut self) -> Result<(), CoreError> {
        if self.scratch_dir.exists() {
            fs::remove_dir_all(&self.scratch_dir).map_err(|source| CoreError::ScratchCleanup {
                path: self.scratch_dir.clone(),
                source,
            })?;
            debug!("removed scratch directory {}", self.scratch_dir.display());
        }
        Ok(())
    }
}

impl ContainerClient for LxcContainerClient {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn state(&self) -> LifecycleState {
        self.state.value()
    }

    fn requires_destroy(&self) -> bool {
        self.requires_destroy
    }

    fn set_option(&mut self, key: &str, values: &[&str]) {
        self.config.set_option(key, values.iter().copied());
    }

    fn create(&mut self) -> Result<ExecutionResult, CoreError> {
        self.check(Operation::Create)?;
        info!("creating container {}", self.name);
        let rc_file = self.push_config()?;
        let cmd = format!(
            "{} -n {} -f {}",
            Self::CREATE_CMD,
            self.name,
            shell_quote_path(&rc_file)
        );
        let result = self.run(&CommandRequest::new(cmd))?;
        if result.success() {
            self.requires_destroy = true;
            self.state.set(LifecycleState::Created);
        }
        Ok(result)
    }

    fn start(&mut self) -> Result<ExecutionResult, CoreError> {
        self.check(Operation::Start)?;
        info!("starting container {}", self.name);
        let rc_file = self.push_config()?;
        let cmd = format!(
            "{} -n {} -f {}",
            Self::START_CMD,
            self.name,
            shell_quote_path(&rc_file)
        );
        let result = self.run(&CommandRequest::new(cmd))?;
        if result.success() {
            self.state.set(LifecycleState::Started);
        }
        Ok(result)
    }

    fn execute(
        &mut self,
        user_command: &str,
        options: &ExecOptions,
    ) -> Result<ExecutionResult, CoreError> {
        self.check(Operation::Execute)?;
        info!("executing in container {}: {user_command}", self.name);
        let rc_file = self.push_config()?;
        let cmd = format!(
            "{} -n {} -f {} -- {user_command}",
            Self::EXECUTE_CMD,
            self.name,
            shell_quote_path(&rc_file)
        );
        let mut request = CommandRequest::new(cmd).with_optional_timeout(options.timeout);
        if let Some(prompt) = &options.prompt {
            request = request.with_prompt(prompt.clone());
        }
        self.run(&request)
    }

    fn wait(&mut self, target: WaitTarget) -> Result<ExecutionResult, CoreError> {
        self.check(Operation::Wait)?;
        debug!("waiting for container {} to be {target}", self.name);
        let cmd = format!(
            "{} -n {} -s {}",
            Self::WAIT_CMD,
            self.name,
            Self::wait_state_name(target)
        );
        let result =
            self.run(&CommandRequest::new(cmd).with_optional_timeout(self.wait_timeout))?;
        if result.success() {
            let current = self.state.value();
            match target {
                WaitTarget::Running if current == LifecycleState::Started => {
                    self.state.set(LifecycleState::Running);
                }
                WaitTarget::Stopped
                    if matches!(current, LifecycleState::Started | LifecycleState::Running) =>
                {
                    self.state.set(LifecycleState::Stopped);
                }
                _ => {}
            }
        }
        Ok(result)
    }

    fn stop(&mut self) -> Result<ExecutionResult, CoreError> {
        self.check(Operation::Stop)?;
        info!("stopping container {}", self.name);
        let cmd = format!("{} -n {}", Self::STOP_CMD, self.name);
        let result = self.run(&CommandRequest::new(cmd))?;
        if result.success() {
            self.state.set(LifecycleState::Stopped);
        }
        Ok(result)
    }

    fn destroy(&mut self) -> Result<ExecutionResult, CoreError> {
        if !self.requires_destroy {
            let reason = if self.destroyed {
                SkipReason::AlreadyDestroyed
            } else {
                SkipReason::NeverCreated
            };
            debug!("skipping destroy of {}: {reason}", self.name);
            self.last_skip = Some(reason);
            return Ok(ExecutionResult::synthetic_success());
        }
        self.check(Operation::Destroy)?;
        info!("destroying container {}", self.name);
        self.last_skip = None;
        let cmd = format!("{} -n {}", Self::DESTROY_CMD, self.name);
        let result = self.run(&CommandRequest::new(cmd))?;
        if result.success() {
            self.requires_destroy = false;
            self.destroyed = true;
            self.state.set(LifecycleState::Destroyed);
        }
        Ok(result)
    }

    fn clean(&mut self) -> Result<(), CoreError> {
        if !self.clean {
            debug!(
                "cleanup disabled, leaving container {} and {}",
                self.name,
                self.scratch_dir.display()
            );
            return Ok(());
        }
        let result = self.destroy()?;
        if !result.success() {
            warn!(
                "destroy of {} failed, keeping {}",
                self.name,
                self.scratch_dir.display()
            );
            return Err(CoreError::StepFailed {
                step: Operation::Destroy.to_string(),
                result,
            });
        }
        self.remove_scratch()
    }
}
