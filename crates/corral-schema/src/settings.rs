use crate::SettingsError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level settings file (`corral.toml`).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub containers: ContainersSection,
    #[serde(default)]
    pub container_test_info: TestParameters,
    #[serde(default)]
    pub lxc: LxcSection,
}

/// Basic container setup: which technology, where the host lives, and how
/// to log in to it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ContainersSection {
    #[serde(default = "default_container_type")]
    pub container_type: String,
    #[serde(default)]
    pub default_container_name: Option<String>,
    #[serde(default)]
    pub host_ip: Option<String>,
    #[serde(default = "default_host_port")]
    pub host_port: u16,
    #[serde(default)]
    pub container_ip: Option<String>,
    #[serde(default)]
    pub container_username: Option<String>,
    #[serde(default)]
    pub container_password: Option<String>,
    #[serde(default)]
    pub host_username: Option<String>,
    #[serde(default)]
    pub host_password: Option<String>,
    /// Leave the container and its scratch artifacts behind after use.
    #[serde(default)]
    pub no_cleanup: bool,
    /// Log the generated configuration artifacts whenever they are pushed.
    #[serde(default)]
    pub show_configs: bool,
    #[serde(default)]
    pub primary_flavor: Option<String>,
    #[serde(default)]
    pub secondary_flavor: Option<String>,
    #[serde(default)]
    pub primary_image: Option<String>,
    #[serde(default)]
    pub secondary_image: Option<String>,
    /// Seconds to pause after every lifecycle command. Some `lxc-*` tools
    /// return before the host has finished acting on the request.
    #[serde(default)]
    pub lxc_cmd_delay: f64,
}

impl Default for ContainersSection {
    fn default() -> Self {
        Self {
            container_type: default_container_type(),
            default_container_name: None,
            host_ip: None,
            host_port: default_host_port(),
            container_ip: None,
            container_username: None,
            container_password: None,
            host_username: None,
            host_password: None,
            no_cleanup: false,
            show_configs: false,
            primary_flavor: None,
            secondary_flavor: None,
            primary_image: None,
            secondary_image: None,
            lxc_cmd_delay: 0.0,
        }
    }
}

impl ContainersSection {
    pub fn settle_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.lxc_cmd_delay).unwrap_or_default()
    }

    pub fn cleanup_enabled(&self) -> bool {
        !self.no_cleanup
    }
}

/// Parameters consumed by container test suites.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TestParameters {
    #[serde(default)]
    pub virtualization_mem_limit_lxc_kb: Option<u64>,
    #[serde(default)]
    pub virtualization_mem_tolerance_kb: Option<u64>,
    #[serde(default)]
    pub mkdir_depth: Option<u32>,
    #[serde(default)]
    pub temp_mkdir_dir: Option<String>,
    #[serde(default)]
    pub max_fork_procs: Option<u32>,
    #[serde(default)]
    pub host_pollution_user: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

impl TestParameters {
    /// Scratch directory for nested-mkdir tests, always with a trailing `/`.
    pub fn temp_mkdir_dir(&self) -> Option<String> {
        self.temp_mkdir_dir.as_ref().map(|dir| {
            if dir.ends_with('/') {
                dir.clone()
            } else {
                format!("{dir}/")
            }
        })
    }
}

/// LXC specifics: preset configuration keys and the seccomp allow-list.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LxcSection {
    /// Preset `lxc.*` keys merged over the built-in defaults. Values must be
    /// strings or arrays of strings; this is checked when a client is built.
    #[serde(default)]
    pub options: toml::Table,
    #[serde(default)]
    pub syscall_allowlist: Vec<String>,
    #[serde(default)]
    pub wait_timeout_secs: Option<u64>,
}

impl LxcSection {
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }
}

fn default_container_type() -> String {
    "lxc".to_owned()
}

fn default_host_port() -> u16 {
    22
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let delay = self.containers.lxc_cmd_delay;
        if let Err(e) = Duration::try_from_secs_f64(delay) {
            return Err(SettingsError::Invalid(format!(
                "containers.lxc_cmd_delay must be a non-negative number of seconds, got {delay}: {e}"
            )));
        }
        if let Some(name) = &self.containers.default_container_name {
            crate::validate_container_name(name)?;
        }
        if self.lxc.syscall_allowlist.iter().any(|s| s.trim().is_empty()) {
            return Err(SettingsError::Invalid(
                "lxc.syscall_allowlist must not contain empty entries".to_owned(),
            ));
        }
        Ok(())
    }
}

pub fn parse_settings_str(input: &str) -> Result<Settings, SettingsError> {
    let settings: Settings = toml::from_str(input)?;
    settings.validate()?;
    Ok(settings)
}

pub fn parse_settings_file(path: impl AsRef<Path>) -> Result<Settings, SettingsError> {
    let content = fs::read_to_string(path)?;
    parse_settings_str(&content)
}
