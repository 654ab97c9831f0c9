use crate::client::ContainerClient;
use crate::config::ContainerConfig;
use crate::lxc::{LxcContainerClient, LxcOptions};
use crate::CoreError;
use corral_runtime::{Connection, LocalConnection, SshConnection};
use corral_schema::{ContainerName, ContainersSection, Settings};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerTechnology {
    Lxc,
}

impl FromStr for ContainerTechnology {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lxc" => Ok(Self::Lxc),
            _ => Err(CoreError::UnknownTechnology(s.to_owned())),
        }
    }
}

impl fmt::Display for ContainerTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lxc => write!(f, "lxc"),
        }
    }
}

/// Where commands are issued from, relative to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePoint {
    /// On the container host, reached over SSH.
    Host,
    /// On the machine running corral.
    LocalHost,
    /// From the container host into the container.
    HostToContainer,
    /// Inside the container.
    Container,
}

impl ReferencePoint {
    pub const ALL: [Self; 4] = [
        Self::Host,
        Self::LocalHost,
        Self::HostToContainer,
        Self::Container,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::LocalHost => "local_host",
            Self::HostToContainer => "host_to_container",
            Self::Container => "container",
        }
    }
}

impl FromStr for ReferencePoint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rp| rp.as_str() == s)
            .ok_or_else(|| CoreError::UnknownReferencePoint(s.to_owned()))
    }
}

impl fmt::Display for ReferencePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Constructor =
    fn(ContainerName, Arc<dyn Connection>, LxcOptions) -> Result<Box<dyn ContainerClient>, CoreError>;

fn build_lxc(
    name: ContainerName,
    connection: Arc<dyn Connection>,
    options: LxcOptions,
) -> Result<Box<dyn ContainerClient>, CoreError> {
    Ok(Box::new(LxcContainerClient::new(name, connection, options)?))
}

const REGISTRY: &[(ContainerTechnology, ReferencePoint, Constructor)] = &[
    (
        ContainerTechnology::Lxc,
        ReferencePoint::HostToContainer,
        build_lxc,
    ),
    (ContainerTechnology::Lxc, ReferencePoint::LocalHost, build_lxc),
];

/// Reference points with a client registered for `technology`.
pub fn supported_reference_points(technology: ContainerTechnology) -> Vec<ReferencePoint> {
    REGISTRY
        .iter()
        .filter(|(t, _, _)| *t == technology)
        .map(|(_, rp, _)| *rp)
        .collect()
}

fn lookup(
    technology: ContainerTechnology,
    reference_point: ReferencePoint,
) -> Result<Constructor, CoreError> {
    REGISTRY
        .iter()
        .find(|(t, rp, _)| *t == technology && *rp == reference_point)
        .map(|(_, _, ctor)| *ctor)
        .ok_or(CoreError::UnknownCombination {
            technology,
            reference_point,
        })
}

/// Open the transport matching `reference_point`.
///
/// `Container` hops through the host with `ProxyJump`, so the host must
/// accept key-based logins.
pub fn connect(
    containers: &ContainersSection,
    reference_point: ReferencePoint,
) -> Result<Arc<dyn Connection>, CoreError> {
    let host_ip = || {
        containers
            .host_ip
            .as_deref()
            .ok_or(CoreError::MissingSetting("containers.host_ip"))
    };
    let host_ssh = |host: &str| {
        let mut ssh = SshConnection::new(host).port(containers.host_port);
        if let Some(user) = &containers.host_username {
            ssh = ssh.user(user.clone());
        }
        if let Some(password) = &containers.host_password {
            ssh = ssh.password(password.clone());
        }
        ssh
    };

    let connection: Arc<dyn Connection> = match reference_point {
        ReferencePoint::LocalHost => Arc::new(LocalConnection::new()),
        ReferencePoint::Host | ReferencePoint::HostToContainer => Arc::new(host_ssh(host_ip()?)),
        ReferencePoint::Container => {
            let host = host_ip()?;
            let jump = match &containers.host_username {
                Some(user) => format!("{user}@{host}:{}", containers.host_port),
                None => format!("{host}:{}", containers.host_port),
            };
            let container_ip = containers
                .container_ip
                .as_deref()
                .ok_or(CoreError::MissingSetting("containers.container_ip"))?;
            let mut ssh = SshConnection::new(container_ip).option(format!("ProxyJump={jump}"));
            if let Some(user) = &containers.container_username {
                ssh = ssh.user(user.clone());
            }
            if let Some(password) = &containers.container_password {
                ssh = ssh.password(password.clone());
            }
            Arc::new(ssh)
        }
    };
    debug!("{reference_point} connection: {}", connection.describe());
    Ok(connection)
}

/// Builds container clients for one technology and reference point from
/// loaded settings.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    technology: ContainerTechnology,
    reference_point: ReferencePoint,
    default_name: Option<ContainerName>,
    options: LxcOptions,
}

impl ClientFactory {
    pub fn new(technology: ContainerTechnology, reference_point: ReferencePoint) -> Self {
        Self {
            technology,
            reference_point,
            default_name: None,
            options: LxcOptions::default(),
        }
    }

    pub fn from_settings(
        settings: &Settings,
        reference_point: ReferencePoint,
    ) -> Result<Self, CoreError> {
        let technology: ContainerTechnology = settings.containers.container_type.parse()?;
        let default_name = settings
            .containers
            .default_container_name
            .as_deref()
            .map(ContainerName::new)
            .transpose()?;
        let options = LxcOptions {
            clean: settings.containers.cleanup_enabled(),
            settle_delay: settings.containers.settle_delay(),
            wait_timeout: settings.lxc.wait_timeout(),
            show_configs: settings.containers.show_configs,
            syscall_allowlist: settings.lxc.syscall_allowlist.clone(),
            preset: ContainerConfig::from_table(&settings.lxc.options)?,
            scratch_root: None,
        };
        Ok(Self {
            technology,
            reference_point,
            default_name,
            options,
        })
    }

    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.options.scratch_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: LxcOptions) -> Self {
        self.options = options;
        self
    }

    pub fn technology(&self) -> ContainerTechnology {
        self.technology
    }

    pub fn reference_point(&self) -> ReferencePoint {
        self.reference_point
    }

    pub fn options(&self) -> &LxcOptions {
        &self.options
    }

    /// `name`, or the configured default when absent.
    pub fn container_name(&self, name: Option<&str>) -> Result<ContainerName, CoreError> {
        match name {
            Some(name) => Ok(ContainerName::new(name)?),
            None => self
                .default_name
                .clone()
                .ok_or(CoreError::MissingSetting("containers.default_container_name")),
        }
    }

    pub fn build(
        &self,
        name: Option<&str>,
        connection: Arc<dyn Connection>,
    ) -> Result<Box<dyn ContainerClient>, CoreError> {
        let ctor = lookup(self.technology, self.reference_point)?;
        let name = self.container_name(name)?;
        debug!(
            "building {} client for {name} at {}",
            self.technology, self.reference_point
        );
        ctor(name, connection, self.options.clone())
    }
}
