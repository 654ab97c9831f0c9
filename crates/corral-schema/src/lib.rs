//! Settings model and naming rules for corral.
//!
//! This crate defines the configuration layer: the TOML settings file
//! (`Settings`) with its `[containers]`, `[container_test_info]` and `[lxc]`
//! sections, and the validated `ContainerName` used on every command line.

pub mod settings;
pub mod types;

pub use settings::{
    parse_settings_file, parse_settings_str, ContainersSection, LxcSection, Settings,
    TestParameters,
};
pub use types::{validate_container_name, ContainerName};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
    #[error("invalid container name: {0}")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_error_display_invalid_name() {
        let e = SettingsError::InvalidName("bad".to_owned());
        assert!(e.to_string().contains("invalid container name"));
    }

    #[test]
    fn settings_error_display_invalid() {
        let e = SettingsError::Invalid("reason".to_owned());
        assert!(e.to_string().contains("reason"));
    }
}
