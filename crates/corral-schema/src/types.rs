//! Newtype wrappers for identifiers that end up interpolated into command lines.
//!
//! All newtypes serialize/deserialize as plain strings.

use crate::SettingsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

string_newtype!(
    /// Name of a remote container. Validated on construction because it is
    /// spliced unquoted into every lifecycle command line.
    ContainerName
);

impl ContainerName {
    pub fn new(name: impl Into<String>) -> Result<Self, SettingsError> {
        let name = name.into();
        validate_container_name(&name)?;
        Ok(Self(name))
    }
}

impl TryFrom<&str> for ContainerName {
    type Error = SettingsError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

pub fn validate_container_name(name: &str) -> Result<(), SettingsError> {
    if name.is_empty() || name.len() > 64 {
        return Err(SettingsError::InvalidName(
            "container name must be 1-64 characters".to_owned(),
        ));
    }
    if name.starts_with('-') || name.starts_with('.') {
        return Err(SettingsError::InvalidName(format!(
            "container name '{name}' must not start with '-' or '.'"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(SettingsError::InvalidName(format!(
            "container name '{name}' must match [a-zA-Z0-9_.-]"
        )));
    }
    Ok(())
}
