use crate::CoreError;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the generated container config inside the scratch directory.
pub const CONFIG_FILE_NAME: &str = "config";

/// A config option's value: one string, or an ordered list of distinct
/// strings rendered joined by `", "`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Single(String),
    Multi(Vec<String>),
}

impl ConfigValue {
    /// Build a multi-value, dropping repeated entries but keeping the order
    /// of first appearance.
    pub fn multi<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen: Vec<String> = Vec::new();
        for value in values {
            let value = value.into();
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        Self::Multi(seen)
    }

    /// Convert a TOML value from a settings file.
    pub fn from_toml(key: &str, value: &toml::Value) -> Result<Self, CoreError> {
        match value {
            toml::Value::String(s) => Ok(Self::Single(s.clone())),
            toml::Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        toml::Value::String(s) => values.push(s.clone()),
                        other => {
                            return Err(CoreError::ConfigValue {
                                key: key.to_owned(),
                                found: format!("an array containing {}", other.type_str()),
                            })
                        }
                    }
                }
                Ok(Self::multi(values))
            }
            other => Err(CoreError::ConfigValue {
                key: key.to_owned(),
                found: other.type_str().to_owned(),
            }),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(s) => f.write_str(s),
            Self::Multi(values) => f.write_str(&values.join(", ")),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::Single(s.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        Self::Single(s)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(values: Vec<String>) -> Self {
        Self::multi(values)
    }
}

/// Ordered key/value options for one container. Setting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerConfig {
    entries: Vec<(String, ConfigValue)>,
}

impl ContainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options from a TOML table, in key order.
    pub fn from_table(table: &toml::Table) -> Result<Self, CoreError> {
        let mut config = Self::new();
        for (key, value) in table {
            config.set(key, ConfigValue::from_toml(key, value)?);
        }
        Ok(config)
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_owned(), value)),
        }
    }

    /// Set `key` from one or more values. A single value is stored as-is.
    pub fn set_option<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        let value = if values.len() == 1 {
            ConfigValue::Single(values.remove(0))
        } else {
            ConfigValue::multi(values)
        };
        self.set(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Apply every option of `other` on top of this config.
    pub fn merge(&mut self, other: &ContainerConfig) {
        for (key, value) in &other.entries {
            self.set(key, value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `key = value` lines in insertion order.
    pub fn lines(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("{k} = {v}")).collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Write `config` to `dir/filename`, replacing any previous file.
///
/// Uses a temp file and rename so readers never see a partial config.
pub fn write_config(
    dir: &Path,
    filename: &str,
    config: &ContainerConfig,
) -> Result<PathBuf, CoreError> {
    let dest = dir.join(filename);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(config.render().as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(&dest).map_err(|e| CoreError::Io(e.error))?;
    Ok(dest)
}

/// Lines of a config file previously written by `write_config`.
pub fn read_config(path: &Path) -> Result<Vec<String>, CoreError> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_owned).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ContainerConfig::new();
        config.set("a", "1");
        config.set_option("b", ["x", "y"]);

        let path = write_config(dir.path(), "config", &config).unwrap();
        assert_eq!(path, dir.path().join("config"));
        assert_eq!(read_config(&path).unwrap(), vec!["a = 1", "b = x, y"]);
    }

    #[test]
    fn rewrite_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ContainerConfig::new();
        config.set("lxc.utsname", "web");
        config.set("lxc.network.type", "empty");
        write_config(dir.path(), "config", &config).unwrap();

        let mut smaller = ContainerConfig::new();
        smaller.set("lxc.utsname", "web");
        let path = write_config(dir.path(), "config", &smaller).unwrap();
        assert_eq!(read_config(&path).unwrap(), vec!["lxc.utsname = web"]);
    }

    #[test]
    fn set_replaces_in_place() {
        let mut config = ContainerConfig::new();
        config.set("first", "1");
        config.set("second", "2");
        config.set("first", "3");
        assert_eq!(config.lines(), vec!["first = 3", "second = 2"]);
        assert_eq!(config.len(), 2);
    }

    #[test]
    fn multi_drops_duplicates_keeping_order() {
        let value = ConfigValue::multi(["b", "a", "b", "c", "a"]);
        assert_eq!(value.to_string(), "b, a, c");
    }

    #[test]
    fn set_option_single_value_is_single() {
        let mut config = ContainerConfig::new();
        config.set_option("lxc.cap.drop", ["sys_admin"]);
        assert_eq!(
            config.get("lxc.cap.drop"),
            Some(&ConfigValue::Single("sys_admin".to_owned()))
        );
    }

    #[test]
    fn merge_overrides_and_appends() {
        let mut base = ContainerConfig::new();
        base.set("lxc.utsname", "web");
        base.set("lxc.network.type", "empty");
        let mut preset = ContainerConfig::new();
        preset.set("lxc.network.type", "veth");
        preset.set("lxc.tty", "1");
        base.merge(&preset);
        assert_eq!(
            base.lines(),
            vec!["lxc.utsname = web", "lxc.network.type = veth", "lxc.tty = 1"]
        );
    }

    #[test]
    fn remove_entry() {
        let mut config = ContainerConfig::new();
        config.set("a", "1");
        assert!(config.remove("a").is_some());
        assert!(config.remove("a").is_none());
        assert!(config.is_empty());
    }

    #[test]
    fn from_table_accepts_strings_and_string_arrays() {
        let table: toml::Table = toml::from_str(
            r#"
            "lxc.network.type" = "veth"
            "lxc.cap.drop" = ["mac_admin", "sys_time"]
            "#,
        )
        .unwrap();
        let config = ContainerConfig::from_table(&table).unwrap();
        assert_eq!(
            config.get("lxc.cap.drop").map(ToString::to_string),
            Some("mac_admin, sys_time".to_owned())
        );
    }

    #[test]
    fn integer_value_is_rejected() {
        let table: toml::Table = toml::from_str("\"lxc.tty\" = 4").unwrap();
        let err = ContainerConfig::from_table(&table).unwrap_err();
        match err {
            CoreError::ConfigValue { key, found } => {
                assert_eq!(key, "lxc.tty");
                assert_eq!(found, "integer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mixed_array_is_rejected() {
        let table: toml::Table = toml::from_str("key = [\"a\", true]").unwrap();
        let err = ContainerConfig::from_table(&table).unwrap_err();
        assert!(err.to_string().contains("an array containing boolean"));
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_config(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
