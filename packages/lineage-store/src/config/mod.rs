//! Store configuration
//!
//! Loaded from a versioned YAML file:
//!
//! ```yaml
//! version: 1
//! lock:
//!   mode: wait
//!   file_name: lock
//! safe_dirs: ["/srv/bases"]
//! keep_backups: true
//! string_table_factor: 2
//! ```
//!
//! Every field except `version` is optional and falls back to
//! [`StoreConfig::default`].

pub mod error;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use error::{ConfigError, ConfigResult};

/// Lock file name that disables locking entirely.
pub const NO_LOCK: &str = "no_lock";

const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Advisory lock acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Block until the lock is free
    Wait,
    /// Fail immediately when the lock is held elsewhere
    NoWait,
}

/// Lock settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    #[serde(default = "default_lock_mode")]
    pub mode: LockMode,

    /// Lock file name inside the base directory ([`NO_LOCK`] bypasses locking)
    #[serde(default = "default_lock_file")]
    pub file_name: String,
}

impl LockConfig {
    pub fn is_bypassed(&self) -> bool {
        self.file_name == NO_LOCK
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            mode: default_lock_mode(),
            file_name: default_lock_file(),
        }
    }
}

fn default_lock_mode() -> LockMode {
    LockMode::Wait
}

fn default_lock_file() -> String {
    "lock".to_string()
}

fn default_keep_backups() -> bool {
    true
}

fn default_string_table_factor() -> u32 {
    2
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub lock: LockConfig,

    /// Extra directories the path-safety checker accepts besides the base
    /// directory itself
    #[serde(default)]
    pub safe_dirs: Vec<PathBuf>,

    /// Keep the previous generation of every swapped file as `<file>~`
    #[serde(default = "default_keep_backups")]
    pub keep_backups: bool,

    /// String hash table size = factor × number of strings
    #[serde(default = "default_string_table_factor")]
    pub string_table_factor: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            safe_dirs: Vec::new(),
            keep_backups: default_keep_backups(),
            string_table_factor: default_string_table_factor(),
        }
    }
}

/// YAML schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigExportV1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u32>,

    #[serde(default)]
    lock: LockConfig,

    #[serde(default)]
    safe_dirs: Vec<PathBuf>,

    #[serde(default = "default_keep_backups")]
    keep_backups: bool,

    #[serde(default = "default_string_table_factor")]
    string_table_factor: u32,
}

impl StoreConfig {
    /// Load and validate a YAML configuration file.
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML content.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let export: ConfigExportV1 = serde_yaml::from_str(content)?;

        let version = export.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        StoreConfig {
            lock: export.lock,
            safe_dirs: export.safe_dirs,
            keep_backups: export.keep_backups,
            string_table_factor: export.string_table_factor,
        }
        .validate()
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = ConfigExportV1 {
            version: Some(1),
            lock: self.lock.clone(),
            safe_dirs: self.safe_dirs.clone(),
            keep_backups: self.keep_backups,
            string_table_factor: self.string_table_factor,
        };
        serde_yaml::to_string(&export).map_err(ConfigError::Yaml)
    }

    pub fn validate(self) -> ConfigResult<Self> {
        if self.lock.file_name.trim().is_empty() {
            return Err(ConfigError::EmptyLockName);
        }
        if !(1..=16).contains(&self.string_table_factor) {
            return Err(ConfigError::range_with_hint(
                "string_table_factor",
                self.string_table_factor,
                1,
                16,
                "The default of 2 keeps hash chains short.",
            ));
        }
        Ok(self)
    }

    pub fn with_lock_mode(mut self, mode: LockMode) -> Self {
        self.lock.mode = mode;
        self
    }

    pub fn without_lock(mut self) -> Self {
        self.lock.file_name = NO_LOCK.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_is_valid() {
        let config = StoreConfig::default().validate().unwrap();
        assert_eq!(config.lock.mode, LockMode::Wait);
        assert_eq!(config.lock.file_name, "lock");
        assert!(config.keep_backups);
        assert!(!config.lock.is_bypassed());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = StoreConfig::default().with_lock_mode(LockMode::NoWait);

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert!(yaml.contains("no_wait"));

        let parsed = StoreConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_yaml_loading() {
        let yaml_content = r#"
version: 1
lock:
  mode: no_wait
  file_name: no_lock
keep_backups: false
string_table_factor: 4
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = StoreConfig::from_yaml(temp_file.path()).unwrap();
        assert_eq!(config.lock.mode, LockMode::NoWait);
        assert!(config.lock.is_bypassed());
        assert!(!config.keep_backups);
        assert_eq!(config.string_table_factor, 4);
    }

    #[test]
    fn test_yaml_missing_version() {
        let result = StoreConfig::from_yaml_str("keep_backups: true\n");
        assert!(matches!(result, Err(ConfigError::MissingVersion)));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let result = StoreConfig::from_yaml_str("version: 2\n");
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_yaml_unknown_field() {
        let result = StoreConfig::from_yaml_str("version: 1\nbogus: 3\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_range_validation() {
        let result = StoreConfig::from_yaml_str("version: 1\nstring_table_factor: 0\n");
        assert!(matches!(result, Err(ConfigError::Range { .. })));
    }
}
