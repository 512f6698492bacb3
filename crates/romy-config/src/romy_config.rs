//! Integration settings
//!
//! Parses `romy.yaml` from the config directory:
//!
//! ```yaml
//! update_interval: 5
//! storage_dir: /var/lib/romy
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

pub const CONFIG_FILE: &str = "romy.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RomyConfig {
    /// Seconds between status refreshes
    #[serde(default = "default_update_interval", rename = "update_interval")]
    pub update_interval_secs: u64,

    /// Directory holding `.storage/`; defaults to the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

fn default_update_interval() -> u64 {
    romy_core::UPDATE_INTERVAL.as_secs()
}

impl Default for RomyConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            storage_dir: None,
        }
    }
}

impl RomyConfig {
    /// Load settings from a config directory; a missing `romy.yaml` gives defaults
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref();
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            debug!("No {} in {:?}, using defaults", CONFIG_FILE, config_dir);
            return Ok(Self::default().resolve(config_dir));
        }

        debug!("Loading settings from {:?}", path);
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        let yaml: Value = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseYaml { path, source: e })?;
        Ok(Self::from_yaml(yaml)?.resolve(config_dir))
    }

    /// Parse and validate settings from a YAML value
    pub fn from_yaml(yaml: Value) -> ConfigResult<Self> {
        let yaml = match yaml {
            Value::Null => Value::Mapping(serde_yaml::Mapping::new()),
            Value::Mapping(_) => yaml,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "root".to_string(),
                    reason: "configuration must be a mapping".to_string(),
                })
            }
        };

        let config: RomyConfig =
            serde_yaml::from_value(yaml).map_err(|e| ConfigError::InvalidValue {
                key: CONFIG_FILE.to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.update_interval_secs < 1 {
            return Err(ConfigError::ValidationFailed {
                message: "update_interval must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    fn resolve(mut self, config_dir: &Path) -> Self {
        match &self.storage_dir {
            None => self.storage_dir = Some(config_dir.to_path_buf()),
            Some(dir) if dir.is_relative() => self.storage_dir = Some(config_dir.join(dir)),
            Some(_) => {}
        }
        self
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    /// Directory holding `.storage/`
    pub fn storage_dir(&self) -> &Path {
        self.storage_dir.as_deref().unwrap_or(Path::new("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = RomyConfig::load(dir.path()).unwrap();

        assert_eq!(config.update_interval(), Duration::from_secs(5));
        assert_eq!(config.storage_dir(), dir.path());
    }

    #[test]
    fn test_parse_settings() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "update_interval: 30\nstorage_dir: data\n",
        )
        .unwrap();

        let config = RomyConfig::load(dir.path()).unwrap();
        assert_eq!(config.update_interval_secs, 30);
        assert_eq!(config.storage_dir(), dir.path().join("data"));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "update_interval: [5\n").unwrap();

        assert!(matches!(
            RomyConfig::load(dir.path()),
            Err(ConfigError::ParseYaml { .. })
        ));
    }

    #[test]
    fn test_non_numeric_interval_rejected() {
        let yaml: Value = serde_yaml::from_str("update_interval: often\n").unwrap();
        assert!(matches!(
            RomyConfig::from_yaml(yaml),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let yaml: Value = serde_yaml::from_str("update_interval: 0\n").unwrap();
        assert!(matches!(
            RomyConfig::from_yaml(yaml),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = RomyConfig::from_yaml(Value::Null).unwrap();
        assert_eq!(config, RomyConfig::default());
    }

    #[test]
    fn test_non_mapping_rejected() {
        let yaml: Value = serde_yaml::from_str("- 5\n").unwrap();
        assert!(matches!(
            RomyConfig::from_yaml(yaml),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
